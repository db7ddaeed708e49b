use ndarray::{Array1, Array2, Array3, ArrayView2};
use num_complex::Complex64;

use crate::{Error, Vector3D};
use crate::math::HermitianEigen;

/// Frequencies and eigenvectors of all phonon branches at a single q-point
#[derive(Debug, Clone)]
pub struct PhononModes {
    /// Frequency of each branch in Hartree, sorted in increasing order.
    /// Imaginary frequencies are reported as negative values.
    pub frequencies: Array1<f64>,
    /// Eigenvectors with shape `(n_branches, n_ions, 3)`, in the Cartesian
    /// basis of ion displacements
    pub eigenvectors: Array3<Complex64>,
}

impl PhononModes {
    /// Extract frequencies and eigenvectors from the eigendecomposition of a
    /// mass-weighted dynamical matrix
    pub fn new(eigen: &HermitianEigen) -> PhononModes {
        let n_branches = eigen.eigenvalues.len();
        let n_ions = n_branches / 3;

        let frequencies = eigen.eigenvalues.mapv(|lambda| lambda.signum() * lambda.abs().sqrt());
        let eigenvectors = Array3::from_shape_fn((n_branches, n_ions, 3), |(branch, ion, a)| {
            eigen.eigenvectors[[3 * ion + a, branch]]
        });

        return PhononModes {
            frequencies: frequencies,
            eigenvectors: eigenvectors,
        };
    }

    /// Get the number of branches
    pub fn n_branches(&self) -> usize {
        self.frequencies.len()
    }
}

/// Additional modes at a zone-center q-point, obtained when approaching it
/// from a different direction. They differ from the main modes by the
/// LO-TO splitting.
#[derive(Debug, Clone)]
pub struct SplitModes {
    /// Index of the q-point in the input list
    pub qpoint_index: usize,
    /// Direction of approach, in fractional reciprocal coordinates
    pub direction: Vector3D,
    /// The modes computed along this direction
    pub modes: PhononModes,
}

/// Divide each `3x3` block `(i, j)` of `dynmat` by `sqrt(m_i m_j)`
pub fn mass_weight(dynmat: &mut Array2<Complex64>, masses: &[f64]) {
    let sqrt_masses = masses.iter().map(|m| m.sqrt()).collect::<Vec<_>>();
    for ((r, s), value) in dynmat.indexed_iter_mut() {
        *value /= sqrt_masses[r / 3] * sqrt_masses[s / 3];
    }
}

/// Diagonalize the mass-weighted `dynmat`.
///
/// If `basis` is given, the matrix is first expressed in this (unitary)
/// basis as `Pᴴ D P`, which usually keeps the order of the branches
/// consistent along a path when `P` contains the eigenvectors at the previous
/// q-point. The returned eigenvectors are always transformed back to the
/// Cartesian basis.
#[time_graph::instrument(name = "modes::solve")]
pub fn solve(dynmat: ArrayView2<'_, Complex64>, basis: Option<&Array2<Complex64>>) -> Result<HermitianEigen, Error> {
    match basis {
        None => HermitianEigen::new(dynmat),
        Some(basis) => {
            if basis.dim() != dynmat.dim() {
                return Err(Error::InvalidParameter(format!(
                    "preconditioning basis has shape {:?}, expected {:?}",
                    basis.dim(), dynmat.dim()
                )));
            }

            let adjoint = basis.t().mapv(|v| v.conj());
            let transformed = adjoint.dot(&dynmat).dot(basis);

            let mut eigen = HermitianEigen::new(transformed.view())?;
            eigen.eigenvectors = basis.dot(&eigen.eigenvectors);
            return Ok(eigen);
        }
    }
}
