use std::f64::consts::PI;

use ndarray::{s, Array2, Array3, Array4};
use num_complex::Complex64;
use num_traits::Zero;

use crate::Vector3D;
use crate::systems::Supercell;
use super::SupercellImages;

/// Phases `exp(2πi q·n)` for a fixed set of integer lattice points `n`.
///
/// Only the unique values of each component are stored, so computing the
/// phases at a new q-point needs three complex exponentials and a few integer
/// powers, instead of one exponential per lattice point.
#[derive(Debug, Clone)]
pub(super) struct PhaseTable {
    exponents: [Vec<i32>; 3],
    lookup: Vec<[usize; 3]>,
}

impl PhaseTable {
    pub(super) fn new(points: &[[i32; 3]]) -> PhaseTable {
        let mut exponents: [Vec<i32>; 3] = Default::default();
        for (axis, unique) in exponents.iter_mut().enumerate() {
            *unique = points.iter().map(|point| point[axis]).collect();
            unique.sort_unstable();
            unique.dedup();
        }

        let lookup = points.iter()
            .map(|point| {
                let mut index = [0; 3];
                for axis in 0..3 {
                    // the value was inserted above, so the search always succeeds
                    index[axis] = exponents[axis].binary_search(&point[axis]).unwrap_or(0);
                }
                index
            })
            .collect();

        return PhaseTable {
            exponents: exponents,
            lookup: lookup,
        };
    }

    pub(super) fn phases(&self, qpoint: Vector3D) -> Vec<Complex64> {
        let mut per_axis: [Vec<Complex64>; 3] = Default::default();
        for (axis, values) in per_axis.iter_mut().enumerate() {
            let base = Complex64::from_polar(1.0, 2.0 * PI * qpoint[axis]);
            *values = self.exponents[axis].iter().map(|&e| base.powi(e)).collect();
        }

        return self.lookup.iter()
            .map(|index| per_axis[0][index[0]] * per_axis[1][index[1]] * per_axis[2][index[2]])
            .collect();
    }
}

/// Fourier interpolation of real space force constants to the dynamical
/// matrix at arbitrary q-points.
///
/// The force constants between ions `i` and `j` in origin cell `c` are shared
/// equally between all the Wigner-Seitz images of this pair, and the
/// resulting matrix is
///
/// ```text
/// D[3i+a, 3j+b](q) = Σ_c w[c, 3i+a, 3j+b] exp(2πi q·o_c) Σ_n exp(2πi q·(n M))
/// ```
///
/// where the sum over `n` runs over the images of `(c, i, j)`, and
/// `w[c, 3i+a, 3j+b] = fc[c, 3j+b, 3i+a] / count(c, i, j)`. The matrix is not
/// mass-weighted.
#[derive(Debug, Clone)]
pub struct DynamicalMatrixBuilder {
    n_ions: usize,
    weighted: Array3<f64>,
    /// padded image indices, the padding index maps to a zero phase
    images: Array4<usize>,
    image_phases: PhaseTable,
    cell_phases: PhaseTable,
}

impl DynamicalMatrixBuilder {
    /// Prepare the interpolation of `force_constants`, with shape
    /// `(n_cells, 3 n_ions, 3 n_ions)`, using the periodic `images` found in
    /// `supercell`.
    pub fn new(force_constants: &Array3<f64>, supercell: &Supercell, images: &SupercellImages) -> DynamicalMatrixBuilder {
        let (n_cells, n_rows, _) = force_constants.dim();
        let n_ions = n_rows / 3;
        let counts = images.counts();

        let weighted = Array3::from_shape_fn((n_cells, n_rows, n_rows), |(c, r, s)| {
            let count = counts[[c, r / 3, s / 3]];
            force_constants[[c, s, r]] / count as f64
        });

        let matrix = supercell.matrix();
        let translations = images.candidates().iter()
            .map(|n| {
                let mut translation = [0; 3];
                for (k, value) in translation.iter_mut().enumerate() {
                    *value = n[0] * matrix[0][k] + n[1] * matrix[1][k] + n[2] * matrix[2][k];
                }
                translation
            })
            .collect::<Vec<_>>();

        return DynamicalMatrixBuilder {
            n_ions: n_ions,
            weighted: weighted,
            images: images.padded_indices().clone(),
            image_phases: PhaseTable::new(&translations),
            cell_phases: PhaseTable::new(supercell.cell_origins()),
        };
    }

    /// Get the number of ions in the unit cell
    pub fn n_ions(&self) -> usize {
        self.n_ions
    }

    /// Compute the dynamical matrix at the fractional `qpoint`
    #[time_graph::instrument(name = "DynamicalMatrixBuilder::compute")]
    pub fn compute(&self, qpoint: Vector3D) -> Array2<Complex64> {
        let mut image_phases = self.image_phases.phases(qpoint);
        image_phases.push(Complex64::zero());
        let cell_phases = self.cell_phases.phases(qpoint);

        let n_rows = 3 * self.n_ions;
        let mut dynmat = Array2::zeros((n_rows, n_rows));
        for (c, cell_phase) in cell_phases.iter().enumerate() {
            for i in 0..self.n_ions {
                for j in 0..self.n_ions {
                    let mut phase = Complex64::zero();
                    for &k in self.images.slice(s![c, i, j, ..]) {
                        phase += image_phases[k];
                    }
                    phase *= cell_phase;

                    for a in 0..3 {
                        for b in 0..3 {
                            dynmat[[3 * i + a, 3 * j + b]] += self.weighted[[c, 3 * i + a, 3 * j + b]] * phase;
                        }
                    }
                }
            }
        }

        return dynmat;
    }
}
