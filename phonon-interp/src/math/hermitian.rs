use faer::{Mat, Side};
use log::warn;
use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;

use crate::Error;
use super::SymmetricEigen;

/// Eigendecomposition of a complex Hermitian matrix
#[derive(Debug, Clone)]
pub struct HermitianEigen {
    /// Eigenvalues of the input matrix, sorted in increasing order
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors of the input matrix, stored as columns
    pub eigenvectors: Array2<Complex64>,
}

impl HermitianEigen {
    /// Diagonalize the Hermitian `matrix`, reading only its lower triangle.
    ///
    /// The dense self-adjoint solver from `faer` is tried first. If it fails
    /// or produces non-finite values, the matrix is embedded in a real
    /// symmetric matrix of twice the size which is diagonalized with
    /// [`SymmetricEigen`]. An error is returned only when both fail.
    #[time_graph::instrument(name = "HermitianEigen::new")]
    pub fn new(matrix: ArrayView2<'_, Complex64>) -> Result<HermitianEigen, Error> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Error::InvalidParameter(format!(
                "expected a square matrix for eigendecomposition, got {}x{}",
                matrix.nrows(), matrix.ncols()
            )));
        }

        match HermitianEigen::dense(matrix) {
            Ok(eigen) => return Ok(eigen),
            Err(primary) => {
                warn!("{}, falling back to the real symmetric embedding", primary);
                return HermitianEigen::real_embedding(matrix).map_err(|fallback| {
                    Error::EigenDecomposition(format!(
                        "both eigensolvers failed ({}; {})", primary, fallback
                    ))
                });
            }
        }
    }

    /// Primary solver, using `faer` self-adjoint eigendecomposition
    pub(crate) fn dense(matrix: ArrayView2<'_, Complex64>) -> Result<HermitianEigen, Error> {
        let n = matrix.nrows();
        let mat = Mat::<Complex64>::from_fn(n, n, |i, j| matrix[[i, j]]);

        let evd = mat.self_adjoint_eigen(Side::Lower).map_err(|e| {
            Error::EigenDecomposition(format!("dense Hermitian solver failed: {:?}", e))
        })?;

        let values = evd.S().column_vector();
        let vectors = evd.U();

        let eigenvalues = Array1::from_shape_fn(n, |i| values[i].re);
        let eigenvectors = Array2::from_shape_fn((n, n), |(i, j)| vectors[(i, j)]);

        if eigenvalues.iter().any(|v| !v.is_finite()) || eigenvectors.iter().any(|v| !v.is_finite()) {
            return Err(Error::EigenDecomposition(
                "dense Hermitian solver produced non-finite values".into()
            ));
        }

        let mut eigen = HermitianEigen {
            eigenvalues: eigenvalues,
            eigenvectors: eigenvectors,
        };
        eigen.sort();
        return Ok(eigen);
    }

    /// Fallback solver. A Hermitian matrix `H = A + iB` has the same
    /// eigenvalues as the real symmetric matrix `[[A, -B], [B, A]]`, each
    /// appearing twice. For every pair, the real eigenvectors `(u, v)` and
    /// `(-v, u)` map to the same complex eigenvector `u + iv` up to a phase,
    /// so one vector per pair is selected by Gram-Schmidt orthogonalization.
    pub(crate) fn real_embedding(matrix: ArrayView2<'_, Complex64>) -> Result<HermitianEigen, Error> {
        let n = matrix.nrows();

        let mut embedding = Array2::zeros((2 * n, 2 * n));
        for i in 0..n {
            for j in 0..=i {
                let value = matrix[[i, j]];
                embedding[[i, j]] = value.re;
                embedding[[i + n, j + n]] = value.re;
                embedding[[i + n, j]] = value.im;
                // B is antisymmetric
                embedding[[j + n, i]] = -value.im;
            }
        }

        let real = SymmetricEigen::new(embedding)?;

        let candidates = (0..2 * n).map(|k| {
            Array1::from_shape_fn(n, |i| {
                Complex64::new(real.eigenvectors[[i, k]], real.eigenvectors[[i + n, k]])
            })
        }).collect::<Vec<_>>();

        let mut selected: Vec<(f64, Array1<Complex64>)> = Vec::with_capacity(n);
        let mut used = vec![false; 2 * n];

        // first pass: accept vectors with a large component orthogonal to the
        // ones already selected
        for (k, candidate) in candidates.iter().enumerate() {
            if selected.len() == n {
                break;
            }

            let residual = orthogonalize(candidate, &selected);
            let norm2 = squared_norm(&residual);
            if norm2 > 0.5 {
                used[k] = true;
                selected.push((real.eigenvalues[k], residual / norm2.sqrt()));
            }
        }

        // second pass: fill the remaining slots with the largest residuals
        while selected.len() < n {
            let best = candidates.iter()
                .enumerate()
                .filter(|(k, _)| !used[*k])
                .map(|(k, candidate)| {
                    let residual = orthogonalize(candidate, &selected);
                    let norm2 = squared_norm(&residual);
                    (k, residual, norm2)
                })
                .max_by(|a, b| a.2.total_cmp(&b.2));

            match best {
                Some((k, residual, norm2)) if norm2 > 1e-12 => {
                    used[k] = true;
                    selected.push((real.eigenvalues[k], residual / norm2.sqrt()));
                }
                _ => {
                    return Err(Error::EigenDecomposition(
                        "could not extract independent complex eigenvectors from the real embedding".into()
                    ));
                }
            }
        }

        let mut eigen = HermitianEigen {
            eigenvalues: Array1::from_iter(selected.iter().map(|(value, _)| *value)),
            eigenvectors: Array2::zeros((n, n)),
        };
        for (k, (_, vector)) in selected.iter().enumerate() {
            eigen.eigenvectors.column_mut(k).assign(vector);
        }

        eigen.sort();
        return Ok(eigen);
    }

    /// Sort eigenvalues in increasing order, keeping eigenvectors aligned
    fn sort(&mut self) {
        let n = self.eigenvalues.len();
        let mut order = (0..n).collect::<Vec<_>>();
        order.sort_by(|&a, &b| self.eigenvalues[a].total_cmp(&self.eigenvalues[b]));

        if order.iter().enumerate().all(|(i, &o)| i == o) {
            return;
        }

        let eigenvalues = Array1::from_iter(order.iter().map(|&o| self.eigenvalues[o]));
        let eigenvectors = Array2::from_shape_fn((n, n), |(i, k)| self.eigenvectors[[i, order[k]]]);
        self.eigenvalues = eigenvalues;
        self.eigenvectors = eigenvectors;
    }
}

/// Remove from `vector` its projection on all the `basis` vectors
fn orthogonalize(vector: &Array1<Complex64>, basis: &[(f64, Array1<Complex64>)]) -> Array1<Complex64> {
    let mut residual = vector.clone();
    for (_, b) in basis {
        let overlap = b.iter().zip(residual.iter()).map(|(b, r)| b.conj() * r).sum::<Complex64>();
        residual.zip_mut_with(b, |r, b| *r -= overlap * b);
    }
    return residual;
}

fn squared_norm(vector: &Array1<Complex64>) -> f64 {
    vector.iter().map(|v| v.norm_sqr()).sum()
}
