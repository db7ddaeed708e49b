// Eigen decomposition of real symmetric matrices, using Householder
// tridiagonalization followed by the implicit QL algorithm. This follows the
// JAMA implementation (https://math.nist.gov/javanumerics/jama/), itself
// derived from the EISPACK routines tred2 and tql2.

use ndarray::{Array1, Array2};

use crate::Error;

/// Maximal number of QL sweeps used to converge a single eigenvalue
const MAX_QL_SWEEPS: usize = 60;

/// Eigendecomposition of a real symmetric matrix into eigenvalues and
/// eigenvectors
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues of the input matrix, sorted in increasing order
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors of the input matrix, stored as columns
    pub eigenvectors: Array2<f64>,
}

impl SymmetricEigen {
    /// Compute the eigendecomposition of a symmetric real matrix. Only the
    /// lower triangle of `matrix` is read.
    ///
    /// This fails if the QL iterations do not converge, or if the matrix
    /// contains non-finite values.
    #[time_graph::instrument(name = "SymmetricEigen::new")]
    pub fn new(mut matrix: Array2<f64>) -> Result<SymmetricEigen, Error> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Error::InvalidParameter(format!(
                "expected a square matrix for eigendecomposition, got {}x{}",
                matrix.nrows(), matrix.ncols()
            )));
        }

        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::EigenDecomposition(
                "the matrix contains non-finite values".into()
            ));
        }

        let n = matrix.nrows();
        if n == 0 {
            return Ok(SymmetricEigen {
                eigenvalues: Array1::zeros(0),
                eigenvectors: matrix,
            });
        }

        for i in 0..n {
            for j in (i + 1)..n {
                matrix[[i, j]] = matrix[[j, i]];
            }
        }

        let mut diagonal = Array1::zeros(n);
        let mut off_diagonal = Array1::zeros(n);

        householder_tridiagonal(&mut matrix, &mut diagonal, &mut off_diagonal);
        implicit_ql(&mut matrix, &mut diagonal, &mut off_diagonal)?;
        sort_ascending(&mut diagonal, &mut matrix);

        return Ok(SymmetricEigen {
            eigenvalues: diagonal,
            eigenvectors: matrix,
        });
    }
}

/// Reduce the symmetric matrix stored in `v` to tridiagonal form. On output,
/// `d` contains the diagonal, `e[1..]` the sub-diagonal and `v` the
/// accumulated orthogonal transformation.
#[allow(clippy::many_single_char_names, clippy::needless_range_loop)]
fn householder_tridiagonal(v: &mut Array2<f64>, d: &mut Array1<f64>, e: &mut Array1<f64>) {
    let n = d.len();

    for j in 0..n {
        d[j] = v[[n - 1, j]];
    }

    for i in (1..n).rev() {
        let scale = (0..i).map(|k| d[k].abs()).sum::<f64>();
        let mut h = 0.0;

        if scale == 0.0 {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[[i - 1, j]];
                v[[i, j]] = 0.0;
                v[[j, i]] = 0.0;
            }
            d[i] = h;
            continue;
        }

        for k in 0..i {
            d[k] /= scale;
            h += d[k] * d[k];
        }

        let mut f = d[i - 1];
        let g = if f > 0.0 { -h.sqrt() } else { h.sqrt() };
        e[i] = scale * g;
        h -= f * g;
        d[i - 1] = f - g;
        e.slice_mut(ndarray::s![..i]).fill(0.0);

        for j in 0..i {
            f = d[j];
            v[[j, i]] = f;
            let mut g = e[j] + v[[j, j]] * f;
            for k in (j + 1)..i {
                g += v[[k, j]] * d[k];
                e[k] += v[[k, j]] * f;
            }
            e[j] = g;
        }

        f = 0.0;
        for j in 0..i {
            e[j] /= h;
            f += e[j] * d[j];
        }

        let hh = f / (h + h);
        for j in 0..i {
            e[j] -= hh * d[j];
        }

        for j in 0..i {
            let f = d[j];
            let g = e[j];
            for k in j..i {
                v[[k, j]] -= f * e[k] + g * d[k];
            }
            d[j] = v[[i - 1, j]];
            v[[i, j]] = 0.0;
        }
        d[i] = h;
    }

    // accumulate transformations
    for i in 0..(n - 1) {
        v[[n - 1, i]] = v[[i, i]];
        v[[i, i]] = 1.0;
        let h = d[i + 1];
        if h != 0.0 {
            for k in 0..=i {
                d[k] = v[[k, i + 1]] / h;
            }
            for j in 0..=i {
                let g = (0..=i).map(|k| v[[k, i + 1]] * v[[k, j]]).sum::<f64>();
                for k in 0..=i {
                    v[[k, j]] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            v[[k, i + 1]] = 0.0;
        }
    }

    for j in 0..n {
        d[j] = v[[n - 1, j]];
        v[[n - 1, j]] = 0.0;
    }
    v[[n - 1, n - 1]] = 1.0;
    e[0] = 0.0;
}

/// Diagonalize the tridiagonal matrix produced by `householder_tridiagonal`
/// with the implicit QL algorithm, accumulating the rotations into `v`.
#[allow(clippy::many_single_char_names)]
fn implicit_ql(v: &mut Array2<f64>, d: &mut Array1<f64>, e: &mut Array1<f64>) -> Result<(), Error> {
    let n = d.len();

    for i in 1..n {
        e[i - 1] = e[i];
    }
    e[n - 1] = 0.0;

    let mut f = 0.0;
    let mut tst1 = 0.0_f64;
    for l in 0..n {
        tst1 = tst1.max(d[l].abs() + e[l].abs());

        // find a small sub-diagonal element
        let mut m = l;
        while m < n - 1 && e[m].abs() > f64::EPSILON * tst1 {
            m += 1;
        }

        let mut sweeps = 0;
        while m > l && e[l].abs() > f64::EPSILON * tst1 {
            sweeps += 1;
            if sweeps > MAX_QL_SWEEPS {
                return Err(Error::EigenDecomposition(format!(
                    "QL iterations did not converge for eigenvalue {} after {} sweeps",
                    l, MAX_QL_SWEEPS
                )));
            }

            // implicit shift
            let mut g = d[l];
            let mut p = (d[l + 1] - g) / (2.0 * e[l]);
            let mut r = f64::hypot(p, 1.0);
            if p < 0.0 {
                r = -r;
            }
            d[l] = e[l] / (p + r);
            d[l + 1] = e[l] * (p + r);
            let dl1 = d[l + 1];
            let mut h = g - d[l];
            for i in (l + 2)..n {
                d[i] -= h;
            }
            f += h;

            // implicit QL transformation
            p = d[m];
            let mut c = 1.0;
            let mut c2 = c;
            let mut c3 = c;
            let el1 = e[l + 1];
            let mut s = 0.0;
            let mut s2 = 0.0;
            for i in (l..m).rev() {
                c3 = c2;
                c2 = c;
                s2 = s;
                g = c * e[i];
                h = c * p;
                r = f64::hypot(p, e[i]);
                e[i + 1] = s * r;
                s = e[i] / r;
                c = p / r;
                p = c * d[i] - s * g;
                d[i + 1] = h + s * (c * g + s * d[i]);

                for k in 0..n {
                    h = v[[k, i + 1]];
                    v[[k, i + 1]] = s * v[[k, i]] + c * h;
                    v[[k, i]] = c * v[[k, i]] - s * h;
                }
            }
            p = -s * s2 * c3 * el1 * e[l] / dl1;
            e[l] = s * p;
            d[l] = c * p;

            if !p.is_finite() {
                return Err(Error::EigenDecomposition(
                    "QL iterations produced non-finite values".into()
                ));
            }
        }

        d[l] += f;
        e[l] = 0.0;
    }

    return Ok(());
}

/// Selection sort of the eigenvalues, swapping the corresponding columns of
/// the eigenvectors
fn sort_ascending(d: &mut Array1<f64>, v: &mut Array2<f64>) {
    let n = d.len();
    for i in 0..n.saturating_sub(1) {
        let mut k = i;
        for j in (i + 1)..n {
            if d[j] < d[k] {
                k = j;
            }
        }

        if k != i {
            d.swap(i, k);
            for row in 0..n {
                v.swap([row, i], [row, k]);
            }
        }
    }
}
