//! Enforcement of the acoustic sum rule: a rigid translation of the whole
//! crystal should not cost any energy, so the three acoustic modes must have
//! zero frequency at the zone center. Small numerical errors in the force
//! constants break this, and the corresponding eigenvalues are shifted back
//! to (almost) zero.

use ndarray::{Array2, Array3};
use num_complex::Complex64;

use crate::Error;
use crate::math::{HermitianEigen, SymmetricEigen};
use crate::systems::Supercell;

/// Modes are acoustic if the squared amplitude of their center of mass
/// displacement is larger than this fraction of the number of sites
const ACOUSTIC_SENSITIVITY: f64 = 0.5;

/// Relative shift of the corrected acoustic eigenvalues, used to keep them
/// slightly apart
const ACOUSTIC_TOLERANCE: f64 = 1e-8;

/// Maximal fractional distance for two supercell positions to be considered
/// the same
const MATCH_TOLERANCE: f64 = 16.0 * f64::EPSILON;

/// Correct `force_constants`, with shape `(n_cells, 3 n_ions, 3 n_ions)`, so
/// that they satisfy the acoustic sum rule.
///
/// The force constants are expanded to the full square matrix for all ions
/// in the `supercell`, which is diagonalized. The three acoustic eigenvalues
/// are then removed from this matrix, and the corrected force constants are
/// extracted back from the first block of columns.
#[time_graph::instrument(name = "realspace_sum_rule")]
pub fn realspace_sum_rule(force_constants: &Array3<f64>, supercell: &Supercell) -> Result<Array3<f64>, Error> {
    let (n_cells, n_rows, _) = force_constants.dim();
    let size = n_cells * n_rows;

    let origins = supercell.fractional_origins();
    let mut square = Array2::zeros((size, size));
    for nc in 0..n_cells {
        for m in 0..n_cells {
            let relative = origins[m] - origins[nc];

            let mut best = (0, f64::MAX);
            for (k, &origin) in origins.iter().enumerate() {
                let diff = relative - origin;
                let distance = (diff - diff.round()).l1_norm();
                if distance < best.1 {
                    best = (k, distance);
                }
            }

            if best.1 > MATCH_TOLERANCE {
                return Err(Error::GeometryMatchFailure(format!(
                    "could not find the cell equivalent to the vector between cells {} and {}",
                    nc, m
                )));
            }

            let k = best.0;
            for s in 0..n_rows {
                for r in 0..n_rows {
                    square[[n_rows * nc + s, n_rows * m + r]] = force_constants[[k, r, s]];
                }
            }
        }
    }

    let eigen = SymmetricEigen::new(square.clone())?;
    let displacements = (0..size)
        .map(|mode| center_of_mass(|row| Complex64::new(eigen.eigenvectors[[row, mode]], 0.0), size))
        .collect::<Vec<_>>();
    let acoustic = find_acoustic_modes(&displacements, size / 3)?;

    let tolerance = ACOUSTIC_TOLERANCE * min_abs(eigen.eigenvalues.iter().copied());
    for &mode in &acoustic {
        let shift = tolerance + eigen.eigenvalues[mode];
        let vector = eigen.eigenvectors.column(mode);
        for r in 0..size {
            for s in 0..size {
                square[[r, s]] -= shift * vector[r] * vector[s];
            }
        }
    }

    let corrected = Array3::from_shape_fn((n_cells, n_rows, n_rows), |(c, r, s)| {
        square[[n_rows * c + r, s]]
    });

    return Ok(corrected);
}

/// Correction of the acoustic sum rule applied directly to the dynamical
/// matrix at every q-point. The correction is computed once from the
/// dynamical matrix at the zone center.
#[derive(Debug, Clone)]
pub struct ReciprocalSumRule {
    correction: Array2<Complex64>,
}

impl ReciprocalSumRule {
    /// Compute the correction from the non mass-weighted dynamical matrix at
    /// q = 0, `gamma`
    pub fn new(gamma: &Array2<Complex64>) -> Result<ReciprocalSumRule, Error> {
        let n_rows = gamma.nrows();
        let eigen = HermitianEigen::new(gamma.view())?;

        let displacements = (0..n_rows)
            .map(|mode| center_of_mass(|row| eigen.eigenvectors[[row, mode]], n_rows))
            .collect::<Vec<_>>();
        let acoustic = find_acoustic_modes(&displacements, n_rows / 3)?;

        let tolerance = ACOUSTIC_TOLERANCE * min_abs(eigen.eigenvalues.iter().copied());
        let mut correction = Array2::zeros((n_rows, n_rows));
        for (index, &mode) in acoustic.iter().enumerate() {
            let shift = tolerance * index as f64 + eigen.eigenvalues[mode];
            let vector = eigen.eigenvectors.column(mode);
            for r in 0..n_rows {
                for s in 0..n_rows {
                    correction[[r, s]] += shift * vector[r] * vector[s].conj();
                }
            }
        }

        return Ok(ReciprocalSumRule {
            correction: correction,
        });
    }

    /// Get the correction subtracted from the dynamical matrix
    pub fn correction(&self) -> &Array2<Complex64> {
        &self.correction
    }

    /// Apply the correction to the non mass-weighted `dynmat`
    pub fn apply(&self, dynmat: &mut Array2<Complex64>) {
        *dynmat -= &self.correction;
    }
}

/// Squared norm of the displacement of the center of mass (assuming equal
/// masses) for a mode with `n_rows` components given by `component`
fn center_of_mass(component: impl Fn(usize) -> Complex64, n_rows: usize) -> f64 {
    let mut total = [Complex64::new(0.0, 0.0); 3];
    for row in 0..n_rows {
        total[row % 3] += component(row);
    }
    return total.iter().map(|v| v.norm_sqr()).sum();
}

/// Get the indices of the three acoustic modes, sorted by increasing center
/// of mass displacement
fn find_acoustic_modes(displacements: &[f64], n_sites: usize) -> Result<[usize; 3], Error> {
    let threshold = ACOUSTIC_SENSITIVITY * n_sites as f64;
    let found = displacements.iter().filter(|&&d| d > threshold).count();
    if found < 3 {
        return Err(Error::AcousticModeNotFound { found: found });
    }

    let mut order = (0..displacements.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| displacements[a].total_cmp(&displacements[b]));

    let n = order.len();
    return Ok([order[n - 3], order[n - 2], order[n - 1]]);
}

fn min_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.map(f64::abs).fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::Vector3D;
    use crate::interpolation::{DynamicalMatrixBuilder, SupercellImages};
    use crate::systems::test_utils::{break_sum_rule, test_data};

    /// Largest violation of the sum rule, `Σ_c Σ_j fc[c, 3j + a, s]`
    fn sum_rule_violation(force_constants: &Array3<f64>) -> f64 {
        let (n_cells, n_rows, _) = force_constants.dim();
        let mut max: f64 = 0.0;
        for s in 0..n_rows {
            for a in 0..3 {
                let mut sum: f64 = 0.0;
                for c in 0..n_cells {
                    for r in (a..n_rows).step_by(3) {
                        sum += force_constants[[c, r, s]];
                    }
                }
                max = max.max(sum.abs());
            }
        }
        return max;
    }

    #[test]
    fn realspace_unchanged() {
        let data = test_data("CsCl");
        let corrected = realspace_sum_rule(data.force_constants(), data.supercell()).unwrap();
        for (a, b) in corrected.iter().zip(data.force_constants().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn realspace() {
        let data = break_sum_rule(test_data("CsCl"), 1e-3);
        assert!(sum_rule_violation(data.force_constants()) > 1e-4);

        let corrected = realspace_sum_rule(data.force_constants(), data.supercell()).unwrap();
        assert!(sum_rule_violation(&corrected) < 1e-10);

        // applying the correction a second time does not change anything
        let again = realspace_sum_rule(&corrected, data.supercell()).unwrap();
        for (a, b) in again.iter().zip(corrected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn geometry_mismatch() {
        // the cell origins do not form a complete set of translations
        let supercell = Supercell::new(
            [[3, 0, 0], [0, 1, 0], [0, 0, 1]],
            vec![[0, 0, 0], [1, 0, 0], [1, 0, 0]],
        ).unwrap();
        let force_constants = Array3::zeros((3, 3, 3));

        let error = realspace_sum_rule(&force_constants, &supercell).unwrap_err();
        assert!(matches!(error, Error::GeometryMatchFailure(_)));
    }

    #[test]
    fn missing_acoustic_modes() {
        // three independent ions, no mode moves the center of mass enough
        let gamma = Array2::from_shape_fn((9, 9), |(r, s)| {
            if r == s {
                Complex64::new(1.0 + r as f64, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        });

        let error = ReciprocalSumRule::new(&gamma).unwrap_err();
        assert!(matches!(error, Error::AcousticModeNotFound { found: 0 }));
    }

    #[test]
    fn reciprocal() {
        let data = break_sum_rule(test_data("CsCl"), 1e-3);
        let images = SupercellImages::new(data.crystal(), data.supercell(), 2).unwrap();
        let builder = DynamicalMatrixBuilder::new(data.force_constants(), data.supercell(), &images);

        let mut gamma = builder.compute(Vector3D::zero());
        let sum_rule = ReciprocalSumRule::new(&gamma).unwrap();
        sum_rule.apply(&mut gamma);

        for r in 0..6 {
            for b in 0..3 {
                let mut sum = Complex64::new(0.0, 0.0);
                for s in (b..6).step_by(3) {
                    sum += gamma[[r, s]];
                }
                assert!(sum.norm() < 1e-8, "row {}: {}", r, sum);
            }
        }

        // the correction is Hermitian
        let correction = sum_rule.correction();
        for r in 0..6 {
            for s in 0..6 {
                let transposed = correction[[s, r]].conj();
                assert_relative_eq!(correction[[r, s]].re, transposed.re, epsilon = 1e-14);
                assert_relative_eq!(correction[[r, s]].im, transposed.im, epsilon = 1e-14);
            }
        }
    }
}
