use log::{info, warn};
use ndarray::{s, Array1, Array2, Array3, Array4};
use num_complex::Complex64;
use rayon::prelude::*;

use crate::{Error, Vector3D};
use crate::math::HermitianEigen;
use crate::systems::InterpolationData;

use super::{SupercellImages, DynamicalMatrixBuilder, EwaldSum};
use super::{realspace_sum_rule, ReciprocalSumRule};
use super::{PhononModes, SplitModes, mass_weight, solve};

/// Tolerance used to decide if a q-point is equivalent to the zone center
const GAMMA_TOLERANCE: f64 = 1e-10;

/// Strategy used to enforce the acoustic sum rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AcousticSumRule {
    /// Do not correct the force constants
    #[default]
    None,
    /// Correct the real space force constants once, before the interpolation
    RealSpace,
    /// Correct the dynamical matrix at every q-point, using a correction
    /// computed at the zone center
    Reciprocal,
}

/// Parameters of the interpolation
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InterpolationOptions {
    /// Acoustic sum rule correction to apply
    #[serde(default)]
    pub acoustic_sum_rule: AcousticSumRule,
    /// Add the long range dipole-dipole correction to the dynamical matrix.
    /// This requires Born charges and a dielectric tensor.
    #[serde(default = "serde_default_true")]
    pub dipole_correction: bool,
    /// Compute the LO-TO splitting at zone-center q-points, using the
    /// direction towards the neighboring q-points in the list. This is only
    /// done together with the dipole correction.
    #[serde(default = "serde_default_true")]
    pub lo_to_splitting: bool,
    /// Express the dynamical matrix in the basis of the eigenvectors at the
    /// previous q-point before diagonalization. This forces sequential
    /// evaluation of the q-points.
    #[serde(default)]
    pub precondition: bool,
    /// Periodic images of the supercell are searched in `[-image_limit,
    /// image_limit]` along each supercell vector
    #[serde(default = "serde_default_image_limit")]
    pub image_limit: usize,
    /// Precision of the Ewald summation, larger values include more terms
    #[serde(default = "serde_default_ewald_precision")]
    pub ewald_precision: f64,
}

fn serde_default_true() -> bool { true }
fn serde_default_image_limit() -> usize { 2 }
fn serde_default_ewald_precision() -> f64 { 50.0 }

impl Default for InterpolationOptions {
    fn default() -> InterpolationOptions {
        InterpolationOptions {
            acoustic_sum_rule: AcousticSumRule::None,
            dipole_correction: true,
            lo_to_splitting: true,
            precondition: false,
            image_limit: serde_default_image_limit(),
            ewald_precision: serde_default_ewald_precision(),
        }
    }
}

impl InterpolationOptions {
    /// Parse and validate options from a JSON string. Missing fields take
    /// their default value.
    pub fn from_json(json: &str) -> Result<InterpolationOptions, Error> {
        let options: InterpolationOptions = serde_json::from_str(json)?;
        options.validate()?;
        return Ok(options);
    }

    /// Check that the values of these options are valid
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.ewald_precision.is_finite() && self.ewald_precision > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "ewald_precision must be a positive number, got {}", self.ewald_precision
            )));
        }

        if self.image_limit > 10 {
            return Err(Error::InvalidParameter(format!(
                "image_limit must be at most 10, got {}", self.image_limit
            )));
        }

        return Ok(());
    }
}

/// Phonon frequencies and eigenvectors for a list of q-points
#[derive(Debug)]
pub struct InterpolationResult {
    /// Frequencies in Hartree, with shape `(n_qpoints, n_branches)`. Negative
    /// values correspond to imaginary frequencies. Rows of failed q-points
    /// are filled with NaN.
    pub frequencies: Array2<f64>,
    /// Eigenvectors with shape `(n_qpoints, n_branches, n_ions, 3)`
    pub eigenvectors: Array4<Complex64>,
    /// Additional modes at zone-center q-points, for the other directions of
    /// approach
    pub split: Vec<SplitModes>,
    /// Weight of each q-point, all equal to `1 / n_qpoints`
    pub weights: Array1<f64>,
    /// Index and error for all the q-points where the computation failed
    pub failures: Vec<(usize, Error)>,
}

/// Modes at a single q-point, together with the eigenvectors matrix used to
/// precondition the next q-point
struct QpointModes {
    modes: PhononModes,
    split: Vec<SplitModes>,
    eigenvectors: Array2<Complex64>,
}

/// Everything needed to compute the dynamical matrix and phonon modes at
/// arbitrary q-points, computed once for a given set of interpolation data
/// and options.
#[derive(Debug, Clone)]
pub struct InterpolationContext {
    options: InterpolationOptions,
    masses: Vec<f64>,
    force_constants: Array3<f64>,
    builder: DynamicalMatrixBuilder,
    ewald: Option<EwaldSum>,
    sum_rule: Option<ReciprocalSumRule>,
}

impl InterpolationContext {
    /// Prepare the interpolation of `data` with the given `options`.
    ///
    /// Missing Born charges or dielectric tensor disable the dipole
    /// correction, and failures to enforce the acoustic sum rule leave the
    /// force constants uncorrected; both are reported with a warning.
    #[time_graph::instrument(name = "InterpolationContext::new")]
    pub fn new(data: &InterpolationData, options: InterpolationOptions) -> Result<InterpolationContext, Error> {
        options.validate()?;

        let crystal = data.crystal();
        let supercell = data.supercell();

        let images = SupercellImages::new(crystal, supercell, options.image_limit)?;

        let mut force_constants = data.force_constants().clone();
        if options.acoustic_sum_rule == AcousticSumRule::RealSpace {
            match realspace_sum_rule(&force_constants, supercell) {
                Ok(corrected) => force_constants = corrected,
                Err(error @ (Error::AcousticModeNotFound { .. } | Error::GeometryMatchFailure(_))) => {
                    warn!("{}, using uncorrected force constants", error);
                }
                Err(error) => return Err(error),
            }
        }

        let builder = DynamicalMatrixBuilder::new(&force_constants, supercell, &images);

        let ewald = if options.dipole_correction {
            match data.dipole() {
                Some(dipole) => Some(EwaldSum::new(crystal, dipole, options.ewald_precision)?),
                None => {
                    let error = Error::MissingPhysicalData(
                        "Born charges and dielectric tensor are not available".into()
                    );
                    warn!("{}, disabling the dipole correction and LO-TO splitting", error);
                    None
                }
            }
        } else {
            if options.lo_to_splitting {
                info!("LO-TO splitting is only computed together with the dipole correction");
            }
            None
        };

        let mut context = InterpolationContext {
            options: options,
            masses: crystal.masses().to_vec(),
            force_constants: force_constants,
            builder: builder,
            ewald: ewald,
            sum_rule: None,
        };

        if context.options.acoustic_sum_rule == AcousticSumRule::Reciprocal {
            let gamma = context.dynamical_matrix(Vector3D::zero());
            match ReciprocalSumRule::new(&gamma) {
                Ok(sum_rule) => context.sum_rule = Some(sum_rule),
                Err(error @ Error::AcousticModeNotFound { .. }) => {
                    warn!("{}, using uncorrected dynamical matrices", error);
                }
                Err(error) => return Err(error),
            }
        }

        return Ok(context);
    }

    /// Get the options used by this context
    pub fn options(&self) -> &InterpolationOptions {
        &self.options
    }

    /// Get the force constants used for the interpolation, including the
    /// real space acoustic sum rule correction if any
    pub fn force_constants(&self) -> &Array3<f64> {
        &self.force_constants
    }

    /// Get the number of phonon branches
    pub fn n_branches(&self) -> usize {
        3 * self.builder.n_ions()
    }

    /// Compute the dynamical matrix at the fractional `qpoint`, including
    /// the dipole and reciprocal acoustic sum rule corrections if enabled,
    /// but without mass weighting.
    pub fn dynamical_matrix(&self, qpoint: Vector3D) -> Array2<Complex64> {
        let mut dynmat = self.builder.compute(qpoint);
        if let Some(ref ewald) = self.ewald {
            dynmat += &ewald.correction(qpoint);
        }

        if let Some(ref sum_rule) = self.sum_rule {
            sum_rule.apply(&mut dynmat);
        }

        return dynmat;
    }

    /// Compute phonon frequencies and eigenvectors at all `qpoints` (in
    /// fractional reciprocal coordinates). The results are in the same order
    /// as the input, and a failure at one q-point does not prevent the
    /// computation at the others.
    #[time_graph::instrument(name = "InterpolationContext::interpolate")]
    pub fn interpolate(&self, qpoints: &[Vector3D]) -> Result<InterpolationResult, Error> {
        for (index, qpoint) in qpoints.iter().enumerate() {
            if !(qpoint[0].is_finite() && qpoint[1].is_finite() && qpoint[2].is_finite()) {
                return Err(Error::InvalidParameter(format!(
                    "q-point {} contains non-finite values", index
                )));
            }
        }

        let results = if self.options.precondition {
            let mut basis: Option<Array2<Complex64>> = None;
            let mut results = Vec::with_capacity(qpoints.len());
            for index in 0..qpoints.len() {
                let result = self.compute_qpoint(qpoints, index, basis.as_ref());
                if let Ok(ref modes) = result {
                    basis = Some(modes.eigenvectors.clone());
                }
                results.push(result);
            }
            results
        } else {
            (0..qpoints.len()).into_par_iter()
                .map(|index| self.compute_qpoint(qpoints, index, None))
                .collect::<Vec<_>>()
        };

        let n_qpoints = qpoints.len();
        let n_branches = self.n_branches();
        let n_ions = self.builder.n_ions();

        let mut frequencies = Array2::from_elem((n_qpoints, n_branches), f64::NAN);
        let mut eigenvectors = Array4::from_elem(
            (n_qpoints, n_branches, n_ions, 3),
            Complex64::new(f64::NAN, f64::NAN),
        );
        let mut split = Vec::new();
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(qpoint) => {
                    frequencies.row_mut(index).assign(&qpoint.modes.frequencies);
                    eigenvectors.slice_mut(s![index, .., .., ..]).assign(&qpoint.modes.eigenvectors);
                    split.extend(qpoint.split);
                }
                Err(error) => {
                    warn!("failed to compute phonon modes at q-point {}: {}", index, error);
                    failures.push((index, error));
                }
            }
        }

        let weights = Array1::from_elem(n_qpoints, 1.0 / n_qpoints as f64);

        return Ok(InterpolationResult {
            frequencies: frequencies,
            eigenvectors: eigenvectors,
            split: split,
            weights: weights,
            failures: failures,
        });
    }

    fn compute_qpoint(&self, qpoints: &[Vector3D], index: usize, basis: Option<&Array2<Complex64>>) -> Result<QpointModes, Error> {
        let qpoint = qpoints[index];
        let dynmat = self.dynamical_matrix(qpoint);

        let mut corrections = Vec::new();
        if let Some(ref ewald) = self.ewald {
            if self.options.lo_to_splitting && is_gamma(qpoint) {
                for direction in approach_directions(qpoints, index) {
                    match ewald.non_analytic(direction) {
                        Some(correction) => corrections.push((direction, correction)),
                        None => warn!(
                            "q-point {} is repeated in the list, can not compute LO-TO splitting from this direction",
                            index
                        ),
                    }
                }
            }
        }

        let main = match corrections.first() {
            Some((_, correction)) => self.diagonalize(&dynmat + correction, basis)?,
            None => self.diagonalize(dynmat.clone(), basis)?,
        };

        let mut split = Vec::with_capacity(corrections.len().saturating_sub(1));
        for (direction, correction) in corrections.iter().skip(1) {
            let eigen = self.diagonalize(&dynmat + correction, basis)?;
            split.push(SplitModes {
                qpoint_index: index,
                direction: *direction,
                modes: PhononModes::new(&eigen),
            });
        }

        return Ok(QpointModes {
            modes: PhononModes::new(&main),
            split: split,
            eigenvectors: main.eigenvectors,
        });
    }

    fn diagonalize(&self, mut dynmat: Array2<Complex64>, basis: Option<&Array2<Complex64>>) -> Result<HermitianEigen, Error> {
        mass_weight(&mut dynmat, &self.masses);
        return solve(dynmat.view(), basis);
    }
}

/// Check if `qpoint` is equivalent to the zone center
pub fn is_gamma(qpoint: Vector3D) -> bool {
    let reduced = qpoint - qpoint.round();
    return reduced.as_array().iter().all(|v| v.abs() < GAMMA_TOLERANCE);
}

/// Get the directions used to approach the q-point at `index`, towards its
/// neighbors in the list
fn approach_directions(qpoints: &[Vector3D], index: usize) -> Vec<Vector3D> {
    let mut directions = Vec::with_capacity(2);
    if index > 0 {
        directions.push(qpoints[index - 1] - qpoints[index]);
    }
    if index + 1 < qpoints.len() {
        directions.push(qpoints[index + 1] - qpoints[index]);
    }
    return directions;
}

/// Interpolate phonon frequencies and eigenvectors from `data` at all
/// `qpoints`, in fractional reciprocal coordinates.
///
/// This is a shortcut for [`InterpolationContext::new`] followed by
/// [`InterpolationContext::interpolate`].
pub fn interpolate(data: &InterpolationData, qpoints: &[Vector3D], options: InterpolationOptions) -> Result<InterpolationResult, Error> {
    let context = InterpolationContext::new(data, options)?;
    return context.interpolate(qpoints);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::systems::test_utils::{break_sum_rule, single_ion, test_data, with_dipole};

    #[test]
    fn options() {
        let options = InterpolationOptions::from_json("{}").unwrap();
        assert_eq!(options, InterpolationOptions::default());
        assert_eq!(options.image_limit, 2);
        assert_eq!(options.ewald_precision, 50.0);
        assert!(options.dipole_correction);

        let options = InterpolationOptions::from_json(r#"{
            "acoustic_sum_rule": "real_space",
            "precondition": true
        }"#).unwrap();
        assert_eq!(options.acoustic_sum_rule, AcousticSumRule::RealSpace);
        assert!(options.precondition);

        let error = InterpolationOptions::from_json(r#"{"asr": "reciprocal"}"#).unwrap_err();
        assert!(matches!(error, Error::Json(_)));

        let error = InterpolationOptions::from_json(r#"{"ewald_precision": -3.0}"#).unwrap_err();
        assert!(matches!(error, Error::InvalidParameter(_)));

        let schema = serde_json::to_string(&schemars::schema_for!(InterpolationOptions)).unwrap();
        assert!(schema.contains("acoustic_sum_rule"));
        assert!(schema.contains("real_space"));
    }

    #[test]
    fn gamma_points() {
        assert!(is_gamma(Vector3D::zero()));
        assert!(is_gamma(Vector3D::new(1.0, -2.0, 0.0)));
        assert!(!is_gamma(Vector3D::new(0.5, 0.0, 0.0)));
        assert!(!is_gamma(Vector3D::new(0.0, 1e-6, 0.0)));
    }

    #[test]
    fn directions() {
        let qpoints = [
            Vector3D::new(0.5, 0.0, 0.0),
            Vector3D::zero(),
            Vector3D::new(0.0, 0.0, 0.25),
        ];
        assert_eq!(approach_directions(&qpoints, 0), [Vector3D::new(-0.5, 0.0, 0.0)]);
        assert_eq!(approach_directions(&qpoints, 1), [
            Vector3D::new(0.5, 0.0, 0.0),
            Vector3D::new(0.0, 0.0, 0.25),
        ]);
        assert!(approach_directions(&qpoints[..1], 0).is_empty());
    }

    #[test]
    fn single_ion_frequencies() {
        let data = single_ion([0.1, 0.2, 0.3], 1837.0);
        let qpoints = [Vector3D::zero(), Vector3D::new(0.5, 0.25, 0.0)];
        let result = interpolate(&data, &qpoints, InterpolationOptions::default()).unwrap();

        assert!(result.failures.is_empty());
        assert!(result.split.is_empty());
        assert_eq!(result.weights, Array1::from(vec![0.5, 0.5]));

        for q in 0..2 {
            assert_relative_eq!(result.frequencies[[q, 0]], f64::sqrt(0.1 / 1837.0), max_relative = 1e-12);
            assert_relative_eq!(result.frequencies[[q, 1]], f64::sqrt(0.2 / 1837.0), max_relative = 1e-12);
            assert_relative_eq!(result.frequencies[[q, 2]], f64::sqrt(0.3 / 1837.0), max_relative = 1e-12);
            assert_relative_eq!(result.eigenvectors[[q, 0, 0, 0]].norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn missing_dipole_data() {
        let data = test_data("CsCl");
        let context = InterpolationContext::new(&data, InterpolationOptions::default()).unwrap();
        assert!(context.ewald.is_none());

        let dynmat = context.dynamical_matrix(Vector3D::new(0.1, 0.0, 0.0));
        assert_eq!(dynmat.dim(), (6, 6));
    }

    #[test]
    fn realspace_sum_rule_option() {
        let data = break_sum_rule(test_data("CsCl"), 1e-3);
        let options = InterpolationOptions {
            acoustic_sum_rule: AcousticSumRule::RealSpace,
            ..Default::default()
        };
        let context = InterpolationContext::new(&data, options).unwrap();
        assert!(context.force_constants() != data.force_constants());

        let result = context.interpolate(&[Vector3D::zero()]).unwrap();
        for branch in 0..3 {
            assert!(result.frequencies[[0, branch]].abs() < 1e-7);
        }
    }

    #[test]
    fn precondition() {
        let data = with_dipole(test_data("ortho"), 1.0, 3.0);
        let qpoints = [
            Vector3D::new(0.1, 0.0, 0.0),
            Vector3D::new(0.2, 0.1, 0.0),
            Vector3D::new(0.3, 0.2, 0.1),
        ];

        let reference = interpolate(&data, &qpoints, InterpolationOptions::default()).unwrap();
        let options = InterpolationOptions {
            precondition: true,
            ..Default::default()
        };
        let preconditioned = interpolate(&data, &qpoints, options).unwrap();

        for (a, b) in reference.frequencies.iter().zip(preconditioned.frequencies.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn invalid_qpoints() {
        let data = test_data("single-ion");
        let error = interpolate(&data, &[Vector3D::new(f64::NAN, 0.0, 0.0)], InterpolationOptions::default()).unwrap_err();
        assert!(matches!(error, Error::InvalidParameter(_)));
    }
}
