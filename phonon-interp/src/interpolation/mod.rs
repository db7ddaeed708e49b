//! Fourier interpolation of phonon dynamical matrices from real space force
//! constants, with long range dipole corrections, acoustic sum rule
//! enforcement and LO-TO splitting at the zone center.

mod images;
pub use self::images::{SupercellImages, MAX_IMAGES};

mod dynmat;
pub use self::dynmat::DynamicalMatrixBuilder;

mod ewald;
pub use self::ewald::EwaldSum;

mod asr;
pub use self::asr::{realspace_sum_rule, ReciprocalSumRule};

mod modes;
pub use self::modes::{PhononModes, SplitModes, mass_weight, solve};

mod engine;
pub use self::engine::{AcousticSumRule, InterpolationOptions};
pub use self::engine::{InterpolationContext, InterpolationResult};
pub use self::engine::{interpolate, is_gamma};
