//! Immutable description of the crystal, the supercell and the force constants
//! used as input for the interpolation.

mod cell;
pub use self::cell::UnitCell;

mod crystal;
pub use self::crystal::Crystal;

mod supercell;
pub use self::supercell::Supercell;

mod data;
pub use self::data::{InterpolationData, DipoleData};

#[cfg(test)]
pub(crate) mod test_utils;
