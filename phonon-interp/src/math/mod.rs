mod erf;
pub use self::erf::{erf, erfc};

mod eigen;
pub use self::eigen::SymmetricEigen;

mod hermitian;
pub use self::hermitian::HermitianEigen;

mod lattice;
pub(crate) use self::lattice::{integer_box, covering_limits};
