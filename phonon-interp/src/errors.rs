#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Got an invalid parameter value in a function, or inconsistent input
    /// data
    InvalidParameter(String),
    /// Error while serializing/deserializing data
    Json(serde_json::Error),
    /// No periodic image of an ion pair was found inside the Wigner-Seitz
    /// cell of the supercell, or too many were found
    InvalidGeometry(String),
    /// The dipole correction or LO-TO splitting was requested, but the Born
    /// charges or dielectric tensor are missing
    MissingPhysicalData(String),
    /// Fewer than 3 acoustic modes were found while enforcing the acoustic
    /// sum rule
    AcousticModeNotFound {
        /// number of acoustic modes actually found
        found: usize,
    },
    /// Could not match the relative position of two cells in the supercell
    /// to one of the cell origins
    GeometryMatchFailure(String),
    /// Both the primary and fallback eigensolvers failed
    EigenDecomposition(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidParameter(e) => write!(f, "invalid parameter: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::InvalidGeometry(e) => write!(f, "invalid geometry: {}", e),
            Error::MissingPhysicalData(e) => write!(f, "missing physical data: {}", e),
            Error::AcousticModeNotFound { found } => write!(
                f, "could not find 3 acoustic modes, only {} were found", found
            ),
            Error::GeometryMatchFailure(e) => write!(f, "supercell geometry mismatch: {}", e),
            Error::EigenDecomposition(e) => write!(f, "eigendecomposition failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidParameter(_) |
            Error::InvalidGeometry(_) |
            Error::MissingPhysicalData(_) |
            Error::AcousticModeNotFound { .. } |
            Error::GeometryMatchFailure(_) |
            Error::EigenDecomposition(_) => None,
            Error::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::Json(error)
    }
}
