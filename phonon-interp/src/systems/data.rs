use ndarray::Array3;

use crate::{Error, Matrix3, Vector3D};
use super::{Crystal, Supercell, UnitCell};

/// Born effective charges and dielectric tensor, needed for the long-range
/// dipole-dipole correction and the LO-TO splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct DipoleData {
    /// Born effective charge tensor of each ion, `Z[i][a][b]`, in units of
    /// the elementary charge
    pub born: Vec<Matrix3>,
    /// Static (high frequency) dielectric permittivity tensor
    pub dielectric: Matrix3,
}

/// All the data needed to interpolate phonon frequencies and eigenvectors:
/// crystal geometry, supercell description, real space force constants and
/// optionally the data for the dipole correction.
#[derive(Debug, Clone)]
pub struct InterpolationData {
    crystal: Crystal,
    supercell: Supercell,
    force_constants: Array3<f64>,
    dipole: Option<DipoleData>,
}

impl InterpolationData {
    /// Bundle and validate interpolation data.
    ///
    /// `force_constants` must have shape `(n_cells, 3 n_ions, 3 n_ions)`, with
    /// element `[c, 3 i + a, 3 j + b]` containing the force constant (in
    /// Hartree/Bohr²) between ion `i` in the reference cell along `a` and ion
    /// `j` in cell `c` along `b`.
    pub fn new(
        crystal: Crystal,
        supercell: Supercell,
        force_constants: Array3<f64>,
        dipole: Option<DipoleData>,
    ) -> Result<InterpolationData, Error> {
        let n_ions = crystal.size();
        let expected = (supercell.n_cells(), 3 * n_ions, 3 * n_ions);
        if force_constants.dim() != expected {
            return Err(Error::InvalidParameter(format!(
                "force constants should have shape {:?}, got {:?}",
                expected, force_constants.dim()
            )));
        }

        if force_constants.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(
                "force constants contain non-finite values".into()
            ));
        }

        if let Some(ref dipole) = dipole {
            if dipole.born.len() != n_ions {
                return Err(Error::InvalidParameter(format!(
                    "expected {} Born charge tensors, got {}",
                    n_ions, dipole.born.len()
                )));
            }

            if dipole.dielectric.determinant() <= 0.0 {
                return Err(Error::InvalidParameter(
                    "the dielectric tensor must be positive definite".into()
                ));
            }
        }

        return Ok(InterpolationData {
            crystal: crystal,
            supercell: supercell,
            force_constants: force_constants,
            dipole: dipole,
        });
    }

    /// Read interpolation data from a JSON string. All values use atomic
    /// units, with the following layout:
    ///
    /// ```json
    /// {
    ///     "cell": [[a_x, a_y, a_z], [b_x, b_y, b_z], [c_x, c_y, c_z]],
    ///     "positions": [[0.0, 0.0, 0.0], ...],
    ///     "species": ["Na", ...],
    ///     "masses": [41907.4, ...],
    ///     "supercell_matrix": [[2, 0, 0], [0, 2, 0], [0, 0, 2]],
    ///     "cell_origins": [[0, 0, 0], ...],
    ///     "force_constants": [[[...]]],
    ///     "born": [[[...]]],
    ///     "dielectric": [[...]]
    /// }
    /// ```
    ///
    /// `born` and `dielectric` are optional, but must be given together.
    pub fn from_json(json: &str) -> Result<InterpolationData, Error> {
        let raw: RawInterpolationData = serde_json::from_str(json)?;

        let cell = UnitCell::try_from(Matrix3::new(raw.cell))?;
        let positions = raw.positions.into_iter().map(Vector3D::from).collect();
        let crystal = Crystal::new(cell, positions, raw.species, raw.masses)?;
        let supercell = Supercell::new(raw.supercell_matrix, raw.cell_origins)?;

        let n_cells = raw.force_constants.len();
        let n_rows = raw.force_constants.first().map_or(0, Vec::len);
        let mut force_constants = Array3::zeros((n_cells, n_rows, n_rows));
        for (c, block) in raw.force_constants.iter().enumerate() {
            if block.len() != n_rows || block.iter().any(|row| row.len() != n_rows) {
                return Err(Error::InvalidParameter(format!(
                    "force constants block for cell {} is not a square {}x{} matrix",
                    c, n_rows, n_rows
                )));
            }
            for (r, row) in block.iter().enumerate() {
                for (s, &value) in row.iter().enumerate() {
                    force_constants[[c, r, s]] = value;
                }
            }
        }

        let dipole = match (raw.born, raw.dielectric) {
            (Some(born), Some(dielectric)) => Some(DipoleData {
                born: born.into_iter().map(Matrix3::new).collect(),
                dielectric: Matrix3::new(dielectric),
            }),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidParameter(
                    "'born' and 'dielectric' must be given together".into()
                ));
            }
        };

        return InterpolationData::new(crystal, supercell, force_constants, dipole);
    }

    /// Get the crystal geometry
    pub fn crystal(&self) -> &Crystal {
        &self.crystal
    }

    /// Get the supercell used to compute the force constants
    pub fn supercell(&self) -> &Supercell {
        &self.supercell
    }

    /// Get the raw force constants
    pub fn force_constants(&self) -> &Array3<f64> {
        &self.force_constants
    }

    /// Get the Born charges and dielectric tensor, if any
    pub fn dipole(&self) -> Option<&DipoleData> {
        self.dipole.as_ref()
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInterpolationData {
    cell: [[f64; 3]; 3],
    positions: Vec<[f64; 3]>,
    species: Vec<String>,
    masses: Vec<f64>,
    supercell_matrix: [[i32; 3]; 3],
    cell_origins: Vec<[i32; 3]>,
    force_constants: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    born: Option<Vec<[[f64; 3]; 3]>>,
    #[serde(default)]
    dielectric: Option<[[f64; 3]; 3]>,
}
