use crate::{Error, Vector3D};
use super::UnitCell;

/// Geometry and masses of the ions in the primitive cell of a crystal.
///
/// Fractional positions are always stored wrapped into `[0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Crystal {
    cell: UnitCell,
    positions: Vec<Vector3D>,
    species: Vec<String>,
    masses: Vec<f64>,
}

impl Crystal {
    /// Create a new crystal from its unit `cell`, the fractional `positions`
    /// of the ions, their `species` labels and their `masses` (in electron
    /// masses).
    pub fn new(
        cell: UnitCell,
        positions: Vec<Vector3D>,
        species: Vec<String>,
        masses: Vec<f64>,
    ) -> Result<Crystal, Error> {
        if positions.is_empty() {
            return Err(Error::InvalidParameter(
                "a crystal must contain at least one ion".into()
            ));
        }

        if species.len() != positions.len() || masses.len() != positions.len() {
            return Err(Error::InvalidParameter(format!(
                "got {} positions, {} species and {} masses, these should all be the same",
                positions.len(), species.len(), masses.len()
            )));
        }

        for (i, &mass) in masses.iter().enumerate() {
            if !(mass.is_finite() && mass > 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "mass of ion {} must be positive, got {}", i, mass
                )));
            }
        }

        let mut wrapped = Vec::with_capacity(positions.len());
        for position in positions {
            if position.as_array().iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidParameter(
                    "ion positions must be finite".into()
                ));
            }
            wrapped.push(wrap_fractional(position));
        }

        return Ok(Crystal {
            cell: cell,
            positions: wrapped,
            species: species,
            masses: masses,
        });
    }

    /// Get the unit cell of this crystal
    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    /// Get the number of ions in the primitive cell
    pub fn size(&self) -> usize {
        self.positions.len()
    }

    /// Get the fractional positions of the ions, wrapped into `[0, 1)`
    pub fn positions(&self) -> &[Vector3D] {
        &self.positions
    }

    /// Get the Cartesian positions of the ions, in Bohr
    pub fn cartesian_positions(&self) -> Vec<Vector3D> {
        self.positions.iter().map(|&r| self.cell.cartesian(r)).collect()
    }

    /// Get the species label of all ions
    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Get the mass of all ions, in electron masses
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }
}

fn wrap_fractional(mut position: Vector3D) -> Vector3D {
    for k in 0..3 {
        position[k] -= position[k].floor();
        // values like -1e-17 wrap to exactly 1.0
        if position[k] >= 1.0 {
            position[k] = 0.0;
        }
    }
    return position;
}
