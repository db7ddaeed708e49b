use crate::{Error, Matrix3, Vector3D};
use super::UnitCell;

/// The supercell in which force constants were computed.
///
/// The supercell lattice vectors are the rows of `M · C`, where `M` is the
/// integer transformation matrix and `C` the primitive cell matrix. The
/// supercell contains `|det M|` copies of the primitive cell, translated by the
/// integer `cell_origins`; the first origin is the reference cell `(0, 0, 0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Supercell {
    matrix: [[i32; 3]; 3],
    cell_origins: Vec<[i32; 3]>,
}

impl Supercell {
    /// Create a new supercell from its transformation `matrix` and the list
    /// of `cell_origins`
    pub fn new(matrix: [[i32; 3]; 3], cell_origins: Vec<[i32; 3]>) -> Result<Supercell, Error> {
        let determinant = Matrix3::from(matrix).determinant().round() as i64;
        if determinant == 0 {
            return Err(Error::InvalidParameter(
                "supercell matrix is singular".into()
            ));
        }

        if determinant.unsigned_abs() as usize != cell_origins.len() {
            return Err(Error::InvalidParameter(format!(
                "supercell matrix has a determinant of {}, but {} cell origins were given",
                determinant, cell_origins.len()
            )));
        }

        if cell_origins[0] != [0, 0, 0] {
            return Err(Error::InvalidParameter(format!(
                "the first cell origin must be the reference cell (0, 0, 0), got {:?}",
                cell_origins[0]
            )));
        }

        return Ok(Supercell {
            matrix: matrix,
            cell_origins: cell_origins,
        });
    }

    /// Create a diagonal `n1 x n2 x n3` supercell, with cell origins ordered
    /// with the first axis varying fastest
    pub fn diagonal(n1: i32, n2: i32, n3: i32) -> Result<Supercell, Error> {
        if n1 <= 0 || n2 <= 0 || n3 <= 0 {
            return Err(Error::InvalidParameter(format!(
                "supercell size must be positive, got {}x{}x{}", n1, n2, n3
            )));
        }

        let mut origins = Vec::with_capacity((n1 * n2 * n3) as usize);
        for z in 0..n3 {
            for y in 0..n2 {
                for x in 0..n1 {
                    origins.push([x, y, z]);
                }
            }
        }

        return Supercell::new([[n1, 0, 0], [0, n2, 0], [0, 0, n3]], origins);
    }

    /// Get the integer transformation matrix
    pub fn matrix(&self) -> [[i32; 3]; 3] {
        self.matrix
    }

    /// Get the number of primitive cells in the supercell
    pub fn n_cells(&self) -> usize {
        self.cell_origins.len()
    }

    /// Get the integer origins of the primitive cells in the supercell
    pub fn cell_origins(&self) -> &[[i32; 3]] {
        &self.cell_origins
    }

    /// Get the supercell lattice vectors (as rows) for the given primitive
    /// `cell`
    pub fn lattice(&self, cell: &UnitCell) -> Matrix3 {
        Matrix3::from(self.matrix) * cell.matrix()
    }

    /// Get the cell origins expressed in fractional coordinates of the
    /// supercell lattice, `f = o · M⁻¹`
    pub fn fractional_origins(&self) -> Vec<Vector3D> {
        let inverse = Matrix3::from(self.matrix).inverse();
        self.cell_origins.iter()
            .map(|&origin| Vector3D::from(origin) * inverse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diagonal() {
        let supercell = Supercell::diagonal(2, 1, 3).unwrap();
        assert_eq!(supercell.n_cells(), 6);
        assert_eq!(supercell.cell_origins()[0], [0, 0, 0]);
        assert_eq!(supercell.cell_origins()[1], [1, 0, 0]);
        assert_eq!(supercell.cell_origins()[2], [0, 0, 1]);

        let cell = UnitCell::cubic(2.0).unwrap();
        assert_eq!(supercell.lattice(&cell), Matrix3::diagonal(4.0, 2.0, 6.0));

        let fractional = supercell.fractional_origins();
        assert_relative_eq!(fractional[1], Vector3D::new(0.5, 0.0, 0.0));
        assert_relative_eq!(fractional[5], Vector3D::new(0.5, 0.0, 2.0 / 3.0), max_relative = 1e-15);
    }

    #[test]
    fn non_diagonal() {
        // fcc-like supercell of 2 cells
        let matrix = [[1, 1, 0], [-1, 1, 0], [0, 0, 1]];
        let supercell = Supercell::new(matrix, vec![[0, 0, 0], [1, 0, 0]]).unwrap();
        assert_eq!(supercell.n_cells(), 2);

        let fractional = supercell.fractional_origins();
        // o = f · M
        let back = fractional[1] * Matrix3::from(matrix);
        assert_relative_eq!(back, Vector3D::new(1.0, 0.0, 0.0), epsilon = 1e-15);
    }

    #[test]
    fn invalid() {
        let result = Supercell::new([[2, 0, 0], [0, 1, 0], [0, 0, 1]], vec![[0, 0, 0]]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));

        let result = Supercell::new([[1, 0, 0], [0, 1, 0], [0, 0, 0]], vec![[0, 0, 0]]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));

        let result = Supercell::new([[2, 0, 0], [0, 1, 0], [0, 0, 1]], vec![[1, 0, 0], [0, 0, 0]]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));

        assert!(Supercell::diagonal(0, 1, 1).is_err());
    }
}
