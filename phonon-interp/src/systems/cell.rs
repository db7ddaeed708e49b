//! The `UnitCell` type represents the periodic lattice of a crystal, and
//! provides conversions between fractional and Cartesian coordinates in both
//! real and reciprocal space.
use std::f64::consts::PI;

use crate::{Error, Matrix3, Vector3D};

/// A `UnitCell` defines the periodic lattice of a crystal. The rows of the
/// cell matrix are the lattice vectors `a`, `b` and `c`, in Bohr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    /// Unit cell matrix
    matrix: Matrix3,
    /// Transpose of the unit cell matrix, cached from matrix
    transpose: Matrix3,
    /// Inverse of the transpose of the unit cell matrix, cached from matrix
    inverse: Matrix3,
}

impl TryFrom<Matrix3> for UnitCell {
    type Error = Error;

    fn try_from(matrix: Matrix3) -> Result<UnitCell, Error> {
        if matrix.as_array().iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(
                "unit cell matrix contains non-finite values".into()
            ));
        }

        let determinant = matrix.determinant();
        if determinant <= 1e-6 {
            return Err(Error::InvalidParameter(format!(
                "unit cell matrix must be invertible and right-handed, got a determinant of {}",
                determinant
            )));
        }

        return Ok(UnitCell {
            matrix: matrix,
            transpose: matrix.transposed(),
            inverse: matrix.transposed().inverse(),
        });
    }
}

impl UnitCell {
    /// Create an orthorhombic unit cell, with side lengths `a, b, c`.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<UnitCell, Error> {
        if !(a > 0.0 && b > 0.0 && c > 0.0) {
            return Err(Error::InvalidParameter(
                "cell lengths must be positive".into()
            ));
        }
        return UnitCell::try_from(Matrix3::diagonal(a, b, c));
    }

    /// Create a cubic unit cell, with side lengths `length, length, length`.
    pub fn cubic(length: f64) -> Result<UnitCell, Error> {
        UnitCell::orthorhombic(length, length, length)
    }

    /// Get the matricial representation of the unit cell
    pub fn matrix(&self) -> Matrix3 {
        self.matrix
    }

    /// Get the lengths of the three lattice vectors
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.matrix.row(0).norm(),
            self.matrix.row(1).norm(),
            self.matrix.row(2).norm(),
        ]
    }

    /// Get the volume of the cell
    pub fn volume(&self) -> f64 {
        // the determinant is positive for all valid cells
        let (a, b, c) = (self.matrix.row(0), self.matrix.row(1), self.matrix.row(2));
        return a * (b ^ c);
    }

    /// Get the reciprocal lattice of this cell, with the convention
    /// `a_i · b_j = 2π δ_ij`. The rows of the returned matrix are the
    /// reciprocal lattice vectors, in inverse Bohr.
    pub fn reciprocal(&self) -> Matrix3 {
        2.0 * PI * self.inverse
    }

    /// Get the Cartesian representation of the `fractional` vector in this
    /// cell
    pub fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        return self.transpose * fractional;
    }

    /// Get the Cartesian representation of a q-point given in fractional
    /// reciprocal coordinates
    pub fn reciprocal_cartesian(&self, qpoint: Vector3D) -> Vector3D {
        return qpoint * self.reciprocal();
    }
}
