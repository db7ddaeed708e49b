use std::ops::{Add, Sub, Mul, Div, Neg, Index, IndexMut};
use std::ops::{AddAssign, SubAssign};

use super::Vector3D;

/// A 3x3 matrix type, stored in row-major order.
///
/// `matrix[i]` is the `i`-th row, and `matrix[i][j]` a single element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Matrix3([[f64; 3]; 3]);

impl Matrix3 {
    /// Create a new `Matrix3` from its rows
    pub fn new(rows: [[f64; 3]; 3]) -> Matrix3 {
        Matrix3(rows)
    }

    /// Create a new `Matrix3` filled with zeros
    pub fn zero() -> Matrix3 {
        Matrix3([[0.0; 3]; 3])
    }

    /// Create the identity matrix
    pub fn one() -> Matrix3 {
        Matrix3([
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ])
    }

    /// Create a diagonal matrix with the given diagonal values
    pub fn diagonal(x: f64, y: f64, z: f64) -> Matrix3 {
        Matrix3([
            [x, 0.0, 0.0],
            [0.0, y, 0.0],
            [0.0, 0.0, z],
        ])
    }

    /// Get the `i`-th row of this matrix as a vector
    pub fn row(&self, i: usize) -> Vector3D {
        Vector3D::from(self.0[i])
    }

    /// Get the `j`-th column of this matrix as a vector
    pub fn column(&self, j: usize) -> Vector3D {
        Vector3D::new(self.0[0][j], self.0[1][j], self.0[2][j])
    }

    /// Get the transpose of this matrix
    pub fn transposed(&self) -> Matrix3 {
        let m = &self.0;
        Matrix3([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    /// Sum of the diagonal elements
    pub fn trace(&self) -> f64 {
        self.0[0][0] + self.0[1][1] + self.0[2][2]
    }

    /// Compute the determinant of this matrix
    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        let x = m[0][0] * (m[1][1] * m[2][2] - m[2][1] * m[1][2]);
        let y = m[1][0] * (m[0][1] * m[2][2] - m[0][2] * m[2][1]);
        let z = m[2][0] * (m[0][1] * m[1][2] - m[0][2] * m[1][1]);
        return x - y + z;
    }

    /// Compute the inverse of this matrix. The caller is responsible for
    /// checking that the matrix is not singular.
    pub fn inverse(&self) -> Matrix3 {
        let m = &self.0;
        let inv_det = 1.0 / self.determinant();

        let mut res = [[0.0; 3]; 3];
        res[0][0] = (m[1][1] * m[2][2] - m[2][1] * m[1][2]) * inv_det;
        res[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
        res[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
        res[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
        res[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
        res[1][2] = (m[1][0] * m[0][2] - m[0][0] * m[1][2]) * inv_det;
        res[2][0] = (m[1][0] * m[2][1] - m[2][0] * m[1][1]) * inv_det;
        res[2][1] = (m[2][0] * m[0][1] - m[0][0] * m[2][1]) * inv_det;
        res[2][2] = (m[0][0] * m[1][1] - m[1][0] * m[0][1]) * inv_det;
        return Matrix3(res);
    }

    /// Outer product `u ⊗ v` of two vectors
    pub fn outer(u: Vector3D, v: Vector3D) -> Matrix3 {
        let mut res = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                res[i][j] = u[i] * v[j];
            }
        }
        return Matrix3(res);
    }

    /// Largest absolute value of the elements of this matrix
    pub fn max_abs(&self) -> f64 {
        self.0.iter().flatten().fold(0.0, |acc, v| f64::max(acc, v.abs()))
    }

    /// Get the underlying array of rows
    pub fn as_array(&self) -> &[[f64; 3]; 3] {
        &self.0
    }
}

impl From<[[f64; 3]; 3]> for Matrix3 {
    fn from(rows: [[f64; 3]; 3]) -> Matrix3 {
        Matrix3(rows)
    }
}

impl From<[[i32; 3]; 3]> for Matrix3 {
    fn from(rows: [[i32; 3]; 3]) -> Matrix3 {
        let mut res = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                res[i][j] = rows[i][j] as f64;
            }
        }
        Matrix3(res)
    }
}

impl Index<usize> for Matrix3 {
    type Output = [f64; 3];
    #[inline]
    fn index(&self, index: usize) -> &[f64; 3] {
        &self.0[index]
    }
}

impl IndexMut<usize> for Matrix3 {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut [f64; 3] {
        &mut self.0[index]
    }
}

impl_arithmetic!(
    Matrix3, Matrix3, Add, add, Matrix3,
    self, other,
    {
        let mut res = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                res[i][j] = self[i][j] + other[i][j];
            }
        }
        Matrix3(res)
    }
);

impl_arithmetic!(
    Matrix3, Matrix3, Sub, sub, Matrix3,
    self, other,
    {
        let mut res = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                res[i][j] = self[i][j] - other[i][j];
            }
        }
        Matrix3(res)
    }
);

// matrix-matrix product
impl_arithmetic!(
    Matrix3, Matrix3, Mul, mul, Matrix3,
    self, other,
    {
        let mut res = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                res[i][j] = self[i][0] * other[0][j]
                          + self[i][1] * other[1][j]
                          + self[i][2] * other[2][j];
            }
        }
        Matrix3(res)
    }
);

// matrix-vector product
impl_arithmetic!(
    Matrix3, Vector3D, Mul, mul, Vector3D,
    self, other,
    Vector3D::new(
        self[0][0] * other[0] + self[0][1] * other[1] + self[0][2] * other[2],
        self[1][0] * other[0] + self[1][1] * other[1] + self[1][2] * other[2],
        self[2][0] * other[0] + self[2][1] * other[1] + self[2][2] * other[2],
    )
);

// row vector-matrix product
impl_arithmetic!(
    Vector3D, Matrix3, Mul, mul, Vector3D,
    self, other,
    Vector3D::new(
        self[0] * other[0][0] + self[1] * other[1][0] + self[2] * other[2][0],
        self[0] * other[0][1] + self[1] * other[1][1] + self[2] * other[2][1],
        self[0] * other[0][2] + self[1] * other[1][2] + self[2] * other[2][2],
    )
);

lsh_scal_arithmetic!(
    Matrix3, Mul, mul, Matrix3,
    self, other,
    {
        let mut res = self.0;
        for row in &mut res {
            for value in row {
                *value *= other;
            }
        }
        Matrix3(res)
    }
);

rhs_scal_arithmetic!(
    Matrix3, Mul, mul, Matrix3,
    self, other,
    other * self
);

lsh_scal_arithmetic!(
    Matrix3, Div, div, Matrix3,
    self, other,
    self * (1.0 / other)
);

impl_inplace_arithmetic!(
    Matrix3, Matrix3, AddAssign, add_assign,
    self, other,
    {
        for i in 0..3 {
            for j in 0..3 {
                self[i][j] += other[i][j];
            }
        }
    }
);

impl_inplace_arithmetic!(
    Matrix3, Matrix3, SubAssign, sub_assign,
    self, other,
    {
        for i in 0..3 {
            for j in 0..3 {
                self[i][j] -= other[i][j];
            }
        }
    }
);

impl Neg for Matrix3 {
    type Output = Matrix3;
    fn neg(self) -> Matrix3 {
        -1.0 * self
    }
}

impl approx::AbsDiffEq for Matrix3 {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Matrix3, epsilon: f64) -> bool {
        (0..3).all(|i| (0..3).all(|j| f64::abs_diff_eq(&self[i][j], &other[i][j], epsilon)))
    }
}

impl approx::RelativeEq for Matrix3 {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Matrix3, epsilon: f64, max_relative: f64) -> bool {
        (0..3).all(|i| (0..3).all(|j| {
            f64::relative_eq(&self[i][j], &other[i][j], epsilon, max_relative)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_relative_eq, assert_ulps_eq};

    #[test]
    fn determinant() {
        let m = Matrix3::new([[1.0, 2.0, 3.0], [0.0, 1.0, 4.0], [5.0, 6.0, 0.0]]);
        assert_ulps_eq!(m.determinant(), 1.0);
        assert_eq!(Matrix3::diagonal(2.0, 3.0, 4.0).determinant(), 24.0);
    }

    #[test]
    fn inverse() {
        let m = Matrix3::new([[1.0, 2.0, 3.0], [0.0, 1.0, 4.0], [5.0, 6.0, 0.0]]);
        let inverse = m.inverse();
        assert_relative_eq!(m * inverse, Matrix3::one(), epsilon = 1e-12);
        assert_relative_eq!(inverse * m, Matrix3::one(), epsilon = 1e-12);
    }

    #[test]
    fn products() {
        let m = Matrix3::new([[1.0, 2.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 3.0]]);
        let v = Vector3D::new(1.0, 1.0, 1.0);

        assert_eq!(m * v, Vector3D::new(3.0, 1.0, 3.0));
        assert_eq!(v * m, Vector3D::new(1.0, 3.0, 3.0));
        assert_eq!(v * m, m.transposed() * v);

        let outer = Matrix3::outer(Vector3D::new(1.0, 2.0, 3.0), Vector3D::new(0.0, 1.0, 0.0));
        assert_eq!(outer.column(1), Vector3D::new(1.0, 2.0, 3.0));
        assert_eq!(outer.trace(), 2.0);
    }
}
