//! Enumeration of integer lattice points, used to build the candidate
//! supercell images and the real and reciprocal space Ewald sums.

use crate::{Matrix3, Vector3D};

/// Get all integer points `n` with `-limits[k] <= n[k] <= limits[k]`. The
/// first component varies slowest and the last one fastest.
pub fn integer_box(limits: [i32; 3]) -> Vec<[i32; 3]> {
    let size = limits.iter().map(|&l| (2 * l + 1).max(0) as usize).product();
    let mut points = Vec::with_capacity(size);
    for x in -limits[0]..=limits[0] {
        for y in -limits[1]..=limits[1] {
            for z in -limits[2]..=limits[2] {
                points.push([x, y, z]);
            }
        }
    }
    return points;
}

/// Number of lattice translations needed along each lattice vector (rows of
/// `lattice`) so that all points within `radius` of any point of the cell
/// spanned by `lattice` are covered.
pub fn covering_limits(lattice: &Matrix3, radius: f64) -> [i32; 3] {
    // length of the diagonal of the bounding box of the cell
    let mut extent = Vector3D::zero();
    for i in 0..3 {
        for k in 0..3 {
            extent[k] += lattice[i][k].abs();
        }
    }
    let range = f64::sqrt(radius * radius + extent.norm2());

    let mut limits = [0; 3];
    for (i, limit) in limits.iter_mut().enumerate() {
        *limit = (range / lattice.row(i).norm()) as i32 + 1;
    }
    return limits;
}
