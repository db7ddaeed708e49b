use log::info;
use ndarray::{s, Array3, Array4, ArrayView1};

use crate::{Error, Vector3D};
use crate::math::integer_box;
use crate::systems::{Crystal, Supercell};

/// Maximal number of periodic images for a single ion pair
pub const MAX_IMAGES: usize = 127;

/// Non-zero lattice points defining the faces of the Wigner-Seitz cell, in
/// supercell fractional coordinates
const WIGNER_SEITZ_POINTS: [[i32; 3]; 13] = [
    [0, 0, 1], [0, 1, 0], [0, 1, 1], [0, 1, -1],
    [1, 0, 0], [1, 0, 1], [1, 0, -1], [1, 1, 0], [1, 1, 1],
    [1, 1, -1], [1, -1, 0], [1, -1, 1], [1, -1, -1],
];

const WIGNER_SEITZ_SCALE: f64 = 1.0;
const WIGNER_SEITZ_TOLERANCE: f64 = 0.001;

/// Periodic images of every ion pair inside the Wigner-Seitz cell of the
/// supercell.
///
/// For each origin cell `c` and ions `i` (in the reference cell) and `j` (in
/// cell `c`), this stores the indices of the supercell translations `n` (in
/// [`SupercellImages::candidates`]) such that the vector from the image of `j`
/// translated by `n` to `i` lies in the Wigner-Seitz cell. An ion sitting
/// exactly on a face of the cell has multiple equivalent images.
#[derive(Debug, Clone)]
pub struct SupercellImages {
    candidates: Vec<[i32; 3]>,
    counts: Array3<usize>,
    /// image indices, padded with `candidates.len()` up to `max_images`
    indices: Array4<usize>,
}

impl SupercellImages {
    /// Search for periodic images within `[-limit, limit]` supercells along
    /// each axis
    #[time_graph::instrument(name = "SupercellImages::new")]
    pub fn new(crystal: &Crystal, supercell: &Supercell, limit: usize) -> Result<SupercellImages, Error> {
        let n_ions = crystal.size();
        let n_cells = supercell.n_cells();
        let cell = crystal.cell();
        let lattice = supercell.lattice(cell);

        let faces = WIGNER_SEITZ_POINTS.iter()
            .map(|&point| {
                let w = Vector3D::from(point) * lattice;
                (w, 1.0 / w.norm2())
            })
            .collect::<Vec<_>>();

        let limit = limit as i32;
        let candidates = integer_box([limit, limit, limit]);
        let translations = candidates.iter()
            .map(|&n| Vector3D::from(n) * lattice)
            .collect::<Vec<_>>();

        let positions = supercell.cell_origins().iter()
            .map(|&origin| {
                crystal.positions().iter()
                    .map(|&r| cell.cartesian(Vector3D::from(origin) + r))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let max_fraction = 0.5 * WIGNER_SEITZ_SCALE + WIGNER_SEITZ_TOLERANCE;

        let mut found = Vec::with_capacity(n_cells * n_ions * n_ions);
        for c in 0..n_cells {
            for i in 0..n_ions {
                for j in 0..n_ions {
                    let distance = positions[0][i] - positions[c][j];
                    let images = translations.iter()
                        .enumerate()
                        .filter(|&(_, t)| {
                            let d = distance - t;
                            faces.iter().all(|&(w, inv_w2)| f64::abs(d * w) * inv_w2 <= max_fraction)
                        })
                        .map(|(k, _)| k)
                        .collect::<Vec<_>>();

                    if images.is_empty() {
                        return Err(Error::InvalidGeometry(format!(
                            "no periodic image found for ions {} and {} in cell {}, try increasing the image limit",
                            i, j, c
                        )));
                    }

                    if images.len() > MAX_IMAGES {
                        return Err(Error::InvalidGeometry(format!(
                            "found {} periodic images for ions {} and {} in cell {}, the maximum is {}",
                            images.len(), i, j, c, MAX_IMAGES
                        )));
                    }

                    found.push(images);
                }
            }
        }

        let max_images = found.iter().map(Vec::len).max().unwrap_or(0);
        let sentinel = candidates.len();

        let mut counts = Array3::zeros((n_cells, n_ions, n_ions));
        let mut indices = Array4::from_elem((n_cells, n_ions, n_ions, max_images), sentinel);
        let mut found = found.into_iter();
        for c in 0..n_cells {
            for i in 0..n_ions {
                for j in 0..n_ions {
                    if let Some(images) = found.next() {
                        counts[[c, i, j]] = images.len();
                        for (k, image) in images.into_iter().enumerate() {
                            indices[[c, i, j, k]] = image;
                        }
                    }
                }
            }
        }

        info!(
            "found up to {} periodic images per ion pair among {} candidate supercells",
            max_images, candidates.len()
        );

        return Ok(SupercellImages {
            candidates: candidates,
            counts: counts,
            indices: indices,
        });
    }

    /// Get the candidate supercell translations, in units of the supercell
    /// lattice vectors
    pub fn candidates(&self) -> &[[i32; 3]] {
        &self.candidates
    }

    /// Get the index used for padding, equal to the number of candidates
    pub fn sentinel(&self) -> usize {
        self.candidates.len()
    }

    /// Get the largest number of images for a single ion pair
    pub fn max_images(&self) -> usize {
        self.indices.shape()[3]
    }

    /// Get the number of images for all `(cell, i, j)` triples
    pub fn counts(&self) -> &Array3<usize> {
        &self.counts
    }

    /// Get the padded image indices for all `(cell, i, j)` triples
    pub fn padded_indices(&self) -> &Array4<usize> {
        &self.indices
    }

    /// Get the indices of the images of ion `j` in `cell` as seen from ion
    /// `i` in the reference cell
    pub fn images(&self, cell: usize, i: usize, j: usize) -> ArrayView1<'_, usize> {
        let count = self.counts[[cell, i, j]];
        self.indices.slice(s![cell, i, j, ..count])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::{UnitCell, test_utils::test_data};

    #[test]
    fn single_ion() {
        let data = test_data("single-ion");
        let images = SupercellImages::new(data.crystal(), data.supercell(), 2).unwrap();

        assert_eq!(images.candidates().len(), 125);
        assert_eq!(images.max_images(), 1);
        assert_eq!(images.counts()[[0, 0, 0]], 1);

        let index = images.images(0, 0, 0)[0];
        assert_eq!(images.candidates()[index], [0, 0, 0]);
    }

    #[test]
    fn face_images() {
        // in a 2x2x2 supercell, ions at half the supercell length are on the
        // faces of the Wigner-Seitz cell
        let data = test_data("CsCl");
        let images = SupercellImages::new(data.crystal(), data.supercell(), 2).unwrap();

        // cell (1, 0, 0): same species at distance a, two images along x
        assert_eq!(images.counts()[[1, 0, 0]], 2);
        let mut found = images.images(1, 0, 0).iter()
            .map(|&k| images.candidates()[k])
            .collect::<Vec<_>>();
        found.sort_unstable();
        assert_eq!(found, vec![[-1, 0, 0], [0, 0, 0]]);

        // cell (1, 1, 1) is at the corner of the Wigner-Seitz cell
        assert_eq!(images.counts()[[7, 0, 0]], 8);

        // Cl in the reference cell is inside the Wigner-Seitz cell
        assert_eq!(images.counts()[[0, 0, 1]], 1);

        assert_eq!(images.max_images(), 8);
        let padded = images.padded_indices();
        assert_eq!(padded[[0, 0, 1, 1]], images.sentinel());
    }

    #[test]
    fn missing_images() {
        let crystal = Crystal::new(
            UnitCell::cubic(3.0).unwrap(),
            vec![Vector3D::zero()],
            vec!["X".into()],
            vec![1.0],
        ).unwrap();
        let supercell = Supercell::new(
            [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            vec![[0, 0, 0]],
        ).unwrap();

        // with no candidate translation besides 0, images are still found
        assert!(SupercellImages::new(&crystal, &supercell, 0).is_ok());

        // a cell origin far outside of the supercell can not be reached
        let far = Supercell::new(
            [[1, 0, 0], [0, 1, 0], [0, 0, 2]],
            vec![[0, 0, 0], [0, 0, 7]],
        ).unwrap();
        let error = SupercellImages::new(&crystal, &far, 1).unwrap_err();
        assert!(matches!(error, Error::InvalidGeometry(_)));
    }
}
