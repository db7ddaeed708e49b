#![allow(dead_code)]

use ndarray::ArrayView3;
use num_complex::Complex64;
use serde_json::{json, Value};

use phonon_interp::{InterpolationData, Matrix3, Vector3D};

/// Description of a crystal where ions are linked by central springs
pub struct SpringModel {
    pub cell: [[f64; 3]; 3],
    pub positions: Vec<[f64; 3]>,
    pub species: Vec<&'static str>,
    pub masses: Vec<f64>,
    pub supercell: [i32; 3],
    pub cutoff: f64,
    pub stiffness: f64,
    /// isotropic Born charges of each ion and isotropic dielectric constant
    pub dipole: Option<(Vec<f64>, f64)>,
}

/// CsCl structure, with a cubic cell of side 5 Bohr
pub fn cscl() -> SpringModel {
    SpringModel {
        cell: [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]],
        positions: vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        species: vec!["Cs", "Cl"],
        masses: vec![242271.0, 64626.0],
        supercell: [2, 2, 2],
        cutoff: 5.5,
        stiffness: 0.05,
        dipole: Some((vec![0.5, -0.5], 4.0)),
    }
}

/// Two ions in an orthorhombic cell, with different force constants along
/// each axis
pub fn orthorhombic() -> SpringModel {
    SpringModel {
        cell: [[4.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 6.0]],
        positions: vec![[0.1, 0.0, 0.0], [0.6, 0.5, 0.5]],
        species: vec!["A", "B"],
        masses: vec![20000.0, 30000.0],
        supercell: [3, 2, 2],
        cutoff: 4.9,
        stiffness: 0.08,
        dipole: Some((vec![1.0, -1.0], 3.0)),
    }
}

impl SpringModel {
    /// Get the JSON representation of this model, in the format expected by
    /// `InterpolationData::from_json`
    pub fn to_json(&self) -> Value {
        let [n1, n2, n3] = self.supercell;
        let mut origins = Vec::new();
        for z in 0..n3 {
            for y in 0..n2 {
                for x in 0..n1 {
                    origins.push([x, y, z]);
                }
            }
        }

        let force_constants = self.force_constants(&origins);

        let mut value = json!({
            "cell": self.cell,
            "positions": self.positions,
            "species": self.species,
            "masses": self.masses,
            "supercell_matrix": [[n1, 0, 0], [0, n2, 0], [0, 0, n3]],
            "cell_origins": origins,
            "force_constants": force_constants,
        });

        if let Some((ref charges, dielectric)) = self.dipole {
            let born = charges.iter()
                .map(|&z| [[z, 0.0, 0.0], [0.0, z, 0.0], [0.0, 0.0, z]])
                .collect::<Vec<_>>();
            value["born"] = json!(born);
            value["dielectric"] = json!([[dielectric, 0.0, 0.0], [0.0, dielectric, 0.0], [0.0, 0.0, dielectric]]);
        }

        return value;
    }

    /// Load this model as interpolation data
    pub fn load(&self) -> InterpolationData {
        let json = self.to_json().to_string();
        InterpolationData::from_json(&json).expect("invalid spring model")
    }

    /// Load this model without Born charges or dielectric tensor
    pub fn load_without_dipole(&self) -> InterpolationData {
        let mut json = self.to_json();
        if let Some(object) = json.as_object_mut() {
            object.remove("born");
            object.remove("dielectric");
        }
        InterpolationData::from_json(&json.to_string()).expect("invalid spring model")
    }

    fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        fractional * Matrix3::new(self.cell)
    }

    /// Force constants with stiffness `k / r²` for every spring shorter than
    /// the cutoff, satisfying the acoustic sum rule
    fn force_constants(&self, origins: &[[i32; 3]]) -> Vec<Vec<Vec<f64>>> {
        let n_ions = self.positions.len();
        let n_rows = 3 * n_ions;
        let mut fc = vec![vec![vec![0.0; n_rows]; n_rows]; origins.len()];

        let supercell = Matrix3::diagonal(
            self.supercell[0] as f64,
            self.supercell[1] as f64,
            self.supercell[2] as f64,
        ) * Matrix3::new(self.cell);

        for i in 0..n_ions {
            let center = self.cartesian(Vector3D::from(self.positions[i]));
            let mut self_block = Matrix3::zero();

            for (c, &origin) in origins.iter().enumerate() {
                for j in 0..n_ions {
                    if c == 0 && i == j {
                        continue;
                    }

                    let position = self.cartesian(Vector3D::from(origin) + Vector3D::from(self.positions[j]));
                    let mut block = Matrix3::zero();
                    for x in -2..=2 {
                        for y in -2..=2 {
                            for z in -2..=2 {
                                let image = Vector3D::from([x, y, z]) * supercell;
                                let d = position + image - center;
                                let distance = d.norm();
                                if distance < 1e-8 || distance > self.cutoff {
                                    continue;
                                }
                                let direction = d / distance;
                                block -= self.stiffness / (distance * distance) * Matrix3::outer(direction, direction);
                            }
                        }
                    }

                    self_block -= block;
                    for a in 0..3 {
                        for b in 0..3 {
                            fc[c][3 * i + a][3 * j + b] = block[a][b];
                        }
                    }
                }
            }

            for a in 0..3 {
                for b in 0..3 {
                    fc[0][3 * i + a][3 * i + b] = self_block[a][b];
                }
            }
        }

        return fc;
    }
}

/// Get the indices of the acoustic branches at the zone center, i.e. the
/// branches where the mass-weighted `eigenvectors` (with shape `(n_branches,
/// n_ions, 3)`) mostly describe a rigid translation of the crystal
pub fn acoustic_branches(eigenvectors: ArrayView3<'_, Complex64>, masses: &[f64]) -> Vec<usize> {
    let total_mass = masses.iter().sum::<f64>();

    let mut acoustic = Vec::new();
    for branch in 0..eigenvectors.shape()[0] {
        let mut translation = [Complex64::new(0.0, 0.0); 3];
        for (ion, mass) in masses.iter().enumerate() {
            for a in 0..3 {
                translation[a] += mass.sqrt() * eigenvectors[[branch, ion, a]];
            }
        }

        let weight = translation.iter().map(|v| v.norm_sqr()).sum::<f64>() / total_mass;
        if weight > 0.5 {
            acoustic.push(branch);
        }
    }

    return acoustic;
}
