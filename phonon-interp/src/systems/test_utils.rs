use ndarray::Array3;

use crate::{Matrix3, Vector3D};
use crate::math::integer_box;
use super::{Crystal, DipoleData, InterpolationData, Supercell, UnitCell};

pub fn test_data(name: &str) -> InterpolationData {
    match name {
        "single-ion" => single_ion([0.1, 0.2, 0.3], 1837.0),
        "CsCl" => get_cscl(),
        "CsCl-dipole" => with_dipole(get_cscl(), 1.2, 4.0),
        "ortho" => get_orthorhombic(),
        _ => panic!("unknown test data {}", name)
    }
}

/// One ion in a cubic cell, with only diagonal self force constants
pub fn single_ion(force_constants: [f64; 3], mass: f64) -> InterpolationData {
    let crystal = Crystal::new(
        UnitCell::cubic(4.0).unwrap(),
        vec![Vector3D::zero()],
        vec!["X".into()],
        vec![mass],
    ).unwrap();

    let mut fc = Array3::zeros((1, 3, 3));
    for a in 0..3 {
        fc[[0, a, a]] = force_constants[a];
    }

    return InterpolationData::new(crystal, Supercell::diagonal(1, 1, 1).unwrap(), fc, None).unwrap();
}

/// CsCl structure in a 2x2x2 supercell, with springs between first and
/// second neighbors
fn get_cscl() -> InterpolationData {
    let crystal = Crystal::new(
        UnitCell::cubic(5.0).unwrap(),
        vec![Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(0.5, 0.5, 0.5)],
        vec!["Cs".into(), "Cl".into()],
        vec![242271.0, 64626.0],
    ).unwrap();
    let supercell = Supercell::diagonal(2, 2, 2).unwrap();
    let fc = spring_force_constants(&crystal, &supercell, 5.5, 0.05);
    return InterpolationData::new(crystal, supercell, fc, None).unwrap();
}

/// Two ions in an orthorhombic cell, in a 3x2x2 supercell
fn get_orthorhombic() -> InterpolationData {
    let crystal = Crystal::new(
        UnitCell::orthorhombic(4.0, 5.0, 6.0).unwrap(),
        vec![Vector3D::new(0.1, 0.0, 0.0), Vector3D::new(0.6, 0.5, 0.5)],
        vec!["A".into(), "B".into()],
        vec![20000.0, 30000.0],
    ).unwrap();
    let supercell = Supercell::diagonal(3, 2, 2).unwrap();
    let fc = spring_force_constants(&crystal, &supercell, 4.9, 0.08);
    return InterpolationData::new(crystal, supercell, fc, None).unwrap();
}

/// Add opposite isotropic Born charges `±charge` (alternating between ions)
/// and an isotropic dielectric tensor to `data`
pub fn with_dipole(data: InterpolationData, charge: f64, dielectric: f64) -> InterpolationData {
    let born = (0..data.crystal().size())
        .map(|i| (if i % 2 == 0 { charge } else { -charge }) * Matrix3::one())
        .collect();
    let dipole = DipoleData {
        born: born,
        dielectric: dielectric * Matrix3::one(),
    };

    return InterpolationData::new(
        data.crystal().clone(),
        data.supercell().clone(),
        data.force_constants().clone(),
        Some(dipole),
    ).unwrap();
}

/// Add `shift` to the diagonal of the self-interaction block of every ion,
/// breaking the acoustic sum rule
pub fn break_sum_rule(data: InterpolationData, shift: f64) -> InterpolationData {
    let mut fc = data.force_constants().clone();
    for r in 0..fc.shape()[1] {
        fc[[0, r, r]] += shift;
    }

    return InterpolationData::new(
        data.crystal().clone(),
        data.supercell().clone(),
        fc,
        data.dipole().cloned(),
    ).unwrap();
}

/// Force constants of a periodic network of central springs with stiffness
/// `k / r²` between all ions closer than `cutoff`. The resulting force
/// constants are symmetric and satisfy the acoustic sum rule exactly.
pub fn spring_force_constants(crystal: &Crystal, supercell: &Supercell, cutoff: f64, k: f64) -> Array3<f64> {
    let n_ions = crystal.size();
    let n_cells = supercell.n_cells();
    let cell = crystal.cell();
    let lattice = supercell.lattice(cell);

    let mut fc = Array3::zeros((n_cells, 3 * n_ions, 3 * n_ions));
    for i in 0..n_ions {
        let center = cell.cartesian(crystal.positions()[i]);
        let mut self_block = Matrix3::zero();

        for (c, &origin) in supercell.cell_origins().iter().enumerate() {
            for j in 0..n_ions {
                let position = cell.cartesian(Vector3D::from(origin) + crystal.positions()[j]);

                let mut block = Matrix3::zero();
                for image in integer_box([2, 2, 2]) {
                    let d = position + Vector3D::from(image) * lattice - center;
                    let distance = d.norm();
                    if distance < 1e-8 || distance > cutoff {
                        continue;
                    }
                    let direction = d / distance;
                    block -= k / (distance * distance) * Matrix3::outer(direction, direction);
                }

                if c == 0 && i == j {
                    // springs to own periodic images cancel out
                    continue;
                }

                self_block -= block;
                for a in 0..3 {
                    for b in 0..3 {
                        fc[[c, 3 * i + a, 3 * j + b]] = block[a][b];
                    }
                }
            }
        }

        for a in 0..3 {
            for b in 0..3 {
                fc[[0, 3 * i + a, 3 * i + b]] = self_block[a][b];
            }
        }
    }

    return fc;
}
