use std::f64::consts::PI;

use log::debug;
use ndarray::{Array2, Array4};
use num_complex::Complex64;
use num_traits::Zero;

use crate::{Error, Matrix3, Vector3D};
use crate::math::{erfc, integer_box, covering_limits};
use crate::systems::{Crystal, DipoleData, UnitCell};
use super::dynmat::PhaseTable;

/// Terms smaller than this (in reduced units) are excluded from the sums
const EPSILON: f64 = 1e-10;

type ComplexBlock = [[Complex64; 3]; 3];

/// Long range dipole-dipole contribution to the dynamical matrix, computed
/// with an Ewald summation in an anisotropic dielectric medium, following
/// eqs. 72-74 of X. Gonze and C. Lee, Phys. Rev. B 55, 10355 (1997).
///
/// All q-independent parts (real space kernels, reciprocal lattice phases and
/// the self-interaction term) are computed once in [`EwaldSum::new`].
#[derive(Debug, Clone)]
pub struct EwaldSum {
    n_ions: usize,
    volume: f64,
    cell: UnitCell,
    positions: Vec<Vector3D>,
    born: Vec<Matrix3>,
    dielectric: Matrix3,
    eta: f64,
    cutoff: f64,
    cell_phases: PhaseTable,
    /// scaled real space kernels for pairs `j >= i`, stored at `i * n_ions + j`
    /// together with the index of the corresponding cell
    real_kernels: Vec<Vec<(usize, Matrix3)>>,
    g_vectors: Vec<Vector3D>,
    /// `exp(2πi G·r_i)`, with shape `(n_g_vectors, n_ions)`
    g_phases: Array2<Complex64>,
    self_terms: Vec<ComplexBlock>,
}

impl EwaldSum {
    /// Prepare the Ewald summation for the ions in `crystal`, with the Born
    /// charges and dielectric tensor from `dipole`. Larger values of
    /// `precision` include more terms in both the real and reciprocal space
    /// sums.
    #[time_graph::instrument(name = "EwaldSum::new")]
    pub fn new(crystal: &Crystal, dipole: &DipoleData, precision: f64) -> Result<EwaldSum, Error> {
        if !(precision.is_finite() && precision > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "the Ewald precision must be a positive number, got {}", precision
            )));
        }

        let n_ions = crystal.size();
        let cell = crystal.cell();
        let lattice = cell.matrix();
        let reciprocal = cell.reciprocal();
        let dielectric = dipole.dielectric;
        let inverse_dielectric = dielectric.inverse();
        let det_dielectric = dielectric.determinant();

        let lengths = cell.lengths();
        let mean_length = f64::cbrt(lengths[0] * lengths[1] * lengths[2]);
        let skew = lengths.iter().fold(0.0_f64, |max, &l| max.max(l)) / mean_length;
        let lambda = PI.sqrt() / mean_length * f64::powf(n_ions as f64, 1.0 / 6.0);
        let cutoff = precision.sqrt() * skew;

        let cells = integer_box(covering_limits(&lattice, cutoff / lambda));
        let g_points = integer_box(covering_limits(&reciprocal, 2.0 * lambda * cutoff));

        let eta = lambda * f64::powf(det_dielectric, 1.0 / 6.0);

        debug!(
            "Ewald summation with eta = {}, cutoff = {}, {} real space cells and {} reciprocal vectors",
            eta, cutoff, cells.len(), g_points.len()
        );

        let cartesian = crystal.cartesian_positions();
        let real_scale = eta.powi(3) / det_dielectric.sqrt();

        let mut real_kernels = vec![Vec::new(); n_ions * n_ions];
        let mut real_q0 = vec![Matrix3::zero(); n_ions * n_ions];
        for i in 0..n_ions {
            for j in 0..n_ions {
                let r_ij = cartesian[i] - cartesian[j];
                for (k, &cell_index) in cells.iter().enumerate() {
                    let diff = r_ij - cell.cartesian(Vector3D::from(cell_index));
                    if let Some(kernel) = real_space_kernel(diff, &inverse_dielectric, eta, cutoff) {
                        let kernel = real_scale * kernel;
                        real_q0[i * n_ions + j] += kernel;
                        if j >= i {
                            real_kernels[i * n_ions + j].push((k, kernel));
                        }
                    }
                }
            }
        }

        let g_vectors = g_points.iter()
            .map(|&g| Vector3D::from(g) * reciprocal)
            .collect::<Vec<_>>();

        let positions = crystal.positions().to_vec();
        let g_phases = Array2::from_shape_fn((g_points.len(), n_ions), |(g, i)| {
            Complex64::from_polar(1.0, 2.0 * PI * (Vector3D::from(g_points[g]) * positions[i]))
        });

        let mut ewald = EwaldSum {
            n_ions: n_ions,
            volume: cell.volume(),
            cell: *cell,
            positions: positions,
            born: dipole.born.clone(),
            dielectric: dielectric,
            eta: eta,
            cutoff: cutoff,
            cell_phases: PhaseTable::new(&cells),
            real_kernels: real_kernels,
            g_vectors: g_vectors,
            g_phases: g_phases,
            self_terms: Vec::new(),
        };

        // q = 0 interaction of each ion with all the others, removed from the
        // diagonal blocks at every q
        let recip_q0 = ewald.reciprocal_sum(Vector3D::zero(), false);
        for i in 0..n_ions {
            let mut self_term = [[Complex64::zero(); 3]; 3];
            for j in 0..n_ions {
                let mut total = [[Complex64::zero(); 3]; 3];
                for a in 0..3 {
                    for b in 0..3 {
                        total[a][b] = recip_q0[[i, j, a, b]] - real_q0[i * n_ions + j][a][b];
                    }
                }

                let contracted = contract(&ewald.born[i], &total, &ewald.born[j]);
                for a in 0..3 {
                    for b in 0..3 {
                        self_term[a][b] += contracted[a][b];
                    }
                }
            }

            let mut symmetric = self_term;
            for a in 0..3 {
                for b in 0..3 {
                    symmetric[a][b] = 0.5 * (self_term[a][b] + self_term[b][a]);
                }
            }
            ewald.self_terms.push(symmetric);
        }

        return Ok(ewald);
    }

    /// Get the screening parameter of the Ewald summation
    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// Compute the dipole-dipole correction to the (non mass-weighted)
    /// dynamical matrix at the fractional `qpoint`
    #[time_graph::instrument(name = "EwaldSum::correction")]
    pub fn correction(&self, qpoint: Vector3D) -> Array2<Complex64> {
        let n_ions = self.n_ions;
        let qpoint = qpoint - qpoint.round();

        let cell_phases = self.cell_phases.phases(qpoint);
        let recip = self.reciprocal_sum(qpoint, true);

        let mut correction = Array2::zeros((3 * n_ions, 3 * n_ions));
        for i in 0..n_ions {
            for j in i..n_ions {
                let mut total = [[Complex64::zero(); 3]; 3];
                for a in 0..3 {
                    for b in 0..3 {
                        total[a][b] = recip[[i, j, a, b]];
                    }
                }

                for &(k, kernel) in &self.real_kernels[i * n_ions + j] {
                    for a in 0..3 {
                        for b in 0..3 {
                            total[a][b] -= kernel[a][b] * cell_phases[k];
                        }
                    }
                }

                let block = contract(&self.born[i], &total, &self.born[j]);
                for a in 0..3 {
                    for b in 0..3 {
                        correction[[3 * i + a, 3 * j + b]] = block[a][b];
                    }
                }

                if i != j {
                    for row in &mut total {
                        for value in row.iter_mut() {
                            *value = value.conj();
                        }
                    }

                    let block = contract(&self.born[j], &total, &self.born[i]);
                    for a in 0..3 {
                        for b in 0..3 {
                            correction[[3 * j + a, 3 * i + b]] = block[a][b];
                        }
                    }
                }
            }

            for a in 0..3 {
                for b in 0..3 {
                    correction[[3 * i + a, 3 * i + b]] -= self.self_terms[i][a][b];
                }
            }
        }

        return correction;
    }

    /// Compute the non-analytic correction to the dynamical matrix at q = 0,
    /// when approaching the zone center along `direction` (in fractional
    /// reciprocal coordinates). See eq. 60 of X. Gonze and C. Lee, Phys. Rev.
    /// B 55, 10355 (1997).
    ///
    /// This returns `None` if `direction` is zero.
    pub fn non_analytic(&self, direction: Vector3D) -> Option<Array2<Complex64>> {
        let direction = self.cell.reciprocal_cartesian(direction);
        if direction.norm() < EPSILON {
            return None;
        }

        let denominator = direction * (self.dielectric * direction);
        let factor = 4.0 * PI / (self.volume * denominator);

        let charges = self.born.iter().map(|z| z * direction).collect::<Vec<_>>();

        let n_rows = 3 * self.n_ions;
        let correction = Array2::from_shape_fn((n_rows, n_rows), |(r, s)| {
            Complex64::new(factor * charges[r / 3][r % 3] * charges[s / 3][s % 3], 0.0)
        });

        return Some(correction);
    }

    /// Reciprocal space part of the Ewald sum at the reduced `qpoint`, for
    /// all pairs of ions or only for pairs with `j >= i`. The result has
    /// shape `(n_ions, n_ions, 3, 3)`.
    fn reciprocal_sum(&self, qpoint: Vector3D, upper_only: bool) -> Array4<Complex64> {
        let n_ions = self.n_ions;
        let eta2 = self.eta * self.eta;

        let q_cartesian = self.cell.reciprocal_cartesian(qpoint);
        let q_phases = self.positions.iter()
            .map(|&r| Complex64::from_polar(1.0, 2.0 * PI * (qpoint * r)))
            .collect::<Vec<_>>();

        let mut sums = Array4::zeros((n_ions, n_ions, 3, 3));
        for (g, &g_vector) in self.g_vectors.iter().enumerate() {
            let k = g_vector + q_cartesian;
            let k2 = k * (self.dielectric * k) / (4.0 * eta2);
            let k_length = k2.sqrt();
            if !(k_length > EPSILON && k_length < self.cutoff) {
                continue;
            }

            let kk = (f64::exp(-k2) / k2) * Matrix3::outer(k, k);
            for i in 0..n_ions {
                let start = if upper_only { i } else { 0 };
                for j in start..n_ions {
                    let phase = (self.g_phases[[g, i]] * q_phases[i]) / (self.g_phases[[g, j]] * q_phases[j]);
                    for a in 0..3 {
                        for b in 0..3 {
                            sums[[i, j, a, b]] += kk[a][b] * phase;
                        }
                    }
                }
            }
        }

        let scale = PI / (self.volume * eta2);
        sums.mapv_inplace(|v| v * scale);
        return sums;
    }
}

/// Screened dipole-dipole interaction tensor for a single separation `diff`,
/// or `None` if the reduced distance is outside of `(EPSILON, cutoff)`
fn real_space_kernel(diff: Vector3D, inverse_dielectric: &Matrix3, eta: f64, cutoff: f64) -> Option<Matrix3> {
    let eta2 = eta * eta;
    let delta = diff * inverse_dielectric;
    let x2 = eta2 * (delta * diff);
    let x = x2.sqrt();
    if !(x > EPSILON && x < cutoff) {
        return None;
    }

    let exp_term = 2.0 * f64::exp(-x2) / (PI.sqrt() * x2);
    let erfc_term = erfc(x) / (x * x2);
    let f1 = eta2 * (3.0 * erfc_term / x2 + exp_term * (3.0 / x2 + 2.0));
    let f2 = erfc_term + exp_term;

    return Some(f1 * Matrix3::outer(delta, delta) - f2 * inverse_dielectric);
}

/// Compute `left · block · rightᵀ`
fn contract(left: &Matrix3, block: &ComplexBlock, right: &Matrix3) -> ComplexBlock {
    let mut result = [[Complex64::zero(); 3]; 3];
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    result[a][b] += left[a][c] * block[c][d] * right[b][d];
                }
            }
        }
    }
    return result;
}
