use phonon_interp::{InterpolationContext, InterpolationData, InterpolationOptions, Vector3D};

use criterion::{BenchmarkGroup, Criterion, black_box, criterion_group, criterion_main};
use criterion::measurement::WallTime;

#[path = "../tests/data/mod.rs"]
mod data;

/// A path through the Brillouin zone, going through the zone center
fn qpoints_path(n_qpoints: usize) -> Vec<Vector3D> {
    let start = Vector3D::new(-0.5, -0.5, 0.0);
    let end = Vector3D::new(0.5, 0.5, 0.0);
    return (0..n_qpoints)
        .map(|i| start + (end - start) * (i as f64 / (n_qpoints - 1) as f64))
        .collect();
}

fn run_interpolation(mut group: BenchmarkGroup<WallTime>, data: &InterpolationData) {
    let qpoints = qpoints_path(101);

    let options = [
        ("no dipole", InterpolationOptions {
            dipole_correction: false,
            ..Default::default()
        }),
        ("dipole", InterpolationOptions::default()),
        ("dipole + preconditioning", InterpolationOptions {
            precondition: true,
            ..Default::default()
        }),
    ];

    for (name, options) in options {
        let context = InterpolationContext::new(data, options).expect("failed to setup the interpolation");

        group.bench_function(name, |b| b.iter_custom(|repeat| {
            let start = std::time::Instant::now();
            for _ in 0..repeat {
                let result = context.interpolate(black_box(&qpoints)).expect("failed to interpolate");
                black_box(result);
            }
            start.elapsed() / qpoints.len() as u32
        }));
    }

    group.finish();
}

fn interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("CsCl (per q-point)");
    group.noise_threshold(0.05);
    run_interpolation(group, &data::cscl().load());

    let mut group = c.benchmark_group("orthorhombic (per q-point)");
    group.noise_threshold(0.05);
    run_interpolation(group, &data::orthorhombic().load());

    let mut group = c.benchmark_group("setup");
    group.noise_threshold(0.05);
    let data = data::orthorhombic().load();
    group.bench_function("ewald sum", |b| b.iter(|| {
        InterpolationContext::new(black_box(&data), InterpolationOptions::default())
    }));
    group.finish();
}

criterion_group!(all, interpolation);
criterion_main!(all);
