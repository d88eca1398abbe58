//! Benchmarks for deprojection and orientation estimation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gaze_estimation::{
    deprojection::{Intrinsics, PointSet},
    frame::WindowKind,
    orientation::OrientationEstimator,
};
use nalgebra::Point3;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Noisy tilted plane with `count` points
fn noisy_plane(count: usize, rng: &mut StdRng) -> PointSet {
    let points = (0..count)
        .map(|_| {
            let x: f64 = rng.gen_range(-0.1..0.1);
            let y: f64 = rng.gen_range(-0.1..0.1);
            let z = 1.0 + 0.5 * x + rng.gen_range(-0.002..0.002);
            Point3::new(x, y, z)
        })
        .collect();
    PointSet::new(points)
}

fn benchmark_orientation(c: &mut Criterion) {
    let mut group = c.benchmark_group("orientation");
    let estimator = OrientationEstimator::default();
    let mut rng = StdRng::seed_from_u64(7);

    for count in [100, 1_000, 10_000, 50_000] {
        let set = noisy_plane(count, &mut rng);
        group.bench_with_input(BenchmarkId::new("estimate", count), &set, |b, set| {
            b.iter(|| black_box(estimator.estimate(black_box(set), WindowKind::Full)));
        });
    }

    group.finish();
}

fn benchmark_deprojection(c: &mut Criterion) {
    let mut group = c.benchmark_group("deprojection");
    let intrinsics = Intrinsics::new(575.815_734_863_281_2, 314.5, 235.5);
    let mut rng = StdRng::seed_from_u64(11);

    // One full window of a typical face box
    let n = 100 * 160;
    let rows: Vec<f64> = (0..n).map(|i| (i / 100) as f64).collect();
    let cols: Vec<f64> = (0..n).map(|i| (i % 100) as f64).collect();
    let depths: Vec<f64> = (0..n)
        .map(|_| if rng.gen_bool(0.1) { 0.0 } else { rng.gen_range(500.0..2000.0) })
        .collect();

    group.bench_function("deproject_window_16000", |b| {
        b.iter(|| black_box(intrinsics.deproject(&rows, &cols, &depths)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_orientation, benchmark_deprojection);
criterion_main!(benches);
