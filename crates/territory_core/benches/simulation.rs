//! Simulation benchmarks for territory_core.
//!
//! Run with: `cargo bench -p territory_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use territory_core::capture::capture;
use territory_core::geometry::{point_in_polygon, regular_polygon};
use territory_core::math::Vec2;
use territory_test_utils::fixtures::{grid_arena, step_loops};

/// Full ticks for growing arenas of looping players.
pub fn simulation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for players in [4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &n| {
            let mut sim = grid_arena(n, 220.0);
            // Warm up so trails and captures exist
            for _ in 0..120 {
                step_loops(&mut sim, 45);
            }
            b.iter(|| black_box(step_loops(&mut sim, 45)));
        });
    }
    group.finish();
}

/// Geometry hot paths.
pub fn geometry_benchmark(c: &mut Criterion) {
    let ring = regular_polygon(Vec2::new(500.0, 500.0), 200.0, 256);
    c.bench_function("point_in_polygon_256", |b| {
        b.iter(|| point_in_polygon(black_box(Vec2::new(510.0, 480.0)), &ring));
    });

    let territory = regular_polygon(Vec2::new(500.0, 500.0), 60.0, 12);
    let mut trail = vec![Vec2::new(540.0, 500.0)];
    for k in 0..=40 {
        let angle = -1.0 + 2.0 * f64::from(k) / 40.0;
        trail.push(Vec2::new(500.0, 500.0) + Vec2::from_angle(angle) * 150.0);
    }
    trail.push(Vec2::new(500.0, 500.0) + Vec2::from_angle(1.0) * 40.0);
    c.bench_function("capture_arc", |b| {
        b.iter(|| capture(black_box(&territory), black_box(&trail), 1.0));
    });
}

criterion_group!(benches, simulation_benchmark, geometry_benchmark);
criterion_main!(benches);
