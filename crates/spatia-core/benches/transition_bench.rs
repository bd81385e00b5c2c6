//! Benchmarks for the transition engine and memoized frusta.
//!
//! Run with: cargo bench -p spatia-core

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spatia_core::{
    Box3, LayoutFrustum, Point, Quat, TransitionConfig, TransitionOptions, Transitionable, Vec3,
};
use std::hint::black_box;

fn bench_transition_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition/queue_depth");
    let base = TransitionConfig::immediate();

    for depth in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("box3", depth), &depth, |b, &depth| {
            let mut t = Transitionable::new(Box3::unit())
                .with_options(TransitionOptions::default().with_duration(1e9));
            for i in 0..depth {
                let offset = Vec3::new(i as f64, 0.0, 0.0);
                t.set_target(Box3::from_center_size(Point::from(offset), Vec3::repeat(1.0)));
                t.update(0.0, &base);
            }
            b.iter(|| {
                t.update(black_box(1e-3), &base);
                black_box(t.current());
            })
        });
    }

    group.finish();
}

fn bench_quaternion_hysteresis(c: &mut Criterion) {
    let cfg = TransitionConfig::default();
    c.bench_function("transition/quat_hysteresis", |b| {
        let mut t = Transitionable::new(Quat::identity());
        let mut angle = 0.0_f64;
        b.iter(|| {
            angle += 0.01;
            t.set_target(Quat::from_euler_angles(0.0, angle.sin(), 0.0));
            black_box(t.update(1.0 / 90.0, &cfg));
        })
    });
}

fn bench_frustum_metrics(c: &mut Criterion) {
    let view = LayoutFrustum::from_fov(100.0, 80.0, 0.1, 100.0);
    let node = LayoutFrustum::new(-10.0, 30.0, -5.0, 25.0, 1.0, 2.0);
    c.bench_function("frustum/overlap_and_angles", |b| {
        b.iter(|| {
            black_box(node.overlap_percent(black_box(&view)));
            black_box(view.angle_to_farthest_point(&node.center_degrees()));
        })
    });
}

criterion_group!(
    benches,
    bench_transition_queue,
    bench_quaternion_hysteresis,
    bench_frustum_metrics
);
criterion_main!(benches);
