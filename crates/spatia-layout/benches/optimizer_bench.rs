//! Benchmarks for ranking, the optimizer and full frames.
//!
//! Run with: cargo bench -p spatia-layout

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use spatia_core::{Box3, Point, Vec3};
use spatia_layout::objectives::{
    AspectObjective, MagnetizeObjective, OcclusionObjective, VisualMaximizeObjective,
};
use spatia_layout::optimizer::{ToleranceBand, compare_scores};
use spatia_layout::{SceneGraph, SceneNode, SpatialSystem};
use std::hint::black_box;

/// Scene with `n` adaptive panels spread in front of the viewer.
fn make_system(n: usize) -> (SpatialSystem<SceneGraph>, Vec<SceneNode>) {
    let mut scene = SceneGraph::new();
    let root = scene.add_node();
    let panels: Vec<SceneNode> = (0..n)
        .map(|i| {
            let node = scene.add_child(root);
            let x = i as f64 - n as f64 * 0.5;
            scene.set_position(node, Vec3::new(x, 0.0, -4.0));
            scene.set_intrinsic_bounds(
                node,
                Box3::from_center_size(Point::origin(), Vec3::new(0.8, 0.5, 0.05)),
            );
            node
        })
        .collect();

    let mut system = SpatialSystem::new(scene);
    for &panel in &panels {
        let layout = system.adapter(panel).unwrap().create_layout();
        layout.add_objective(AspectObjective::default());
        layout.add_objective(OcclusionObjective);
        layout.add_objective(MagnetizeObjective::new(5.0));
        layout.add_objective(VisualMaximizeObjective);
    }
    (system, panels)
}

fn bench_compare_scores(c: &mut Criterion) {
    let bands = vec![
        ToleranceBand {
            best: Some(0.0),
            tolerance: 0.01,
        };
        4
    ];
    let a = [0.0, -0.5, 0.3, 0.8];
    let b = [0.0, -0.4, 0.2, 0.9];
    c.bench_function("rank/compare_scores", |bench| {
        bench.iter(|| black_box(compare_scores(black_box(&a), black_box(&b), &bands)))
    });
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("system/frame");
    for n in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("adaptive_nodes", n), &n, |b, &n| {
            let (mut system, _) = make_system(n);
            let mut elapsed = 0.0;
            b.iter(|| {
                elapsed += 1.0 / 90.0;
                system.update(1.0 / 90.0, elapsed).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_first_frame(c: &mut Criterion) {
    c.bench_function("system/first_frame_4", |b| {
        b.iter_batched(
            || make_system(4).0,
            |mut system| {
                system.update(1.0 / 90.0, 1.0 / 90.0).unwrap();
                black_box(system.frame())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_metrics_reads(c: &mut Criterion) {
    let (mut system, panels) = make_system(4);
    system.update(1.0 / 90.0, 1.0 / 90.0).unwrap();
    c.bench_function("metrics/cached_visual_bounds", |b| {
        b.iter(|| {
            for &panel in &panels {
                black_box(*system.metrics(panel).unwrap().current().visual_bounds());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_compare_scores,
    bench_frame,
    bench_first_frame,
    bench_metrics_reads
);
criterion_main!(benches);
