//! Culling and scheduling benchmarks.
//!
//! - **classify_box**: 9-sample box test against a perspective frustum
//! - **tick**: one scheduler step over a fully populated 4-level mirror

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{DMat4, DVec3};
use pointcloud_stream::pipeline::{LoadOutcome, LoadResult, PipelineContext};
use pointcloud_stream::{
  BoundingBox, ClassLabels, ExistenceMask, FrustumCuller, HierarchyMirror, OctreeBounds, PointRecord,
  Scheduler, StreamingConfig,
};

const EXTENT: f64 = 64.0;

fn camera(distance: f64) -> DMat4 {
  let c = EXTENT * 0.5;
  let projection = DMat4::perspective_rh_gl(60f64.to_radians(), 16.0 / 9.0, 0.1, distance + EXTENT * 4.0);
  let view = DMat4::look_at_rh(DVec3::new(c, c, c + distance), DVec3::splat(c), DVec3::Y);
  projection * view
}

fn full_mirror(depth: usize) -> HierarchyMirror {
  let bounds = OctreeBounds::new(BoundingBox::new(DVec3::ZERO, DVec3::splat(EXTENT)));
  let mirror = HierarchyMirror::build_with(bounds, |address| {
    let bits = if address.depth() < depth { 0xff } else { 0 };
    Ok(Some(ExistenceMask::from_bits(bits)))
  });
  mirror.expect("in-memory mirror")
}

fn bench_classify_box(c: &mut Criterion) {
  let mut group = c.benchmark_group("frustum");
  let culler = FrustumCuller::from_matrix(&camera(40.0));
  let boxes: Vec<BoundingBox> = (0..512)
    .map(|i| {
      let min = DVec3::new((i % 8) as f64, ((i / 8) % 8) as f64, (i / 64) as f64) * 8.0;
      BoundingBox::new(min, min + DVec3::splat(8.0))
    })
    .collect();

  group.bench_function("classify_box_x512", |b| {
    b.iter(|| {
      boxes
        .iter()
        .map(|bb| culler.classify_box(black_box(bb)).weight())
        .sum::<f64>()
    })
  });
  group.bench_function("from_matrix", |b| b.iter(|| FrustumCuller::from_matrix(black_box(&camera(40.0)))));
  group.finish();
}

fn bench_tick(c: &mut Criterion) {
  let mut group = c.benchmark_group("scheduler");

  for budget in [80usize, 400] {
    let PipelineContext {
      scheduler: ports,
      loader,
      renderer,
    } = PipelineContext::new();
    let config = StreamingConfig {
      node_budget: budget,
      max_in_flight: 0,
      ..Default::default()
    };
    let mut scheduler = Scheduler::new(full_mirror(3), config, ports, ClassLabels::default());
    let near = camera(20.0);

    group.bench_with_input(BenchmarkId::new("tick", budget), &near, |b, matrix| {
      b.iter(|| {
        let report = scheduler.tick(black_box(matrix)).expect("tick");
        for request in loader.load_requests.try_iter() {
          let _ = loader.load_results.send(LoadResult {
            address: request.address,
            outcome: LoadOutcome::Loaded(Vec::<PointRecord>::new().into()),
          });
        }
        // Keep the render queues from growing without bound.
        renderer.render_add.try_iter().for_each(drop);
        renderer.render_remove.try_iter().for_each(drop);
        report.active
      })
    });
  }

  group.finish();
}

criterion_group!(benches, bench_classify_box, bench_tick);
criterion_main!(benches);
