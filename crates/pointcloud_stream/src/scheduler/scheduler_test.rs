use std::sync::Arc;

use glam::{DVec3, Vec3};

use super::*;
use crate::error::StoreError;
use crate::frustum::FrustumCuller;
use crate::octree::{BoundingBox, ExistenceMask, OctreeBounds};
use crate::pipeline::{LoaderPorts, PipelineContext, RendererPorts};
use crate::point::{NodePoints, PointRecord};
use crate::test_utils::{camera_facing_away, camera_facing_cloud};

const EXTENT: f64 = 8.0;

/// Full two-level octree over `[0, 8]^3`: root, 8 children, 64 grandchildren.
fn full_mirror() -> HierarchyMirror {
  let bounds = OctreeBounds::new(BoundingBox::new(DVec3::ZERO, DVec3::splat(EXTENT)));
  HierarchyMirror::build_with(bounds, |address| {
    let bits = if address.depth() < 2 { 0xff } else { 0 };
    Ok(Some(ExistenceMask::from_bits(bits)))
  })
  .unwrap()
}

struct Harness {
  scheduler: Scheduler,
  loader: LoaderPorts,
  renderer: RendererPorts,
}

fn harness(config: StreamingConfig) -> Harness {
  harness_with_labels(config, ClassLabels::default())
}

fn harness_with_labels(config: StreamingConfig, labels: ClassLabels) -> Harness {
  let PipelineContext {
    scheduler,
    loader,
    renderer,
  } = PipelineContext::new();
  Harness {
    scheduler: Scheduler::new(full_mirror(), config, scheduler, labels),
    loader,
    renderer,
  }
}

fn payload() -> NodePoints {
  Arc::from(vec![PointRecord::XyzClass {
    position: Vec3::ONE,
    class: 2,
  }])
}

impl Harness {
  /// Answer every pending load request successfully.
  fn serve_all(&self) -> usize {
    let mut served = 0;
    for request in self.loader.load_requests.try_iter() {
      self
        .loader
        .load_results
        .send(LoadResult {
          address: request.address,
          outcome: LoadOutcome::Loaded(payload()),
        })
        .unwrap();
      served += 1;
    }
    served
  }

  /// Tick and serve until nothing is issued or in flight.
  fn settle(&mut self, camera: &DMat4) {
    for _ in 0..500 {
      let report = self.scheduler.tick(camera).unwrap();
      self.serve_all();
      if report.issued.is_empty() && self.scheduler.in_flight() == 0 {
        return;
      }
    }
    panic!("scheduler did not settle");
  }

  fn assert_consistent(&self) {
    assert_eq!(self.scheduler.active_count(), self.scheduler.mirror().active_count());
  }
}

fn near() -> DMat4 {
  camera_facing_cloud(EXTENT, 6.0)
}

fn far() -> DMat4 {
  camera_facing_cloud(EXTENT, 40.0)
}

fn away() -> DMat4 {
  camera_facing_away(EXTENT)
}

// =============================================================================
// Budget
// =============================================================================

#[test]
fn test_active_count_never_exceeds_budget() {
  let config = StreamingConfig {
    node_budget: 5,
    max_in_flight: 0,
    ..Default::default()
  };
  let mut h = harness(config);
  h.scheduler.request_root().unwrap();

  let cameras = [near(), near(), away(), near(), far(), near()];
  for i in 0..60 {
    let report = h.scheduler.tick(&cameras[i / 10]).unwrap();
    assert!(report.active <= 5, "tick {i}: {} active", report.active);
    h.assert_consistent();
    h.serve_all();
  }
  assert!(h.scheduler.metrics().peak_active <= 5);
}

#[test]
fn test_in_flight_cap_limits_requests() {
  let config = StreamingConfig {
    max_in_flight: 2,
    ..Default::default()
  };
  let mut h = harness(config);

  let first = h.scheduler.tick(&near()).unwrap();
  assert_eq!(first.issued.len(), 2);
  let second = h.scheduler.tick(&near()).unwrap();
  assert!(second.issued.is_empty());

  h.serve_all();
  h.scheduler.tick(&near()).unwrap();
  assert!(h.scheduler.in_flight() <= 2);
}

#[test]
fn test_requests_follow_priority() {
  let config = StreamingConfig {
    max_in_flight: 0,
    ..Default::default()
  };
  let mut h = harness(config);
  let camera = near();
  let report = h.scheduler.tick(&camera).unwrap();
  assert!(report.issued.len() > 1);

  let culler = FrustumCuller::from_matrix(&camera);
  let priorities: Vec<f64> = report
    .issued
    .iter()
    .map(|a| {
      let bounds = h.scheduler.mirror().lookup(a).unwrap().bounds;
      priority(&bounds, culler.classify_box(&bounds), &culler)
    })
    .collect();
  assert!(priorities.windows(2).all(|w| w[0] >= w[1]), "{priorities:?}");
}

// =============================================================================
// Delivery and Cancellation
// =============================================================================

#[test]
fn test_root_is_delivered() {
  let mut h = harness(StreamingConfig::default());
  h.scheduler.request_root().unwrap();
  h.serve_all();

  let report = h.scheduler.tick(&away()).unwrap();

  assert_eq!(report.delivered, Some(SpatialAddress::root()));
  let add = h.renderer.render_add.try_recv().unwrap();
  assert!(add.address.is_root());
  assert_eq!(report.active, 1);
}

#[test]
fn test_deactivated_in_flight_load_is_discarded() {
  let mut h = harness(StreamingConfig::default());

  let issued = h.scheduler.tick(&near()).unwrap().issued;
  assert!(!issued.is_empty());

  // Camera turns away before any payload arrives.
  let report = h.scheduler.tick(&away()).unwrap();
  assert_eq!(report.removed.len(), issued.len());
  assert_eq!(report.active, 1);

  h.serve_all();
  for _ in 0..issued.len() {
    let report = h.scheduler.tick(&away()).unwrap();
    assert!(report.delivered.is_none());
  }

  assert!(h.renderer.render_add.try_recv().is_err());
  assert!(h.renderer.render_remove.try_recv().is_err(), "nothing was on screen");
  assert_eq!(h.scheduler.metrics().loads_cancelled, issued.len() as u64);
  assert_eq!(h.scheduler.in_flight(), 0);
}

#[test]
fn test_leaving_frustum_removes_rendered_nodes() {
  let mut h = harness(StreamingConfig::default());
  h.settle(&near());

  let adds: Vec<RenderAdd> = h.renderer.render_add.try_iter().collect();
  assert!(!adds.is_empty());
  assert!(adds.windows(2).all(|w| w[0].seq < w[1].seq));
  h.assert_consistent();

  h.scheduler.tick(&away()).unwrap();

  let removes: Vec<RenderRemove> = h.renderer.render_remove.try_iter().collect();
  assert_eq!(removes.len(), adds.len());
  assert!(removes[0].seq > adds[adds.len() - 1].seq);
  assert_eq!(h.scheduler.mirror().active_count(), 1);
  assert_eq!(h.scheduler.mirror().loaded_count(), 0);
}

#[test]
fn test_fully_visible_children_collapse_into_parent() {
  let mut h = harness(StreamingConfig::default());
  h.settle(&near());
  let delivered = h.renderer.render_add.try_iter().count();
  assert!(h.scheduler.active_count() > 1);

  let report = h.scheduler.tick(&far()).unwrap();

  assert_eq!(report.candidates, 0, "parent stands in for fully visible children");
  assert_eq!(h.renderer.render_remove.try_iter().count(), delivered);
  assert_eq!(report.active, 1);
  h.assert_consistent();
}

// =============================================================================
// Failures and Picks
// =============================================================================

#[test]
fn test_failed_child_load_frees_slot() {
  let config = StreamingConfig {
    max_in_flight: 1,
    ..Default::default()
  };
  let mut h = harness(config);
  let issued = h.scheduler.tick(&near()).unwrap().issued;
  assert_eq!(issued.len(), 1);
  let victim = issued[0].clone();
  assert_eq!(h.scheduler.active_count(), 2);

  let _ = h.loader.load_requests.try_iter().count();
  h.loader
    .load_results
    .send(LoadResult {
      address: victim.clone(),
      outcome: LoadOutcome::Failed(StoreError::NodeNotFound(victim.clone())),
    })
    .unwrap();

  // The slot is still taken while issuing, so nothing new goes out.
  let report = h.scheduler.tick(&near()).unwrap();
  assert!(report.issued.is_empty());
  assert_eq!(report.failed, Some(victim.clone()));
  assert!(!h.scheduler.mirror().lookup(&victim).unwrap().active);
  assert_eq!(h.scheduler.active_count(), 1);
  assert_eq!(h.scheduler.metrics().loads_failed, 1);
  h.assert_consistent();
}

#[test]
fn test_failed_root_load_is_fatal() {
  let mut h = harness(StreamingConfig::default());
  h.scheduler.request_root().unwrap();
  h.loader
    .load_results
    .send(LoadResult {
      address: SpatialAddress::root(),
      outcome: LoadOutcome::Failed(StoreError::NodeNotFound(SpatialAddress::root())),
    })
    .unwrap();

  let err = h.scheduler.tick(&away()).unwrap_err();
  assert!(matches!(err, StreamError::Store(StoreError::NodeNotFound(_))), "{err}");
}

#[test]
fn test_pick_resolves_label() {
  let labels: ClassLabels = [(2, "house".to_string())].into_iter().collect();
  let mut h = harness_with_labels(StreamingConfig::default(), labels);
  for class in [Some(2), Some(5), None] {
    h.renderer
      .picks
      .send(PickResult {
        address: SpatialAddress::root(),
        index: 0,
        class,
      })
      .unwrap();
  }

  let report = h.scheduler.tick(&away()).unwrap();

  let labels: Vec<Option<&str>> = report.picks.iter().map(|p| p.label.as_deref()).collect();
  assert_eq!(labels, [Some("house"), None, None]);
}

#[test]
fn test_closed_loader_is_reported() {
  let Harness {
    mut scheduler, loader, ..
  } = harness(StreamingConfig::default());
  drop(loader);
  let err = scheduler.tick(&near()).unwrap_err();
  assert!(matches!(err, StreamError::ChannelClosed(_)), "{err}");
}
