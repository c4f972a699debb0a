use std::collections::HashSet;
use std::time::{Duration, Instant};

use glam::DMat4;

use super::*;
use crate::build::{BuildConfig, OctreeBuilder};
use crate::octree::SpatialAddress;
use crate::pipeline::PointRenderer;
use crate::point::NodePoints;
use crate::test_utils::{camera_facing_cloud, lattice_positions, write_xyzrgbc, ScratchDir};

const EXTENT: f64 = 50.0;

/// Headless renderer keeping only the set of shown nodes.
#[derive(Default)]
struct Scene {
  shown: HashSet<SpatialAddress>,
  points: usize,
}

impl PointRenderer for Scene {
  fn add_geometry(&mut self, address: &SpatialAddress, points: &NodePoints) {
    assert!(self.shown.insert(address.clone()), "{address} added twice");
    self.points += points.len();
  }

  fn remove_geometry(&mut self, address: &SpatialAddress) {
    assert!(self.shown.remove(address), "{address} removed while not shown");
  }
}

fn build_cloud(dir: &ScratchDir) -> std::path::PathBuf {
  let input = dir.join("cloud.xyzrgbc");
  write_xyzrgbc(&input, &lattice_positions(3_000, EXTENT), 4);
  let out = dir.join("cloudOctree");
  let config = BuildConfig {
    node_capacity: 200,
    root_capacity: 400,
    seed: Some(3),
    ..BuildConfig::default()
  };
  OctreeBuilder::new(config).build(&input, "xyzrgbc", &out).unwrap();
  out
}

/// Run frames until `done` holds or five seconds pass.
fn drive(
  endpoint: &mut RendererEndpoint,
  scene: &mut Scene,
  camera: DMat4,
  mut done: impl FnMut(&RendererEndpoint) -> bool,
) -> bool {
  let deadline = Instant::now() + Duration::from_secs(5);
  while Instant::now() < deadline {
    endpoint.end_frame(camera, false, scene);
    if done(endpoint) {
      return true;
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  false
}

#[test]
fn test_session_streams_and_shuts_down() {
  let dir = ScratchDir::new("session_stream");
  let octree = build_cloud(&dir);
  let config = StreamingConfig {
    node_budget: 12,
    tick_interval_ms: 1,
    render_ops_per_frame: 4,
    ..Default::default()
  };

  let (session, mut endpoint) = StreamingSession::open(&octree, config).unwrap();
  assert_eq!(session.metadata().total_point_count, 3_000);
  let mut scene = Scene::default();

  let camera = camera_facing_cloud(EXTENT, 30.0);
  let root = SpatialAddress::root();
  assert!(drive(&mut endpoint, &mut scene, camera, |e| e.on_scene().any(|a| *a == root)));
  assert!(drive(&mut endpoint, &mut scene, camera, |e| e.on_scene_len() > 1));
  assert!(endpoint.on_scene_len() <= 12);
  assert_eq!(scene.shown.len(), endpoint.on_scene_len());

  assert!(endpoint.pick_point(&root, 0).is_some_and(|class| class < 4));

  let metrics = session.shutdown().unwrap();
  assert!(metrics.ticks > 0);
  assert!(metrics.loads_delivered >= 2);
  assert!(metrics.peak_active <= 12);
  assert!(metrics.cache_misses > 0);
}

#[test]
fn test_session_times_out_without_camera() {
  let dir = ScratchDir::new("session_timeout");
  let octree = build_cloud(&dir);
  let config = StreamingConfig {
    init_timeout_ms: 20,
    ..Default::default()
  };

  let (session, _endpoint) = StreamingSession::open(&octree, config).unwrap();
  let err = session.shutdown().unwrap_err();
  assert!(matches!(err, StreamError::InitializationTimeout(_)), "{err}");
}

#[test]
fn test_open_missing_directory_fails() {
  let dir = ScratchDir::new("session_missing");
  let err = StreamingSession::open(&dir.join("nothing"), StreamingConfig::default())
    .err()
    .unwrap();
  assert!(matches!(err, StreamError::Store(_)), "{err}");
}
