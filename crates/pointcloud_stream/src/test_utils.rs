//! Test utilities shared by the unit suites.
//!
//! Provides scratch directories, synthetic point files and camera matrices.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{DMat4, DVec3};

// =============================================================================
// Scratch Directories
// =============================================================================

/// Unique directory under the system temp dir, removed on drop.
pub struct ScratchDir {
  path: PathBuf,
}

impl ScratchDir {
  pub fn new(name: &str) -> Self {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
      "pointcloud_stream-{}-{name}-{n}",
      std::process::id()
    ));
    let _ = fs::remove_dir_all(&path);
    fs::create_dir_all(&path).unwrap();
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Path of `name` inside the scratch directory (not created).
  pub fn join(&self, name: &str) -> PathBuf {
    self.path.join(name)
  }
}

impl Drop for ScratchDir {
  fn drop(&mut self) {
    let _ = fs::remove_dir_all(&self.path);
  }
}

// =============================================================================
// Synthetic Point Files
// =============================================================================

/// Deterministic pseudo-random positions inside `[0, extent)^3`.
pub fn lattice_positions(count: usize, extent: f64) -> Vec<DVec3> {
  // Weyl sequence over the three axes; well spread and reproducible.
  const A: [f64; 3] = [0.754_877_666, 0.569_840_291, 0.362_755_587];
  (1..=count)
    .map(|i| {
      let i = i as f64;
      DVec3::new(
        (i * A[0]).fract() * extent,
        (i * A[1]).fract() * extent,
        (i * A[2]).fract() * extent,
      )
    })
    .collect()
}

/// Write an `xyz` file, optionally preceded by a point-count header.
pub fn write_xyz(path: &Path, positions: &[DVec3], header: bool) {
  let mut out = String::new();
  if header {
    writeln!(out, "{}", positions.len()).unwrap();
  }
  for p in positions {
    writeln!(out, "{} {} {}", p.x as f32, p.y as f32, p.z as f32).unwrap();
  }
  fs::write(path, out).unwrap();
}

/// Write an `xyzrgbc` file; class ids cycle through `classes`.
pub fn write_xyzrgbc(path: &Path, positions: &[DVec3], classes: u32) {
  let mut out = String::new();
  for (i, p) in positions.iter().enumerate() {
    let class = i as u32 % classes.max(1);
    writeln!(out, "{} {} {} 255 128 0 {class}", p.x as f32, p.y as f32, p.z as f32).unwrap();
  }
  fs::write(path, out).unwrap();
}

// =============================================================================
// Cameras
// =============================================================================

/// Combined projection-view matrix of a perspective camera.
pub fn camera(eye: DVec3, target: DVec3, near: f64, far: f64) -> DMat4 {
  let projection = DMat4::perspective_rh_gl(60f64.to_radians(), 1.0, near, far);
  let view = DMat4::look_at_rh(eye, target, DVec3::Y);
  projection * view
}

/// Camera at `(c, c, c + distance)` looking down -Z at the center of a
/// `[0, extent]^3` cloud.
pub fn camera_facing_cloud(extent: f64, distance: f64) -> DMat4 {
  let c = extent * 0.5;
  camera(DVec3::new(c, c, c + distance), DVec3::splat(c), 0.1, distance + extent * 4.0)
}

/// Camera looking away from a `[0, extent]^3` cloud.
pub fn camera_facing_away(extent: f64) -> DMat4 {
  let c = extent * 0.5;
  camera(DVec3::new(c, c, c + extent * 2.0), DVec3::new(c, c, extent * 10.0), 0.1, extent)
}
