//! Renderer stand-in for replays without a window.

use std::collections::HashMap;
use std::f64::consts::TAU;

use glam::{DMat4, DVec3};
use pointcloud_stream::{BoundingBox, NodePoints, PointRenderer, SpatialAddress};

/// Keeps per-node point counts instead of GPU buffers.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
	nodes: HashMap<SpatialAddress, usize>,
	pub adds: u64,
	pub removes: u64,
	pub peak_points: usize,
}

impl HeadlessRenderer {
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn point_count(&self) -> usize {
		self.nodes.values().sum()
	}
}

impl PointRenderer for HeadlessRenderer {
	fn add_geometry(&mut self, address: &SpatialAddress, points: &NodePoints) {
		self.nodes.insert(address.clone(), points.len());
		self.adds += 1;
		self.peak_points = self.peak_points.max(self.point_count());
	}

	fn remove_geometry(&mut self, address: &SpatialAddress) {
		if self.nodes.remove(address).is_some() {
			self.removes += 1;
		}
	}
}

/// Camera circling the cloud once over `frames` frames.
pub struct OrbitCamera {
	center: DVec3,
	distance: f64,
	height: f64,
	far: f64,
	frames: usize,
}

impl OrbitCamera {
	/// Orbit at `zoom` times the cloud radius.
	pub fn around(bounds: &BoundingBox, zoom: f64, frames: usize) -> Self {
		let radius = (bounds.size().length() * 0.5).max(1.0);
		let distance = radius * zoom;
		Self {
			center: bounds.center(),
			distance,
			height: radius * 0.25,
			far: distance + radius * 2.0,
			frames: frames.max(1),
		}
	}

	/// Combined projection-view matrix for `frame`.
	pub fn matrix(&self, frame: usize) -> DMat4 {
		let angle = TAU * (frame % self.frames) as f64 / self.frames as f64;
		let eye = self.center
			+ DVec3::new(angle.cos() * self.distance, self.height, angle.sin() * self.distance);
		let projection = DMat4::perspective_rh_gl(60f64.to_radians(), 16.0 / 9.0, 0.1, self.far);
		projection * DMat4::look_at_rh(eye, self.center, DVec3::Y)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use glam::Vec3;
	use pointcloud_stream::PointRecord;

	use super::*;

	#[test]
	fn test_headless_counts_points() {
		let mut renderer = HeadlessRenderer::default();
		let points: NodePoints = Arc::from(vec![PointRecord::Xyz { position: Vec3::ZERO }; 4]);
		renderer.add_geometry(&SpatialAddress::root(), &points);
		renderer.add_geometry(&"a".parse().unwrap(), &points);
		renderer.remove_geometry(&SpatialAddress::root());

		assert_eq!(renderer.node_count(), 1);
		assert_eq!(renderer.point_count(), 4);
		assert_eq!(renderer.peak_points, 8);
	}

	#[test]
	fn test_orbit_keeps_center_in_view() {
		let bounds = BoundingBox::new(DVec3::ZERO, DVec3::splat(10.0));
		let orbit = OrbitCamera::around(&bounds, 3.0, 8);
		for frame in 0..8 {
			let clip = orbit.matrix(frame) * bounds.center().extend(1.0);
			let ndc = clip.truncate() / clip.w;
			assert!(clip.w > 0.0 && ndc.abs().max_element() < 1.0, "frame {frame}: {ndc:?}");
		}
	}
}
