//! Renderer side of a streaming session.
//!
//! The host application owns a [`RendererEndpoint`] and calls
//! [`RendererEndpoint::end_frame`] once per frame. While the user is
//! interacting with the view nothing is published or applied; on quiet frames
//! the camera matrix is handed to the scheduler and up to
//! `render_ops_per_frame` queued add/remove commands reach the
//! [`PointRenderer`], in the order the scheduler issued them.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DMat4;

use super::camera::CameraSlot;
use super::types::{CacheReturn, PickResult, RenderAdd, RenderRemove, RendererPorts};
use crate::octree::SpatialAddress;
use crate::point::NodePoints;

/// Where node geometry ends up. Implemented by the host application.
pub trait PointRenderer {
	fn add_geometry(&mut self, address: &SpatialAddress, points: &NodePoints);
	fn remove_geometry(&mut self, address: &SpatialAddress);
}

/// A render queue entry after merging the add and remove queues.
#[derive(Clone, Debug)]
pub enum RenderCommand {
	Add(RenderAdd),
	Remove(RenderRemove),
}

impl RenderCommand {
	pub fn seq(&self) -> u64 {
		match self {
			RenderCommand::Add(add) => add.seq,
			RenderCommand::Remove(remove) => remove.seq,
		}
	}

	pub fn address(&self) -> &SpatialAddress {
		match self {
			RenderCommand::Add(add) => &add.address,
			RenderCommand::Remove(remove) => &remove.address,
		}
	}
}

pub struct RendererEndpoint {
	ports: RendererPorts,
	camera: Arc<CameraSlot>,
	ops_per_frame: usize,
	next_add: Option<RenderAdd>,
	next_remove: Option<RenderRemove>,
	on_scene: HashMap<SpatialAddress, NodePoints>,
}

impl RendererEndpoint {
	pub fn new(ports: RendererPorts, camera: Arc<CameraSlot>, ops_per_frame: usize) -> Self {
		Self {
			ports,
			camera,
			ops_per_frame: ops_per_frame.max(1),
			next_add: None,
			next_remove: None,
			on_scene: HashMap::new(),
		}
	}

	pub fn camera(&self) -> &Arc<CameraSlot> {
		&self.camera
	}

	/// Nodes whose geometry is currently shown.
	pub fn on_scene(&self) -> impl Iterator<Item = &SpatialAddress> {
		self.on_scene.keys()
	}

	pub fn on_scene_len(&self) -> usize {
		self.on_scene.len()
	}

	pub fn points_on_scene(&self) -> usize {
		self.on_scene.values().map(|points| points.len()).sum()
	}

	/// Finish a frame. Returns how many render commands were applied.
	pub fn end_frame(&mut self, camera: DMat4, interacted: bool, renderer: &mut impl PointRenderer) -> usize {
		if interacted {
			return 0;
		}
		self.camera.publish(camera);

		let mut applied = 0;
		while applied < self.ops_per_frame {
			let Some(command) = self.next_command() else {
				break;
			};
			self.apply(command, renderer);
			applied += 1;
		}
		applied
	}

	/// Apply everything queued right now, ignoring the per-frame limit.
	pub fn flush(&mut self, renderer: &mut impl PointRenderer) -> usize {
		let mut applied = 0;
		while let Some(command) = self.next_command() {
			self.apply(command, renderer);
			applied += 1;
		}
		applied
	}

	/// Next command in issue order, if any is queued.
	pub fn next_command(&mut self) -> Option<RenderCommand> {
		self.poll_heads();
		// The scheduler sends in seq order. A head with seq k that became
		// visible after the other queue was polled empty implies anything
		// lower on that queue is enqueued by now.
		if self.next_add.is_some() != self.next_remove.is_some() {
			self.poll_heads();
		}

		let take_add = match (&self.next_add, &self.next_remove) {
			(Some(add), Some(remove)) => add.seq < remove.seq,
			(Some(_), None) => true,
			(None, _) => false,
		};
		if take_add {
			self.next_add.take().map(RenderCommand::Add)
		} else {
			self.next_remove.take().map(RenderCommand::Remove)
		}
	}

	fn poll_heads(&mut self) {
		if self.next_add.is_none() {
			self.next_add = self.ports.render_add.try_recv().ok();
		}
		if self.next_remove.is_none() {
			self.next_remove = self.ports.render_remove.try_recv().ok();
		}
	}

	/// Apply one command; removed payloads go back to the loader's cache.
	pub fn apply(&mut self, command: RenderCommand, renderer: &mut impl PointRenderer) {
		match command {
			RenderCommand::Add(RenderAdd { address, points, .. }) => {
				renderer.add_geometry(&address, &points);
				self.on_scene.insert(address, points);
			}
			RenderCommand::Remove(RenderRemove { address, .. }) => {
				renderer.remove_geometry(&address);
				match self.on_scene.remove(&address) {
					Some(points) => {
						if self.ports.cache_returns.send(CacheReturn { address, points }).is_err() {
							log::debug!("loader gone, payload not cached");
						}
					}
					None => log::warn!("remove for {address} which is not on scene"),
				}
			}
		}
	}

	/// Report the point at `index` of `address` to the scheduler.
	///
	/// Returns its class, or `None` for an unknown point or an unclassified
	/// structure.
	pub fn pick_point(&self, address: &SpatialAddress, index: usize) -> Option<u32> {
		let class = self
			.on_scene
			.get(address)
			.and_then(|points| points.get(index))
			.and_then(|point| point.class());
		let pick = PickResult {
			address: address.clone(),
			index,
			class,
		};
		if self.ports.picks.send(pick).is_err() {
			log::debug!("scheduler gone, pick dropped");
		}
		class
	}
}
