//! StreamingSession - wires the scheduler and loader threads to a renderer.
//!
//! ```text
//!               load-request              render-add / render-remove
//!  Scheduler ────────────────► Loader      Scheduler ──────────────► Renderer
//!      ▲     ◄────────────────   ▲             ▲                        │
//!      │        load-result      │             │  pick      camera      │
//!      │                         └──── cache-return ◄───────────────────┤
//!      └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The renderer side is not a thread: the host drives it through the
//! [`RendererEndpoint`] returned by [`StreamingSession::open`].

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, Sender};

use super::camera::CameraSlot;
use super::loader::Loader;
use super::renderer::RendererEndpoint;
use super::types::PipelineContext;
use crate::config::StreamingConfig;
use crate::error::StreamError;
use crate::hierarchy::HierarchyMirror;
use crate::metrics::{LoaderMetrics, StreamingMetrics};
use crate::octree::OctreeBounds;
use crate::scheduler::Scheduler;
use crate::store::{ClassLabels, CloudMetadata, NodeStore};

/// Running scheduler and loader threads for one octree.
pub struct StreamingSession {
  metadata: CloudMetadata,
  camera: Arc<CameraSlot>,
  shutdown: Sender<()>,
  scheduler: JoinHandle<Result<StreamingMetrics, StreamError>>,
  loader: JoinHandle<LoaderMetrics>,
}

impl StreamingSession {
  /// Open the octree directory written by the builder and start streaming.
  ///
  /// The scheduler waits up to `init_timeout_ms` for the first camera
  /// matrix from the returned endpoint.
  pub fn open(
    octree_dir: &Path,
    config: StreamingConfig,
  ) -> Result<(Self, RendererEndpoint), StreamError> {
    let (store, metadata) = NodeStore::open(octree_dir)?;
    let labels = ClassLabels::load(octree_dir)?;
    let mirror = HierarchyMirror::build(&store, OctreeBounds::new(metadata.bounding_box))?;
    log::info!(
      "opened {} ({} points, {:?}): {} nodes",
      metadata.name,
      metadata.total_point_count,
      metadata.structure,
      mirror.len()
    );
    Self::start(store, metadata, mirror, labels, config)
  }

  /// Start from already loaded parts.
  pub fn start(
    store: NodeStore,
    metadata: CloudMetadata,
    mirror: HierarchyMirror,
    labels: ClassLabels,
    config: StreamingConfig,
  ) -> Result<(Self, RendererEndpoint), StreamError> {
    let PipelineContext {
      scheduler: scheduler_ports,
      loader: loader_ports,
      renderer: renderer_ports,
    } = PipelineContext::new();
    let camera = Arc::new(CameraSlot::new());
    let (shutdown, shutdown_rx) = channel::bounded(1);

    let loader = Loader::new(store, &config);
    let loader = thread::Builder::new()
      .name("pointcloud-loader".into())
      .spawn(move || loader.run(loader_ports))
      .map_err(|source| StreamError::Spawn {
        name: "loader",
        source,
      })?;

    let endpoint = RendererEndpoint::new(renderer_ports, camera.clone(), config.render_ops_per_frame);
    let scheduler = {
      let camera = camera.clone();
      let scheduler = Scheduler::new(mirror, config, scheduler_ports, labels);
      thread::Builder::new()
        .name("pointcloud-scheduler".into())
        .spawn(move || scheduler.run(&camera, &shutdown_rx))
        .map_err(|source| StreamError::Spawn {
          name: "scheduler",
          source,
        })?
    };

    let session = Self {
      metadata,
      camera,
      shutdown,
      scheduler,
      loader,
    };
    Ok((session, endpoint))
  }

  pub fn metadata(&self) -> &CloudMetadata {
    &self.metadata
  }

  pub fn camera(&self) -> &Arc<CameraSlot> {
    &self.camera
  }

  /// The scheduler thread has exited, normally only after an error.
  pub fn is_finished(&self) -> bool {
    self.scheduler.is_finished()
  }

  /// Stop both threads and return the combined metrics.
  ///
  /// If the scheduler is still waiting for its first camera matrix this
  /// blocks until that wait times out.
  pub fn shutdown(self) -> Result<StreamingMetrics, StreamError> {
    // A full or closed channel both mean the scheduler is already stopping.
    let _ = self.shutdown.try_send(());

    let scheduled = self
      .scheduler
      .join()
      .map_err(|_| StreamError::ActorPanicked("scheduler"))?;
    let loaded = self
      .loader
      .join()
      .map_err(|_| StreamError::ActorPanicked("loader"))?;

    let mut metrics = scheduled?;
    metrics.merge_loader(&loaded);
    log::info!(
      "session closed: {} ticks, {} loads, cache hit ratio {:.2}",
      metrics.ticks,
      metrics.loads_delivered,
      metrics.cache_hit_ratio()
    );
    Ok(metrics)
  }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
