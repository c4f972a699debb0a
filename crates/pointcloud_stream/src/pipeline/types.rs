//! Messages exchanged between the scheduler, loader and renderer.

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::cache::RecencyCacheEntry;
use crate::error::StoreError;
use crate::octree::SpatialAddress;
use crate::point::NodePoints;

/// Scheduler → Loader: read the payload of `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
  pub address: SpatialAddress,
}

/// How a load ended.
#[derive(Debug)]
pub enum LoadOutcome {
  Loaded(NodePoints),
  /// Every read attempt failed.
  Failed(StoreError),
}

/// Loader → Scheduler.
#[derive(Debug)]
pub struct LoadResult {
  pub address: SpatialAddress,
  pub outcome: LoadOutcome,
}

/// Scheduler → Renderer: show `points` for `address`.
#[derive(Clone, Debug)]
pub struct RenderAdd {
  /// Issue order shared with [`RenderRemove`].
  pub seq: u64,
  pub address: SpatialAddress,
  pub points: NodePoints,
}

/// Scheduler → Renderer: drop the geometry of `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRemove {
  pub seq: u64,
  pub address: SpatialAddress,
}

/// Renderer → Loader: payload of a node taken off screen.
pub type CacheReturn = RecencyCacheEntry;

/// Renderer → Scheduler: outcome of a point pick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickResult {
  pub address: SpatialAddress,
  pub index: usize,
  /// `None` when the point does not exist or carries no class.
  pub class: Option<u32>,
}

// =============================================================================
// Pipeline Context
// =============================================================================

/// Scheduler side of the queues.
pub struct SchedulerPorts {
  pub load_requests: Sender<LoadRequest>,
  pub load_results: Receiver<LoadResult>,
  pub render_add: Sender<RenderAdd>,
  pub render_remove: Sender<RenderRemove>,
  pub picks: Receiver<PickResult>,
}

/// Loader side of the queues.
pub struct LoaderPorts {
  pub load_requests: Receiver<LoadRequest>,
  pub load_results: Sender<LoadResult>,
  pub cache_returns: Receiver<CacheReturn>,
}

/// Renderer side of the queues.
pub struct RendererPorts {
  pub render_add: Receiver<RenderAdd>,
  pub render_remove: Receiver<RenderRemove>,
  pub cache_returns: Sender<CacheReturn>,
  pub picks: Sender<PickResult>,
}

/// Every queue of a session, created once and split between the actors.
pub struct PipelineContext {
  pub scheduler: SchedulerPorts,
  pub loader: LoaderPorts,
  pub renderer: RendererPorts,
}

impl PipelineContext {
  /// Create the six unbounded FIFO queues.
  pub fn new() -> Self {
    let (load_request_tx, load_request_rx) = channel::unbounded();
    let (load_result_tx, load_result_rx) = channel::unbounded();
    let (render_add_tx, render_add_rx) = channel::unbounded();
    let (render_remove_tx, render_remove_rx) = channel::unbounded();
    let (cache_return_tx, cache_return_rx) = channel::unbounded();
    let (pick_tx, pick_rx) = channel::unbounded();

    Self {
      scheduler: SchedulerPorts {
        load_requests: load_request_tx,
        load_results: load_result_rx,
        render_add: render_add_tx,
        render_remove: render_remove_tx,
        picks: pick_rx,
      },
      loader: LoaderPorts {
        load_requests: load_request_rx,
        load_results: load_result_tx,
        cache_returns: cache_return_rx,
      },
      renderer: RendererPorts {
        render_add: render_add_rx,
        render_remove: render_remove_rx,
        cache_returns: cache_return_tx,
        picks: pick_tx,
      },
    }
  }
}

impl Default for PipelineContext {
  fn default() -> Self {
    Self::new()
  }
}
