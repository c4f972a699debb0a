//! StreamingScheduler - decides every tick which nodes to load, keep or
//! evict under a hard node budget.
//!
//! # Tick
//!
//! ```text
//! camera matrix ──► FrustumCuller
//!                        │
//!                        ▼
//!          evaluate(mirror) ──► removals ──► render-remove (if on screen)
//!                        │
//!                        ▼
//!          rank candidates ──► load-request (while under budget and in-flight cap)
//!                        │
//!                        ▼
//!          one load-result ──► render-add, or discard if no longer wanted
//! ```
//!
//! The active count includes the root and nodes whose load is in flight.
//! It never exceeds the budget at the end of a tick. Skipped candidates are
//! not remembered; the next tick re-evaluates from scratch.

pub mod candidates;

use std::collections::HashMap;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use glam::DMat4;
use web_time::Instant;

pub use candidates::{priority, Candidate, Evaluation};

use crate::config::StreamingConfig;
use crate::error::StreamError;
use crate::frustum::FrustumCuller;
use crate::hierarchy::{Deactivation, HierarchyMirror};
use crate::metrics::StreamingMetrics;
use crate::octree::SpatialAddress;
use crate::pipeline::{
  CameraSlot, LoadOutcome, LoadRequest, LoadResult, PickResult, RenderAdd, RenderRemove,
  SchedulerPorts,
};
use crate::store::ClassLabels;

/// A resolved pick, as logged by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickReport {
  pub address: SpatialAddress,
  pub index: usize,
  pub class: Option<u32>,
  pub label: Option<String>,
}

/// What one tick did.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
  /// Candidates found by the walk.
  pub candidates: usize,
  /// Load requests issued, highest priority first.
  pub issued: Vec<SpatialAddress>,
  /// Nodes deactivated by the walk.
  pub removed: Vec<SpatialAddress>,
  /// Payload forwarded to the renderer.
  pub delivered: Option<SpatialAddress>,
  /// Payload discarded on arrival.
  pub cancelled: Option<SpatialAddress>,
  /// Load that failed after all retries.
  pub failed: Option<SpatialAddress>,
  pub picks: Vec<PickReport>,
  /// Active nodes at the end of the tick.
  pub active: usize,
}

/// Owns the mirror and drives the loader.
pub struct Scheduler {
  config: StreamingConfig,
  mirror: HierarchyMirror,
  culler: FrustumCuller,
  ports: SchedulerPorts,
  labels: ClassLabels,
  /// Outstanding loads per address.
  in_flight: HashMap<SpatialAddress, usize>,
  in_flight_total: usize,
  active: usize,
  next_seq: u64,
  metrics: StreamingMetrics,
}

impl Scheduler {
  pub fn new(
    mirror: HierarchyMirror,
    config: StreamingConfig,
    ports: SchedulerPorts,
    labels: ClassLabels,
  ) -> Self {
    let active = mirror.active_count();
    Self {
      config,
      mirror,
      culler: FrustumCuller::default(),
      ports,
      labels,
      in_flight: HashMap::new(),
      in_flight_total: 0,
      active,
      next_seq: 0,
      metrics: StreamingMetrics::new(),
    }
  }

  pub fn mirror(&self) -> &HierarchyMirror {
    &self.mirror
  }

  pub fn active_count(&self) -> usize {
    self.active
  }

  pub fn in_flight(&self) -> usize {
    self.in_flight_total
  }

  pub fn metrics(&self) -> &StreamingMetrics {
    &self.metrics
  }

  pub fn into_metrics(self) -> StreamingMetrics {
    self.metrics
  }

  fn budget(&self) -> usize {
    // The root is always active.
    self.config.node_budget.max(1)
  }

  /// Ask the loader for the root payload. The root is active from the start.
  pub fn request_root(&mut self) -> Result<(), StreamError> {
    self.request(SpatialAddress::root())
  }

  /// Run until `shutdown` fires or disconnects.
  ///
  /// Waits for the first camera matrix, requests the root, then ticks every
  /// `tick_interval_ms` against the latest published matrix.
  pub fn run(mut self, camera: &CameraSlot, shutdown: &Receiver<()>) -> Result<StreamingMetrics, StreamError> {
    let mut matrix = camera.wait_ready(self.config.init_timeout())?;
    log::info!("scheduler started: {} nodes mirrored, budget {}", self.mirror.len(), self.budget());
    self.request_root()?;

    loop {
      if let Some(latest) = camera.snapshot() {
        matrix = latest;
      }
      self.tick(&matrix)?;
      match shutdown.recv_timeout(self.config.tick_interval()) {
        Err(RecvTimeoutError::Timeout) => continue,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
      }
    }

    log::info!(
      "scheduler stopped after {} ticks: {} loads delivered, {} cancelled, {} failed",
      self.metrics.ticks,
      self.metrics.loads_delivered,
      self.metrics.loads_cancelled,
      self.metrics.loads_failed
    );
    Ok(self.metrics)
  }

  /// One scheduling step against `camera`.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "scheduler::tick"))]
  pub fn tick(&mut self, camera: &DMat4) -> Result<TickReport, StreamError> {
    let started = Instant::now();
    let mut report = TickReport::default();
    self.culler.update(camera);

    let mut evaluation = {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("evaluate").entered();
      let mut evaluation = Evaluation::default();
      candidates::evaluate(
        self.mirror.root_mut(),
        &self.culler,
        self.config.dense_visibility_ratio,
        &mut evaluation,
      );
      evaluation
    };

    for removal in evaluation.removed {
      report.removed.push(removal.address.clone());
      self.retire(removal)?;
    }

    report.candidates = evaluation.candidates.len();
    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("issue_loads").entered();
      candidates::rank(&mut evaluation.candidates);
      for candidate in evaluation.candidates {
        if self.active >= self.budget() || !self.config.can_issue(self.in_flight_total) {
          break;
        }
        self.mirror.activate(&candidate.address);
        self.active += 1;
        self.request(candidate.address.clone())?;
        report.issued.push(candidate.address);
      }
    }

    self.drain_one_result(&mut report)?;
    self.drain_picks(&mut report);

    report.active = self.active;
    self.metrics.record_tick(started.elapsed(), self.active);
    Ok(report)
  }

  fn request(&mut self, address: SpatialAddress) -> Result<(), StreamError> {
    *self.in_flight.entry(address.clone()).or_insert(0) += 1;
    self.in_flight_total += 1;
    self.metrics.loads_issued += 1;
    self
      .ports
      .load_requests
      .send(LoadRequest { address })
      .map_err(|_| StreamError::ChannelClosed("load-request"))
  }

  /// Account for a node the walk deactivated.
  fn retire(&mut self, removal: Deactivation) -> Result<(), StreamError> {
    self.active = self.active.saturating_sub(1);
    self.metrics.nodes_removed += 1;
    if removal.points.is_some() {
      let seq = self.next_seq();
      self
        .ports
        .render_remove
        .send(RenderRemove {
          seq,
          address: removal.address,
        })
        .map_err(|_| StreamError::ChannelClosed("render-remove"))?;
    }
    Ok(())
  }

  fn next_seq(&mut self) -> u64 {
    let seq = self.next_seq;
    self.next_seq += 1;
    seq
  }

  /// Handle at most one completed load.
  fn drain_one_result(&mut self, report: &mut TickReport) -> Result<(), StreamError> {
    let LoadResult { address, outcome } = match self.ports.load_results.try_recv() {
      Ok(result) => result,
      Err(TryRecvError::Empty) => return Ok(()),
      Err(TryRecvError::Disconnected) => return Err(StreamError::ChannelClosed("load-result")),
    };

    let still_pending = match self.in_flight.get_mut(&address) {
      Some(count) if *count > 1 => {
        *count -= 1;
        true
      }
      _ => {
        self.in_flight.remove(&address);
        false
      }
    };
    self.in_flight_total = self.in_flight_total.saturating_sub(1);

    match outcome {
      LoadOutcome::Loaded(points) => {
        let wanted = self
          .mirror
          .lookup_mut(&address)
          .filter(|node| node.active && node.points.is_none());
        match wanted {
          Some(node) => {
            node.points = Some(points.clone());
            let seq = self.next_seq();
            self
              .ports
              .render_add
              .send(RenderAdd {
                seq,
                address: address.clone(),
                points,
              })
              .map_err(|_| StreamError::ChannelClosed("render-add"))?;
            self.metrics.loads_delivered += 1;
            report.delivered = Some(address);
          }
          None => {
            log::debug!("discarding payload of {address}: node no longer wanted");
            self.metrics.loads_cancelled += 1;
            report.cancelled = Some(address);
          }
        }
      }
      LoadOutcome::Failed(error) => {
        self.metrics.loads_failed += 1;
        if address.is_root() {
          return Err(error.into());
        }
        log::error!("load of {address} failed: {error}");
        let waiting = self
          .mirror
          .lookup(&address)
          .is_some_and(|node| node.active && node.points.is_none());
        if waiting && !still_pending {
          self.mirror.deactivate(&address);
          self.active = self.active.saturating_sub(1);
        }
        report.failed = Some(address);
      }
    }
    Ok(())
  }

  fn drain_picks(&mut self, report: &mut TickReport) {
    while let Ok(PickResult { address, index, class }) = self.ports.picks.try_recv() {
      let label = class.and_then(|c| self.labels.get(c)).map(str::to_string);
      match (class, &label) {
        (Some(c), Some(l)) => log::info!("picked point {index} of {address}: class {c} ({l})"),
        (Some(c), None) => log::info!("picked point {index} of {address}: class {c}"),
        (None, _) => log::info!("no classified point picked"),
      }
      report.picks.push(PickReport {
        address,
        index,
        class,
        label,
      });
    }
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
