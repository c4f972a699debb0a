//! Loader actor - serves load requests from the recency cache or the store.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{self as channel, select};

use super::types::{LoadOutcome, LoadRequest, LoadResult, LoaderPorts};
use crate::cache::RecencyCache;
use crate::config::StreamingConfig;
use crate::error::StoreError;
use crate::metrics::LoaderMetrics;
use crate::octree::SpatialAddress;
use crate::point::NodePoints;
use crate::store::NodeStore;

/// Reads node payloads, keeping recently evicted ones warm.
pub struct Loader {
  store: NodeStore,
  cache: RecencyCache,
  retries: u32,
  backoff: Duration,
  metrics: LoaderMetrics,
}

impl Loader {
  pub fn new(store: NodeStore, config: &StreamingConfig) -> Self {
    Self {
      store,
      cache: RecencyCache::new(config.cache_capacity),
      retries: config.load_retries,
      backoff: config.retry_backoff(),
      metrics: LoaderMetrics::default(),
    }
  }

  pub fn cache(&self) -> &RecencyCache {
    &self.cache
  }

  pub fn metrics(&self) -> LoaderMetrics {
    self.metrics
  }

  /// Payload of `address`, from the cache when present.
  ///
  /// I/O failures are retried up to `load_retries` times; a missing or
  /// corrupt node fails at once.
  pub fn load(&mut self, address: &SpatialAddress) -> LoadOutcome {
    if self.cache.contains(address) {
      match self.cache.promote(address) {
        Ok(points) => {
          self.metrics.cache_hits += 1;
          return LoadOutcome::Loaded(points);
        }
        Err(e) => log::error!("{e}"),
      }
    }
    self.metrics.cache_misses += 1;

    let mut attempt = 0;
    loop {
      match self.store.read(address) {
        Ok(node) => return LoadOutcome::Loaded(NodePoints::from(node.points)),
        Err(StoreError::Io { path, source }) if attempt < self.retries => {
          attempt += 1;
          self.metrics.read_retries += 1;
          log::warn!(
            "read of {} failed ({source}), retry {attempt}/{}",
            path.display(),
            self.retries
          );
          thread::sleep(self.backoff);
        }
        Err(e) => return LoadOutcome::Failed(e),
      }
    }
  }

  /// Serve requests and absorb cache returns until the scheduler hangs up.
  ///
  /// Cache returns still queued when the request queue closes are dropped.
  pub fn run(mut self, ports: LoaderPorts) -> LoaderMetrics {
    let mut returns_open = true;
    let closed = channel::never();

    loop {
      let returns = if returns_open {
        &ports.cache_returns
      } else {
        &closed
      };
      select! {
        recv(ports.load_requests) -> msg => {
          let Ok(LoadRequest { address }) = msg else {
            break;
          };
          let outcome = self.load(&address);
          if ports.load_results.send(LoadResult { address, outcome }).is_err() {
            log::debug!("scheduler gone, dropping load result");
          }
        }
        recv(returns) -> msg => match msg {
          Ok(entry) => self.cache.insert(entry),
          Err(_) => returns_open = false,
        },
      }
    }

    log::debug!(
      "loader stopped: {} cache hits, {} misses",
      self.metrics.cache_hits,
      self.metrics.cache_misses
    );
    self.metrics
  }
}
