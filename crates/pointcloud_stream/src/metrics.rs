//! Streaming session statistics.
//!
//! Counters are owned by the actor that produces them (scheduler or
//! loader) and merged into one [`StreamingMetrics`] at shutdown.

use std::collections::VecDeque;
use std::time::Duration;

/// The most recent tick durations, in microseconds.
#[derive(Debug, Clone)]
pub struct TickTimings {
    recent: VecDeque<u64>,
    capacity: usize,
}

impl TickTimings {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one tick, dropping the oldest once `capacity` are held.
    pub fn record(&mut self, micros: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(micros);
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Mean of the held durations, zero when none are held.
    pub fn mean(&self) -> f64 {
        match self.recent.len() {
            0 => 0.0,
            n => self.recent.iter().sum::<u64>() as f64 / n as f64,
        }
    }
}

impl Default for TickTimings {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Counters and timings of one streaming session.
#[derive(Debug, Clone, Default)]
pub struct StreamingMetrics {
    // Scheduler
    pub ticks: u64,
    /// Load requests sent to the loader.
    pub loads_issued: u64,
    /// Payloads forwarded to the renderer.
    pub loads_delivered: u64,
    /// Payloads discarded because their node was no longer wanted.
    pub loads_cancelled: u64,
    /// Loads that failed after all retries.
    pub loads_failed: u64,
    /// Nodes taken out of the scene.
    pub nodes_removed: u64,
    /// Largest active-node count seen at the end of a tick.
    pub peak_active: usize,
    /// Tick durations in microseconds.
    pub tick_timings: TickTimings,

    // Loader
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Read attempts beyond the first.
    pub read_retries: u64,
}

impl StreamingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self, elapsed: Duration, active: usize) {
        self.ticks += 1;
        self.tick_timings.record(elapsed.as_micros() as u64);
        self.peak_active = self.peak_active.max(active);
    }

    /// Fold the loader's counters into the scheduler's.
    pub fn merge_loader(&mut self, loader: &LoaderMetrics) {
        self.cache_hits += loader.cache_hits;
        self.cache_misses += loader.cache_misses;
        self.read_retries += loader.read_retries;
    }

    /// Share of loads served from the recency cache.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn avg_tick_us(&self) -> f64 {
        self.tick_timings.mean()
    }
}

/// Counters kept by the loader thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderMetrics {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub read_retries: u64,
}
