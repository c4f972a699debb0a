//! StreamingConfig - admission limits and timing for a streaming session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Streaming session configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
	/// Hard ceiling on simultaneously active nodes, root included.
	pub node_budget: usize,
	/// Entries kept by the loader's recency cache.
	pub cache_capacity: usize,
	/// Scheduler sleep between ticks, in milliseconds.
	pub tick_interval_ms: u64,
	/// How long the scheduler waits for the first camera matrix.
	pub init_timeout_ms: u64,
	/// Extra read attempts after a failed node load.
	pub load_retries: u32,
	/// Pause between read attempts, in milliseconds.
	pub retry_backoff_ms: u64,
	/// Outstanding load requests allowed at once (0 = unlimited).
	pub max_in_flight: usize,
	/// When set, an inactive child is only expanded if at most this share
	/// of its siblings is fully visible, or the camera is within its radius.
	pub dense_visibility_ratio: Option<f64>,
	/// Render commands applied per renderer frame.
	pub render_ops_per_frame: usize,
}

impl Default for StreamingConfig {
	fn default() -> Self {
		Self {
			node_budget: 80,
			cache_capacity: 128,
			tick_interval_ms: 4,
			init_timeout_ms: 10_000,
			load_retries: 2,
			retry_backoff_ms: 5,
			max_in_flight: 16,
			dense_visibility_ratio: None,
			render_ops_per_frame: 1,
		}
	}
}

impl StreamingConfig {
	#[inline]
	pub fn tick_interval(&self) -> Duration {
		Duration::from_millis(self.tick_interval_ms)
	}

	#[inline]
	pub fn init_timeout(&self) -> Duration {
		Duration::from_millis(self.init_timeout_ms)
	}

	#[inline]
	pub fn retry_backoff(&self) -> Duration {
		Duration::from_millis(self.retry_backoff_ms)
	}

	/// Check if another load may be issued with `in_flight` outstanding.
	#[inline]
	pub fn can_issue(&self, in_flight: usize) -> bool {
		self.max_in_flight == 0 || in_flight < self.max_in_flight
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = StreamingConfig::default();
		assert_eq!(config.node_budget, 80);
		assert_eq!(config.cache_capacity, 128);
		assert_eq!(config.init_timeout(), Duration::from_secs(10));
		assert!(config.dense_visibility_ratio.is_none());
	}

	#[test]
	fn test_partial_json_keeps_defaults() {
		let config: StreamingConfig = serde_json::from_str(r#"{"node_budget": 12}"#).unwrap();
		assert_eq!(config.node_budget, 12);
		assert_eq!(config.max_in_flight, 16);
	}

	#[test]
	fn test_in_flight_cap() {
		let mut config = StreamingConfig {
			max_in_flight: 2,
			..Default::default()
		};
		assert!(config.can_issue(1));
		assert!(!config.can_issue(2));
		config.max_in_flight = 0;
		assert!(config.can_issue(1_000));
	}
}
