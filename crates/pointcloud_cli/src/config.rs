//! Optional TOML configuration for the `pointcloud` tool.
//!
//! ```toml
//! [build]
//! node_capacity = 80000
//! root_capacity = 20000
//! seed = 42
//!
//! [streaming]
//! node_budget = 120
//! cache_capacity = 256
//! ```
//!
//! Every key is optional; missing ones take the library defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use pointcloud_stream::{BuildConfig, ClassLabels, StreamingConfig};

/// Root configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
	pub build: BuildConfig,
	pub streaming: StreamingConfig,
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		let config: Config =
			toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
		config.validate()?;
		Ok(config)
	}

	/// Defaults, or the file at `path` when one is given.
	pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
		match path {
			Some(path) => Self::load(path),
			None => Ok(Self::default()),
		}
	}

	pub fn validate(&self) -> Result<()> {
		let build = &self.build;
		if build.node_capacity == 0 {
			anyhow::bail!("build.node_capacity must be positive");
		}
		if build.root_capacity < 8 {
			anyhow::bail!(
				"build.root_capacity must be at least 8, got {}",
				build.root_capacity
			);
		}
		if !(0.0..=1.0).contains(&build.root_retain_fraction) {
			anyhow::bail!(
				"build.root_retain_fraction must be within [0, 1], got {}",
				build.root_retain_fraction
			);
		}
		if build.max_depth == 0 {
			anyhow::bail!("build.max_depth must be at least 1");
		}

		let streaming = &self.streaming;
		if streaming.node_budget == 0 {
			anyhow::bail!("streaming.node_budget must be at least 1 (the root)");
		}
		if streaming.render_ops_per_frame == 0 {
			anyhow::bail!("streaming.render_ops_per_frame must be at least 1");
		}
		if let Some(ratio) = streaming.dense_visibility_ratio {
			if !(0.0..=1.0).contains(&ratio) {
				anyhow::bail!("streaming.dense_visibility_ratio must be within [0, 1], got {ratio}");
			}
		}
		Ok(())
	}
}

/// Read a JSON object of class id to label, e.g. `{"2": "ground"}`.
pub fn load_labels(path: &Path) -> Result<ClassLabels> {
	let content = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read labels file: {}", path.display()))?;
	serde_json::from_str(&content)
		.with_context(|| format!("Failed to parse labels JSON: {}", path.display()))
}
