//! Point cloud octree tool.
//!
//! - `build`: convert an ASCII point file into an on-disk octree
//! - `inspect`: summarize an octree directory
//! - `replay`: stream an octree (building it first if needed) against a
//!   headless orbiting camera

mod config;
mod headless;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::Config;
use headless::{HeadlessRenderer, OrbitCamera};
use pointcloud_stream::{InputLayout, NodeStore, OctreeBuilder, StreamingSession};

/// Out-of-core point cloud octree builder and streamer.
#[derive(Parser, Debug)]
#[command(name = "pcstream")]
#[command(about = "Builds and streams point cloud octrees")]
struct Args {
	/// Path to configuration TOML file.
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Build an octree from a whitespace separated point file.
	Build {
		/// Input point file.
		input: PathBuf,
		/// Column layout: xyz, xyzrgb, xyzirgb, xyzc, xyzrgbc or xyzirgbc.
		structure: String,
		/// Output directory (default: `<input stem>Octree` next to the input).
		#[arg(short, long)]
		output: Option<PathBuf>,
		/// JSON object of class id to label.
		#[arg(long)]
		labels: Option<PathBuf>,
		/// Sampling seed for reproducible builds.
		#[arg(long)]
		seed: Option<u64>,
		/// Process root buckets on one thread.
		#[arg(long)]
		sequential: bool,
	},
	/// Print metadata and per-depth node statistics.
	Inspect {
		/// Octree directory.
		octree: PathBuf,
	},
	/// Stream an octree for a number of frames and report metrics.
	Replay {
		/// Octree directory, or a point file to build one from.
		input: PathBuf,
		/// Column layout, needed when `input` has not been built yet.
		#[arg(long)]
		structure: Option<String>,
		/// Frames for one full orbit.
		#[arg(long, default_value_t = 600)]
		frames: usize,
		/// Orbit distance in cloud radii.
		#[arg(long, default_value_t = 2.5)]
		zoom: f64,
		/// Frame pacing in milliseconds.
		#[arg(long, default_value_t = 16)]
		frame_ms: u64,
	},
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();
	let config = Config::load_or_default(args.config.as_deref())?;

	match args.command {
		Command::Build {
			input,
			structure,
			output,
			labels,
			seed,
			sequential,
		} => {
			let mut build = config.build;
			if let Some(path) = labels {
				build.class_labels = config::load_labels(&path)?;
			}
			if seed.is_some() {
				build.seed = seed;
			}
			if sequential {
				build.parallel = false;
			}
			run_build(OctreeBuilder::new(build), &input, &structure, output)
		}
		Command::Inspect { octree } => run_inspect(&octree),
		Command::Replay {
			input,
			structure,
			frames,
			zoom,
			frame_ms,
		} => {
			let octree = resolve_octree(&config, &input, structure.as_deref())?;
			run_replay(config, &octree, frames, zoom, Duration::from_millis(frame_ms))
		}
	}
}

fn run_build(
	builder: OctreeBuilder,
	input: &Path,
	structure: &str,
	output: Option<PathBuf>,
) -> Result<()> {
	let layout: InputLayout = structure.parse()?;
	let output = output.unwrap_or_else(|| OctreeBuilder::default_output_dir(input));

	let report = builder
		.build_layout(input, layout, &output)
		.with_context(|| format!("Building octree from {}", input.display()))?;

	println!("Octree written to: {}", report.output_dir.display());
	println!("  points: {}", report.total_points);
	println!("  nodes:  {} (depth {})", report.node_count, report.depth);
	println!("  root:   {} points", report.root_points);
	println!("  time:   {:.2?}", report.elapsed);
	Ok(())
}

fn run_inspect(octree: &Path) -> Result<()> {
	let (store, metadata) = NodeStore::open(octree)
		.with_context(|| format!("Opening octree: {}", octree.display()))?;

	let root = store.read_root()?;
	// depth -> (nodes, points)
	let mut levels: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
	store.visit(|address, node| {
		let level = levels.entry(address.depth()).or_default();
		level.0 += 1;
		level.1 += node.points.len();
	})?;

	let bb = metadata.bounding_box;
	println!("{} ({:?})", metadata.name, metadata.structure);
	println!("  points: {}", metadata.total_point_count);
	println!("  bounds: {:.3?} .. {:.3?}", bb.min.to_array(), bb.max.to_array());
	println!(
		"  root:   {} points, {} children",
		root.points.len(),
		root.existence_mask.iter().count()
	);
	println!("  depth  nodes  points");
	for (depth, (nodes, points)) in &levels {
		println!("  {depth:>5}  {nodes:>5}  {points}");
	}
	let stored: usize = levels.values().map(|(_, points)| points).sum();
	if stored as u64 != metadata.total_point_count {
		log::warn!(
			"nodes hold {stored} points but metadata records {}",
			metadata.total_point_count
		);
	}
	Ok(())
}

/// `input` itself when it is a directory, else its default octree directory,
/// built first when missing.
fn resolve_octree(config: &Config, input: &Path, structure: Option<&str>) -> Result<PathBuf> {
	if input.is_dir() {
		return Ok(input.to_path_buf());
	}
	let octree = OctreeBuilder::default_output_dir(input);
	if !octree.exists() {
		let Some(structure) = structure else {
			anyhow::bail!(
				"{} has not been built yet, pass --structure to build it",
				input.display()
			);
		};
		let builder = OctreeBuilder::new(config.build.clone());
		run_build(builder, input, structure, Some(octree.clone()))?;
	}
	Ok(octree)
}

fn run_replay(config: Config, octree: &Path, frames: usize, zoom: f64, pacing: Duration) -> Result<()> {
	let (session, mut endpoint) = StreamingSession::open(octree, config.streaming)
		.with_context(|| format!("Opening octree: {}", octree.display()))?;
	let orbit = OrbitCamera::around(&session.metadata().bounding_box, zoom, frames);
	let mut renderer = HeadlessRenderer::default();

	for frame in 0..frames {
		if session.is_finished() {
			log::error!("scheduler stopped early at frame {frame}");
			break;
		}
		endpoint.end_frame(orbit.matrix(frame), false, &mut renderer);
		std::thread::sleep(pacing);
	}

	let (shown_nodes, shown) = (renderer.node_count(), renderer.point_count());
	let metrics = session.shutdown()?;
	println!("Replayed {frames} frames");
	println!("  ticks:       {} (avg {:.1} us)", metrics.ticks, metrics.avg_tick_us());
	println!(
		"  loads:       {} delivered, {} cancelled, {} failed",
		metrics.loads_delivered, metrics.loads_cancelled, metrics.loads_failed
	);
	println!("  peak active: {}", metrics.peak_active);
	println!("  cache hits:  {:.1}%", metrics.cache_hit_ratio() * 100.0);
	println!(
		"  renderer:    {} adds, {} removes, {} points in {} nodes shown, peak {}",
		renderer.adds, renderer.removes, shown, shown_nodes, renderer.peak_points
	);
	Ok(())
}
