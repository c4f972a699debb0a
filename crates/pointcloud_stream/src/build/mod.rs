//! OctreeBuilder - converts a flat point file into the node store layout.
//!
//! # Passes
//!
//! ```text
//! input file ──pass 1──► bounding box + point count
//!            ──pass 2──► .spill/a.rows .. .spill/h.rows   (one per root octant)
//!
//! each spill file ──► root share (sampled) + subtree under the root child
//!                      (buckets processed in parallel with rayon)
//! ```
//!
//! # Retention
//!
//! A root-level bucket within `root_capacity / 8` stays whole in the root.
//! A larger one leaves `root_retain_fraction` of its points (sampled) in the
//! root and the rest becomes the child node.
//!
//! Below the root a node holding more than `node_capacity` points is split
//! by octant: buckets within `node_capacity / 8` stay in the node, larger
//! buckets leave exactly `node_capacity / 8` sampled points behind and the
//! remainder recurses into the child. Every point ends up in exactly one
//! node; nodes at `max_depth` are leaves regardless of size.

mod input;
mod split;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use web_time::Instant;

pub use input::for_each_point;
pub use split::{bucket_by_octant, sample_split};

use crate::error::{BuildError, StoreError};
use crate::octree::{BoundingBox, ExistenceMask, Octant, SpatialAddress};
use crate::point::{InputLayout, PointRecord, PointStructure};
use crate::store::{codec, ClassLabels, CloudMetadata, NodeStore, StoredNode};

/// Scratch directory for root buckets, removed after a successful build.
pub const SPILL_DIR: &str = ".spill";

const ROOT_SAMPLE_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

// =============================================================================
// Configuration
// =============================================================================

/// Octree construction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
  /// Maximum points per non-root node.
  pub node_capacity: usize,
  /// Overview capacity of the root; `root_capacity / 8` is the per-bucket share.
  pub root_capacity: usize,
  /// Fraction of an over-share root bucket kept in the root.
  pub root_retain_fraction: f64,
  /// Deepest level; nodes here are leaves even when over capacity.
  pub max_depth: usize,
  /// Sampling seed. `None` draws a fresh one per build.
  pub seed: Option<u64>,
  /// Process root buckets on the rayon pool.
  pub parallel: bool,
  /// Labels written to `classes.metadata` for class-bearing structures.
  #[serde(skip)]
  pub class_labels: ClassLabels,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      node_capacity: 80_000,
      root_capacity: 20_000,
      root_retain_fraction: 0.03,
      max_depth: 16,
      seed: None,
      parallel: true,
      class_labels: ClassLabels::default(),
    }
  }
}

/// Summary of a completed build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildReport {
  pub output_dir: PathBuf,
  pub total_points: u64,
  /// Node files written, root included.
  pub node_count: usize,
  /// Points stored in the root node.
  pub root_points: usize,
  /// Deepest address written.
  pub depth: usize,
  pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, Default)]
struct SubtreeStats {
  nodes: usize,
  depth: usize,
  points: u64,
}

impl SubtreeStats {
  fn merge(&mut self, other: SubtreeStats) {
    self.nodes += other.nodes;
    self.depth = self.depth.max(other.depth);
    self.points += other.points;
  }
}

/// Outcome of one root-level bucket.
struct RootBucket {
  octant: Octant,
  retained: Vec<PointRecord>,
  has_child: bool,
  stats: SubtreeStats,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds an on-disk octree from a raw point file.
#[derive(Clone, Debug, Default)]
pub struct OctreeBuilder {
  config: BuildConfig,
}

impl OctreeBuilder {
  pub fn new(config: BuildConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  /// `<dir>/<stem>Octree` next to `input`.
  pub fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "cloud".to_string());
    input.with_file_name(format!("{stem}Octree"))
  }

  /// Build from a structure tag such as `"xyzrgb"`.
  ///
  /// The tag is resolved before anything touches the filesystem, so an
  /// unknown tag fails with [`BuildError::UnsupportedStructure`] and leaves
  /// no output behind.
  pub fn build(
    &self,
    input: &Path,
    structure_tag: &str,
    output: &Path,
  ) -> Result<BuildReport, BuildError> {
    let layout: InputLayout = structure_tag.parse()?;
    self.build_layout(input, layout, output)
  }

  /// Build from an already resolved layout.
  ///
  /// `output` must not exist yet. On failure it is left as is; removing a
  /// partial directory is up to the caller.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "build::octree"))]
  pub fn build_layout(
    &self,
    input: &Path,
    layout: InputLayout,
    output: &Path,
  ) -> Result<BuildReport, BuildError> {
    let started = Instant::now();
    let structure = layout.storage();
    log::info!(
      "building octree for {} ({layout}) into {}",
      input.display(),
      output.display()
    );

    let (bounds, total_points) = {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("scan").entered();
      scan(input, layout)?
    };
    log::debug!(
      "pass 1: {total_points} points, bounds {:?} in {:?}",
      bounds.to_array(),
      started.elapsed()
    );

    fs::create_dir(output)?;
    let store = NodeStore::new(output, structure);
    let spill_dir = output.join(SPILL_DIR);

    let spilled = {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("spill").entered();
      spill(input, layout, &bounds, &spill_dir)?
    };
    log::debug!("pass 2: spilled {} root buckets in {:?}", spilled.len(), started.elapsed());

    let seed = self.config.seed.unwrap_or_else(rand::random);
    let buckets = {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("subdivide").entered();
      let process =
        |&(octant, ref path): &(Octant, PathBuf)| self.process_root_bucket(&store, &bounds, octant, path, seed);
      if self.config.parallel {
        spilled.par_iter().map(process).collect::<Result<Vec<_>, _>>()?
      } else {
        spilled.iter().map(process).collect::<Result<Vec<_>, _>>()?
      }
    };

    let mut mask = ExistenceMask::EMPTY;
    let mut root_points = Vec::new();
    let mut stats = SubtreeStats::default();
    for bucket in buckets {
      if bucket.has_child {
        mask.insert(bucket.octant);
      }
      root_points.extend(bucket.retained);
      stats.merge(bucket.stats);
    }
    let root = StoredNode::new(mask, root_points);
    store.write(&SpatialAddress::root(), &root)?;
    stats.merge(SubtreeStats {
      nodes: 1,
      depth: 0,
      points: root.points.len() as u64,
    });
    debug_assert_eq!(stats.points, total_points, "point conservation violated");

    fs::remove_dir_all(&spill_dir)?;

    let metadata = CloudMetadata {
      name: input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default(),
      total_point_count: total_points,
      structure,
      bounding_box: bounds,
    };
    metadata.save(output)?;
    if structure.has_classes() {
      self.config.class_labels.save(output)?;
    }

    let report = BuildReport {
      output_dir: output.to_path_buf(),
      total_points,
      node_count: stats.nodes,
      root_points: root.points.len(),
      depth: stats.depth,
      elapsed: started.elapsed(),
    };
    log::info!(
      "octree ready: {} points in {} nodes (depth {}) after {:?}",
      report.total_points,
      report.node_count,
      report.depth,
      report.elapsed
    );
    Ok(report)
  }

  /// Root share plus subtree for one spilled root bucket.
  fn process_root_bucket(
    &self,
    store: &NodeStore,
    bounds: &BoundingBox,
    octant: Octant,
    spill_path: &Path,
    seed: u64,
  ) -> Result<RootBucket, BuildError> {
    let child = SpatialAddress::root().child(octant);
    let points = read_spill(spill_path, store.structure(), &child)?;

    let root_share = self.config.root_capacity / 8;
    if points.len() <= root_share || self.config.max_depth == 0 {
      return Ok(RootBucket {
        octant,
        retained: points,
        has_child: false,
        stats: SubtreeStats::default(),
      });
    }

    let keep = split::root_retained(points.len(), self.config.root_retain_fraction);
    let mut rng = split::node_rng(seed ^ ROOT_SAMPLE_SALT, &child);
    let (retained, rest) = sample_split(points, keep, &mut rng);
    let stats = if rest.is_empty() {
      SubtreeStats::default()
    } else {
      self.write_subtree(store, &child, &bounds.subdivide(octant), rest, seed)?
    };
    Ok(RootBucket {
      octant,
      has_child: stats.nodes > 0,
      retained,
      stats,
    })
  }

  /// Write the node at `address` and everything pushed below it.
  fn write_subtree(
    &self,
    store: &NodeStore,
    address: &SpatialAddress,
    bounds: &BoundingBox,
    points: Vec<PointRecord>,
    seed: u64,
  ) -> Result<SubtreeStats, BuildError> {
    let depth = address.depth();
    if points.len() <= self.config.node_capacity || depth >= self.config.max_depth {
      let stats = SubtreeStats {
        nodes: 1,
        depth,
        points: points.len() as u64,
      };
      store.write(address, &StoredNode::new(ExistenceMask::EMPTY, points))?;
      return Ok(stats);
    }

    let share = self.config.node_capacity / 8;
    let mut rng = split::node_rng(seed, address);
    let mut mask = ExistenceMask::EMPTY;
    let mut retained = Vec::with_capacity(self.config.node_capacity);
    let mut stats = SubtreeStats::default();

    let buckets = bucket_by_octant(points, bounds);
    for (octant, bucket) in Octant::ALL.into_iter().zip(buckets) {
      if bucket.is_empty() {
        continue;
      }
      if bucket.len() <= share {
        retained.extend(bucket);
        continue;
      }
      let (keep, rest) = sample_split(bucket, share, &mut rng);
      retained.extend(keep);
      mask.insert(octant);
      stats.merge(self.write_subtree(store, &address.child(octant), &bounds.subdivide(octant), rest, seed)?);
    }

    stats.merge(SubtreeStats {
      nodes: 1,
      depth,
      points: retained.len() as u64,
    });
    store.write(address, &StoredNode::new(mask, retained))?;
    Ok(stats)
  }
}

// =============================================================================
// Passes
// =============================================================================

/// Pass 1: global bounds and point count.
fn scan(input: &Path, layout: InputLayout) -> Result<(BoundingBox, u64), BuildError> {
  let mut bounds: Option<BoundingBox> = None;
  let count = for_each_point(input, layout, |point| {
    let p = point.position_f64();
    bounds.get_or_insert_with(|| BoundingBox::at_point(p)).encapsulate(p);
    Ok(())
  })?;
  let bounds = bounds.ok_or(BuildError::EmptyInput)?;
  Ok((bounds, count))
}

/// Pass 2: stream every point into the spill file of its root octant.
///
/// Returns the occupied octants with their spill paths, in symbol order.
fn spill(
  input: &Path,
  layout: InputLayout,
  bounds: &BoundingBox,
  spill_dir: &Path,
) -> Result<Vec<(Octant, PathBuf)>, BuildError> {
  fs::create_dir_all(spill_dir)?;
  let structure = layout.storage();
  let mut writers: [Option<BufWriter<File>>; 8] = Default::default();
  let mut row = Vec::new();

  for_each_point(input, layout, |point| {
    let octant = bounds.octant_of(point.position_f64());
    let slot = &mut writers[octant.index() as usize];
    if slot.is_none() {
      *slot = Some(BufWriter::new(File::create(spill_path(spill_dir, octant))?));
    }
    row.clear();
    codec::encode_rows(std::slice::from_ref(&point), structure, &mut row);
    if let Some(writer) = slot.as_mut() {
      writer.write_all(&row)?;
    }
    Ok(())
  })?;

  let mut spilled = Vec::new();
  for (octant, writer) in Octant::ALL.into_iter().zip(writers) {
    if let Some(mut writer) = writer {
      writer.flush()?;
      spilled.push((octant, spill_path(spill_dir, octant)));
    }
  }
  Ok(spilled)
}

fn spill_path(spill_dir: &Path, octant: Octant) -> PathBuf {
  spill_dir.join(format!("{}.rows", octant.symbol()))
}

fn read_spill(
  path: &Path,
  structure: PointStructure,
  address: &SpatialAddress,
) -> Result<Vec<PointRecord>, BuildError> {
  let bytes = fs::read(path).map_err(|source| StoreError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let points = codec::decode_rows(&bytes, structure).map_err(|reason| StoreError::Corrupt {
    address: address.clone(),
    reason,
  })?;
  Ok(points)
}
