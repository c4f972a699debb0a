//! Error taxonomy for ingest, storage and streaming.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::octree::SpatialAddress;

/// Node store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// Address has no backing node file.
  #[error("octree node {0} not found")]
  NodeNotFound(SpatialAddress),

  /// Node file exists but its contents do not decode.
  #[error("octree node {address} is corrupt: {reason}")]
  Corrupt {
    address: SpatialAddress,
    reason: String,
  },

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Metadata file missing or malformed.
  #[error("metadata error in {}: {source}", path.display())]
  Metadata {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Octree construction failures. Any of these aborts the whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  #[error(
    "unsupported point structure {0:?}, known structures are: xyz, xyzrgb, xyzirgb, xyzc, xyzrgbc, xyzirgbc"
  )]
  UnsupportedStructure(String),

  /// Field count or number parse mismatch against the declared structure.
  #[error("malformed input on line {line}: {reason}")]
  MalformedInput { line: usize, reason: String },

  #[error("input file contains no points")]
  EmptyInput,

  #[error(transparent)]
  Io(#[from] io::Error),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Streaming runtime failures.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
  /// The renderer never published a camera matrix.
  #[error("camera matrix was not published within {0:?}")]
  InitializationTimeout(Duration),

  /// `RecencyCache::promote` called for an address it does not hold.
  #[error("recency cache promotion on absent key {0}")]
  CachePromotionOnAbsentKey(SpatialAddress),

  #[error(transparent)]
  Store(#[from] StoreError),

  /// The other end of a pipeline queue went away.
  #[error("{0} queue closed")]
  ChannelClosed(&'static str),

  #[error("failed to spawn {name} thread: {source}")]
  Spawn {
    name: &'static str,
    #[source]
    source: io::Error,
  },

  #[error("{0} thread panicked")]
  ActorPanicked(&'static str),
}
