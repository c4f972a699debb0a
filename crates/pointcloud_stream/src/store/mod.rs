//! NodeStore - binary persistence of octree nodes keyed by address.
//!
//! # Directory Layout
//!
//! ```text
//! <octree>/
//!   cloud.metadata       CloudMetadata (JSON)
//!   classes.metadata     ClassLabels (JSON, class-bearing structures only)
//!   root.node            root node
//!   a.node               node "a"
//!   a/c.node             node "ac"
//!   a/c/h.node           node "ach"
//! ```
//!
//! Every non-root node lives under one sub-directory per address symbol
//! except the last, which names the file.

pub mod codec;
pub mod metadata;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::octree::{ExistenceMask, SpatialAddress};
use crate::point::{PointRecord, PointStructure};

pub use metadata::{ClassLabels, CloudMetadata, CLASSES_METADATA_FILE, CLOUD_METADATA_FILE};

/// Root node file name.
pub const ROOT_NODE_FILE: &str = "root.node";
/// Extension of every node file.
pub const NODE_EXTENSION: &str = "node";

/// One persisted octree node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoredNode {
  /// Which children have their own node file.
  pub existence_mask: ExistenceMask,
  /// Points retained at this node.
  pub points: Vec<PointRecord>,
}

impl StoredNode {
  pub fn new(existence_mask: ExistenceMask, points: Vec<PointRecord>) -> Self {
    Self {
      existence_mask,
      points,
    }
  }
}

/// Reader/writer for the node files of one octree directory.
#[derive(Clone, Debug)]
pub struct NodeStore {
  dir: PathBuf,
  structure: PointStructure,
}

impl NodeStore {
  /// Store rooted at `dir` holding rows of `structure`.
  pub fn new(dir: impl Into<PathBuf>, structure: PointStructure) -> Self {
    Self {
      dir: dir.into(),
      structure,
    }
  }

  /// Open an existing octree directory through its metadata.
  pub fn open(dir: impl Into<PathBuf>) -> Result<(Self, CloudMetadata), StoreError> {
    let dir = dir.into();
    let metadata = CloudMetadata::load(&dir)?;
    Ok((Self::new(dir, metadata.structure), metadata))
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn structure(&self) -> PointStructure {
    self.structure
  }

  /// File path for `address`, derived one path segment per symbol.
  pub fn node_path(&self, address: &SpatialAddress) -> PathBuf {
    let Some((last, parents)) = address.octants().split_last() else {
      return self.dir.join(ROOT_NODE_FILE);
    };
    let mut path = self.dir.clone();
    for octant in parents {
      path.push(octant.symbol().to_string());
    }
    path.push(format!("{}.{NODE_EXTENSION}", last.symbol()));
    path
  }

  /// Persist `node` at `address`, creating parent directories as needed.
  pub fn write(&self, address: &SpatialAddress, node: &StoredNode) -> Result<(), StoreError> {
    let path = self.node_path(address);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    let bytes = codec::encode_node(node.existence_mask, &node.points, self.structure);
    fs::write(&path, bytes).map_err(|source| StoreError::Io { path, source })
  }

  /// Read the node at `address`.
  ///
  /// Fails with [`StoreError::NodeNotFound`] when it has no file.
  pub fn read(&self, address: &SpatialAddress) -> Result<StoredNode, StoreError> {
    let path = self.node_path(address);
    let bytes = fs::read(&path).map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => StoreError::NodeNotFound(address.clone()),
      _ => StoreError::Io { path, source },
    })?;
    let (existence_mask, points) =
      codec::decode_node(&bytes, self.structure).map_err(|reason| StoreError::Corrupt {
        address: address.clone(),
        reason,
      })?;
    Ok(StoredNode::new(existence_mask, points))
  }

  /// Read the root node.
  pub fn read_root(&self) -> Result<StoredNode, StoreError> {
    self.read(&SpatialAddress::root())
  }

  /// Read a node whose absence is expected.
  ///
  /// A missing or unopenable file yields `Ok(None)`; a file that opens but
  /// does not decode is still an error.
  pub fn read_optional(&self, address: &SpatialAddress) -> Result<Option<StoredNode>, StoreError> {
    absent_as_none(self.read(address))
  }

  /// [`NodeStore::read_mask`] with the absence handling of
  /// [`NodeStore::read_optional`].
  pub fn read_mask_optional(
    &self,
    address: &SpatialAddress,
  ) -> Result<Option<ExistenceMask>, StoreError> {
    absent_as_none(self.read_mask(address))
  }

  /// Read only the existence mask of the node at `address`.
  pub fn read_mask(&self, address: &SpatialAddress) -> Result<ExistenceMask, StoreError> {
    let path = self.node_path(address);
    let mut file = File::open(&path).map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => StoreError::NodeNotFound(address.clone()),
      _ => StoreError::Io {
        path: path.clone(),
        source,
      },
    })?;
    let mut mask = [0u8; 1];
    file.read_exact(&mut mask).map_err(|source| match source.kind() {
      io::ErrorKind::UnexpectedEof => StoreError::Corrupt {
        address: address.clone(),
        reason: "empty node file (missing existence mask)".into(),
      },
      _ => StoreError::Io { path, source },
    })?;
    Ok(ExistenceMask::from_bits(mask[0]))
  }

  /// Depth-first walk over every node reachable from the root through
  /// existence masks. Children are visited in octant order.
  pub fn visit(
    &self,
    mut visitor: impl FnMut(&SpatialAddress, &StoredNode),
  ) -> Result<(), StoreError> {
    let mut stack = vec![SpatialAddress::root()];
    while let Some(address) = stack.pop() {
      let node = self.read(&address)?;
      visitor(&address, &node);
      // Reverse push keeps `a` on top of the stack.
      for octant in node.existence_mask.iter().collect::<Vec<_>>().into_iter().rev() {
        stack.push(address.child(octant));
      }
    }
    Ok(())
  }
}

fn absent_as_none<T>(read: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
  match read {
    Ok(value) => Ok(Some(value)),
    Err(StoreError::NodeNotFound(address)) => {
      log::warn!("node {address} has no file");
      Ok(None)
    }
    Err(StoreError::Io { path, source }) => {
      log::warn!("skipping unreadable node file {}: {source}", path.display());
      Ok(None)
    }
    Err(other) => Err(other),
  }
}
