//! Per-octree metadata files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::octree::BoundingBox;
use crate::point::PointStructure;

/// Cloud description file name inside an octree directory.
pub const CLOUD_METADATA_FILE: &str = "cloud.metadata";
/// Class label file name inside an octree directory.
pub const CLASSES_METADATA_FILE: &str = "classes.metadata";

/// Cloud-wide description, written once per octree directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudMetadata {
  /// Source file name the octree was built from.
  pub name: String,
  /// Number of points in the source file (and across all nodes).
  pub total_point_count: u64,
  /// Stored structure (never carries an intensity marker).
  pub structure: PointStructure,
  /// Global bounding box, `[minx, miny, minz, maxx, maxy, maxz]`.
  pub bounding_box: BoundingBox,
}

impl CloudMetadata {
  pub fn load(dir: &Path) -> Result<Self, StoreError> {
    read_json(&dir.join(CLOUD_METADATA_FILE))
  }

  pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
    write_json(&dir.join(CLOUD_METADATA_FILE), self)
  }
}

/// Display labels for class ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabels(pub BTreeMap<u32, String>);

impl ClassLabels {
  pub fn get(&self, class: u32) -> Option<&str> {
    self.0.get(&class).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Load labels; a missing file yields an empty mapping.
  pub fn load(dir: &Path) -> Result<Self, StoreError> {
    let path = dir.join(CLASSES_METADATA_FILE);
    if !path.exists() {
      return Ok(Self::default());
    }
    read_json(&path)
  }

  pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
    write_json(&dir.join(CLASSES_METADATA_FILE), self)
  }
}

impl FromIterator<(u32, String)> for ClassLabels {
  fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
  let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| StoreError::Metadata {
    path: path.to_path_buf(),
    source,
  })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
  let metadata_error = |source| StoreError::Metadata {
    path: PathBuf::from(path),
    source,
  };
  let content = serde_json::to_string_pretty(value).map_err(metadata_error)?;
  fs::write(path, content).map_err(|source| StoreError::Io {
    path: path.to_path_buf(),
    source,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::ScratchDir;

  #[test]
  fn test_cloud_metadata_roundtrip() {
    let dir = ScratchDir::new("metadata_roundtrip");
    let meta = CloudMetadata {
      name: "scan.xyz".into(),
      total_point_count: 42,
      structure: PointStructure::XyzRgb,
      bounding_box: BoundingBox::from_array([0.0, 0.0, 0.0, 1.0, 2.0, 3.0]),
    };
    meta.save(dir.path()).unwrap();
    assert_eq!(CloudMetadata::load(dir.path()).unwrap(), meta);

    let raw = fs::read_to_string(dir.path().join(CLOUD_METADATA_FILE)).unwrap();
    assert!(raw.contains("\"structure\": \"xyzrgb\""), "{raw}");
  }

  #[test]
  fn test_class_labels_use_integer_string_keys() {
    let dir = ScratchDir::new("class_labels");
    let labels: ClassLabels = [(1, "tree".to_string()), (12, "chair".to_string())].into_iter().collect();
    labels.save(dir.path()).unwrap();

    let raw = fs::read_to_string(dir.path().join(CLASSES_METADATA_FILE)).unwrap();
    assert!(raw.contains("\"12\": \"chair\""), "{raw}");
    let loaded = ClassLabels::load(dir.path()).unwrap();
    assert_eq!(loaded.get(12), Some("chair"));
    assert_eq!(loaded.get(2), None);
  }

  #[test]
  fn test_missing_metadata_is_io_error() {
    let dir = ScratchDir::new("metadata_missing");
    assert!(matches!(CloudMetadata::load(dir.path()), Err(StoreError::Io { .. })));
    assert!(ClassLabels::load(dir.path()).unwrap().is_empty());
  }
}
