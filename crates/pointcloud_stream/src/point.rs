//! Point record types and per-structure parsing.
//!
//! Ingest accepts six column layouts; storage knows four structures because
//! intensity is dropped on the way in.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Shared, immutable point payload of one octree node.
pub type NodePoints = Arc<[PointRecord]>;

/// Column layout of a raw point file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputLayout {
  Xyz,
  XyzRgb,
  XyzIRgb,
  XyzC,
  XyzRgbC,
  XyzIRgbC,
}

impl InputLayout {
  /// Every accepted layout, in tag order.
  pub const ALL: [InputLayout; 6] = [
    Self::Xyz,
    Self::XyzRgb,
    Self::XyzIRgb,
    Self::XyzC,
    Self::XyzRgbC,
    Self::XyzIRgbC,
  ];

  /// Structure code as written on the command line.
  pub fn tag(self) -> &'static str {
    match self {
      Self::Xyz => "xyz",
      Self::XyzRgb => "xyzrgb",
      Self::XyzIRgb => "xyzirgb",
      Self::XyzC => "xyzc",
      Self::XyzRgbC => "xyzrgbc",
      Self::XyzIRgbC => "xyzirgbc",
    }
  }

  /// Structure persisted for this layout (intensity stripped).
  pub fn storage(self) -> PointStructure {
    match self {
      Self::Xyz => PointStructure::Xyz,
      Self::XyzRgb | Self::XyzIRgb => PointStructure::XyzRgb,
      Self::XyzC => PointStructure::XyzClass,
      Self::XyzRgbC | Self::XyzIRgbC => PointStructure::XyzRgbClass,
    }
  }

  /// Number of whitespace-separated fields per line.
  pub fn field_count(self) -> usize {
    match self {
      Self::Xyz => 3,
      Self::XyzRgb => 6,
      Self::XyzIRgb => 7,
      Self::XyzC => 4,
      Self::XyzRgbC => 7,
      Self::XyzIRgbC => 8,
    }
  }

  /// Line parser for this layout, selected once per build.
  pub fn parser(self) -> LineParser {
    match self {
      Self::Xyz => parse_xyz,
      Self::XyzRgb => parse_xyzrgb,
      Self::XyzIRgb => parse_xyzirgb,
      Self::XyzC => parse_xyzc,
      Self::XyzRgbC => parse_xyzrgbc,
      Self::XyzIRgbC => parse_xyzirgbc,
    }
  }
}

impl FromStr for InputLayout {
  type Err = BuildError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|layout| layout.tag() == s)
      .ok_or_else(|| BuildError::UnsupportedStructure(s.to_string()))
  }
}

impl fmt::Display for InputLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

/// Persisted per-point structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointStructure {
  #[serde(rename = "xyz")]
  Xyz,
  #[serde(rename = "xyzrgb")]
  XyzRgb,
  #[serde(rename = "xyzc")]
  XyzClass,
  #[serde(rename = "xyzrgbc")]
  XyzRgbClass,
}

impl PointStructure {
  /// Number of `f32` values per stored row.
  pub fn row_width(self) -> usize {
    match self {
      Self::Xyz => 3,
      Self::XyzRgb => 6,
      Self::XyzClass => 4,
      Self::XyzRgbClass => 7,
    }
  }

  /// True for structures carrying a class id (and therefore class labels).
  pub fn has_classes(self) -> bool {
    matches!(self, Self::XyzClass | Self::XyzRgbClass)
  }

  /// Decode one stored row. `row.len()` must equal [`Self::row_width`].
  pub fn decode_row(self, row: &[f32]) -> PointRecord {
    debug_assert_eq!(row.len(), self.row_width());
    let position = Vec3::new(row[0], row[1], row[2]);
    match self {
      Self::Xyz => PointRecord::Xyz { position },
      Self::XyzRgb => PointRecord::XyzRgb {
        position,
        color: Vec3::new(row[3], row[4], row[5]),
      },
      Self::XyzClass => PointRecord::XyzClass {
        position,
        class: row[3] as u32,
      },
      Self::XyzRgbClass => PointRecord::XyzRgbClass {
        position,
        color: Vec3::new(row[3], row[4], row[5]),
        class: row[6] as u32,
      },
    }
  }
}

/// One point as stored in a node.
///
/// Colors are normalized to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointRecord {
  Xyz { position: Vec3 },
  XyzRgb { position: Vec3, color: Vec3 },
  XyzClass { position: Vec3, class: u32 },
  XyzRgbClass { position: Vec3, color: Vec3, class: u32 },
}

impl PointRecord {
  #[inline]
  pub fn position(&self) -> Vec3 {
    match *self {
      Self::Xyz { position }
      | Self::XyzRgb { position, .. }
      | Self::XyzClass { position, .. }
      | Self::XyzRgbClass { position, .. } => position,
    }
  }

  /// Position widened to double precision for box tests.
  #[inline]
  pub fn position_f64(&self) -> DVec3 {
    self.position().as_dvec3()
  }

  pub fn color(&self) -> Option<Vec3> {
    match *self {
      Self::XyzRgb { color, .. } | Self::XyzRgbClass { color, .. } => Some(color),
      _ => None,
    }
  }

  pub fn class(&self) -> Option<u32> {
    match *self {
      Self::XyzClass { class, .. } | Self::XyzRgbClass { class, .. } => Some(class),
      _ => None,
    }
  }

  pub fn structure(&self) -> PointStructure {
    match self {
      Self::Xyz { .. } => PointStructure::Xyz,
      Self::XyzRgb { .. } => PointStructure::XyzRgb,
      Self::XyzClass { .. } => PointStructure::XyzClass,
      Self::XyzRgbClass { .. } => PointStructure::XyzRgbClass,
    }
  }

  /// Append this point's stored row to `out`.
  pub fn encode_row(&self, out: &mut Vec<f32>) {
    let p = self.position();
    out.extend_from_slice(&[p.x, p.y, p.z]);
    if let Some(c) = self.color() {
      out.extend_from_slice(&[c.x, c.y, c.z]);
    }
    if let Some(class) = self.class() {
      out.push(class as f32);
    }
  }
}

/// Parses the fields of one line. Field count is checked by the caller.
pub type LineParser = fn(&[&str]) -> Result<PointRecord, String>;

fn float(fields: &[&str], i: usize) -> Result<f32, String> {
  let value: f32 = fields[i]
    .parse()
    .map_err(|_| format!("field {} ({:?}) is not a number", i + 1, fields[i]))?;
  if !value.is_finite() {
    return Err(format!("field {} ({:?}) is not finite", i + 1, fields[i]));
  }
  Ok(value)
}

fn position(fields: &[&str]) -> Result<Vec3, String> {
  Ok(Vec3::new(float(fields, 0)?, float(fields, 1)?, float(fields, 2)?))
}

fn color(fields: &[&str], first: usize) -> Result<Vec3, String> {
  Ok(Vec3::new(
    float(fields, first)? / 255.0,
    float(fields, first + 1)? / 255.0,
    float(fields, first + 2)? / 255.0,
  ))
}

fn class(fields: &[&str], i: usize) -> Result<u32, String> {
  let value = float(fields, i)?;
  if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f32 {
    return Err(format!("field {} ({:?}) is not a class id", i + 1, fields[i]));
  }
  Ok(value as u32)
}

fn parse_xyz(fields: &[&str]) -> Result<PointRecord, String> {
  Ok(PointRecord::Xyz {
    position: position(fields)?,
  })
}

fn parse_xyzrgb(fields: &[&str]) -> Result<PointRecord, String> {
  Ok(PointRecord::XyzRgb {
    position: position(fields)?,
    color: color(fields, 3)?,
  })
}

fn parse_xyzirgb(fields: &[&str]) -> Result<PointRecord, String> {
  float(fields, 3)?;
  Ok(PointRecord::XyzRgb {
    position: position(fields)?,
    color: color(fields, 4)?,
  })
}

fn parse_xyzc(fields: &[&str]) -> Result<PointRecord, String> {
  Ok(PointRecord::XyzClass {
    position: position(fields)?,
    class: class(fields, 3)?,
  })
}

fn parse_xyzrgbc(fields: &[&str]) -> Result<PointRecord, String> {
  Ok(PointRecord::XyzRgbClass {
    position: position(fields)?,
    color: color(fields, 3)?,
    class: class(fields, 6)?,
  })
}

fn parse_xyzirgbc(fields: &[&str]) -> Result<PointRecord, String> {
  float(fields, 3)?;
  Ok(PointRecord::XyzRgbClass {
    position: position(fields)?,
    color: color(fields, 4)?,
    class: class(fields, 7)?,
  })
}
