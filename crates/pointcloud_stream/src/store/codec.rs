//! Binary node file encoding.
//!
//! ```text
//! ┌──────────┬──────────────────────────────────────────────┐
//! │ mask: u8 │ rows: row_width × f32 (little-endian) × N    │
//! └──────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Row width comes from the cloud's [`PointStructure`]; the row count is
//! implied by the file length. Spill files used during construction are
//! the same rows without the mask byte.

use crate::octree::ExistenceMask;
use crate::point::{PointRecord, PointStructure};

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// Append the stored rows of `points` to `out`.
pub fn encode_rows(points: &[PointRecord], structure: PointStructure, out: &mut Vec<u8>) {
  let mut row = Vec::with_capacity(structure.row_width());
  out.reserve(points.len() * structure.row_width() * F32_SIZE);
  for point in points {
    debug_assert_eq!(point.structure(), structure, "point structure mismatch");
    row.clear();
    point.encode_row(&mut row);
    for value in &row {
      out.extend_from_slice(&value.to_le_bytes());
    }
  }
}

/// Decode a run of stored rows.
///
/// Fails with a reason when `bytes` is not a whole number of rows.
pub fn decode_rows(bytes: &[u8], structure: PointStructure) -> Result<Vec<PointRecord>, String> {
  let row_bytes = structure.row_width() * F32_SIZE;
  if bytes.len() % row_bytes != 0 {
    return Err(format!(
      "{} payload bytes is not a multiple of the {row_bytes}-byte row",
      bytes.len()
    ));
  }
  let mut row = vec![0f32; structure.row_width()];
  let points = bytes
    .chunks_exact(row_bytes)
    .map(|chunk| {
      for (value, raw) in row.iter_mut().zip(chunk.chunks_exact(F32_SIZE)) {
        *value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
      }
      structure.decode_row(&row)
    })
    .collect();
  Ok(points)
}

/// Encode a whole node file.
pub fn encode_node(mask: ExistenceMask, points: &[PointRecord], structure: PointStructure) -> Vec<u8> {
  let mut out = Vec::with_capacity(1 + points.len() * structure.row_width() * F32_SIZE);
  out.push(mask.bits());
  encode_rows(points, structure, &mut out);
  out
}

/// Decode a whole node file into its mask and points.
pub fn decode_node(
  bytes: &[u8],
  structure: PointStructure,
) -> Result<(ExistenceMask, Vec<PointRecord>), String> {
  let (&mask, rows) = bytes
    .split_first()
    .ok_or_else(|| "empty node file (missing existence mask)".to_string())?;
  Ok((ExistenceMask::from_bits(mask), decode_rows(rows, structure)?))
}
