//! Line-oriented reader for raw point files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::BuildError;
use crate::point::{InputLayout, PointRecord};

/// Stream every point of `path` through `sink`, returning the point count.
///
/// A first line holding a single field is a point-count header and is
/// skipped. Blank lines are ignored. Every other line must carry exactly
/// `layout.field_count()` numeric fields.
pub fn for_each_point(
  path: &Path,
  layout: InputLayout,
  mut sink: impl FnMut(PointRecord) -> Result<(), BuildError>,
) -> Result<u64, BuildError> {
  let reader = BufReader::new(File::open(path)?);
  let parse = layout.parser();
  let expected = layout.field_count();
  let mut count = 0u64;

  for (index, line) in reader.lines().enumerate() {
    let line = line?;
    let line_number = index + 1;
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.is_empty() || (index == 0 && fields.len() == 1) {
      continue;
    }
    if fields.len() != expected {
      return Err(BuildError::MalformedInput {
        line: line_number,
        reason: format!(
          "expected {expected} fields for structure {layout}, found {}",
          fields.len()
        ),
      });
    }
    let point = parse(&fields).map_err(|reason| BuildError::MalformedInput {
      line: line_number,
      reason,
    })?;
    sink(point)?;
    count += 1;
  }
  Ok(count)
}
