//! Bucketing and sampled retention used while subdividing a node.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::octree::{BoundingBox, SpatialAddress};
use crate::point::PointRecord;

/// Partition `points` by the child octant of `bounds` containing them.
///
/// Index `i` of the result holds the points of `Octant::ALL[i]`.
pub fn bucket_by_octant(points: Vec<PointRecord>, bounds: &BoundingBox) -> [Vec<PointRecord>; 8] {
  let mut buckets: [Vec<PointRecord>; 8] = std::array::from_fn(|_| Vec::new());
  for point in points {
    let octant = bounds.octant_of(point.position_f64());
    buckets[octant.index() as usize].push(point);
  }
  buckets
}

/// Split `points` into `keep` uniformly sampled points and the remainder.
///
/// Sampling is without replacement, so the two halves are disjoint and
/// together hold exactly the input points. `keep` is clamped to the input
/// size.
pub fn sample_split<R: Rng + ?Sized>(
  points: Vec<PointRecord>,
  keep: usize,
  rng: &mut R,
) -> (Vec<PointRecord>, Vec<PointRecord>) {
  let keep = keep.min(points.len());
  if keep == 0 {
    return (Vec::new(), points);
  }
  if keep == points.len() {
    return (points, Vec::new());
  }

  let mut selected = vec![false; points.len()];
  for i in index::sample(rng, points.len(), keep).iter() {
    selected[i] = true;
  }
  let mut retained = Vec::with_capacity(keep);
  let mut rest = Vec::with_capacity(points.len() - keep);
  for (point, keep_it) in points.into_iter().zip(selected) {
    if keep_it {
      retained.push(point);
    } else {
      rest.push(point);
    }
  }
  (retained, rest)
}

/// Deterministic per-node generator derived from the build seed.
pub fn node_rng(seed: u64, address: &SpatialAddress) -> StdRng {
  // FNV-1a over the address digits, depth-terminated.
  let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ seed;
  for octant in address.octants() {
    hash ^= u64::from(octant.index()) + 1;
    hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
  }
  hash ^= address.depth() as u64;
  StdRng::seed_from_u64(hash)
}

/// Number of points a root-level bucket of `size` leaves in the root when
/// it exceeds the root share.
pub fn root_retained(size: usize, fraction: f64) -> usize {
  ((size as f64 * fraction).floor() as usize).min(size)
}
