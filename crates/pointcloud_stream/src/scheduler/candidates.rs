//! Per-tick classification of the mirror: load candidates and removals.

use smallvec::SmallVec;

use crate::frustum::{FrustumCuller, Visibility};
use crate::hierarchy::{Deactivation, HierarchyMirror, VisNode};
use crate::octree::{BoundingBox, SpatialAddress};

/// Floor for the near-plane distance in the priority denominator.
pub const MIN_DISTANCE: f64 = 1e-6;

/// Inactive node worth loading this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
  pub address: SpatialAddress,
  pub visibility: Visibility,
  pub priority: f64,
}

/// Outcome of one walk over the mirror.
#[derive(Debug, Default)]
pub struct Evaluation {
  /// Candidates in depth-first discovery order.
  pub candidates: Vec<Candidate>,
  /// Active nodes taken out of the scene during the walk.
  pub removed: Vec<Deactivation>,
}

/// `radius × weight / max(distance from near plane, MIN_DISTANCE)`.
///
/// Boxes whose center is behind the near plane get the floor distance and
/// therefore rank first.
pub fn priority(bounds: &BoundingBox, visibility: Visibility, culler: &FrustumCuller) -> f64 {
  let distance = culler.distance_from_near(bounds.center()).max(MIN_DISTANCE);
  bounds.radius() * visibility.weight() / distance
}

/// Optional dense-visibility gate on expanding a child.
///
/// With no ratio every visible child may expand. Otherwise a child expands
/// when at most `ratio × siblings` of its siblings are fully inside, or the
/// camera is within its radius.
pub fn expansion_allowed(
  ratio: Option<f64>,
  inside: usize,
  siblings: usize,
  distance: f64,
  radius: f64,
) -> bool {
  match ratio {
    None => true,
    Some(r) => inside as f64 <= r * siblings as f64 || distance <= radius,
  }
}

/// Classify every child of `node` and recurse, depth-first.
///
/// - An inactive visible child is a candidate unless all its siblings are
///   fully inside (the parent then stands in for all of them).
/// - An active child that left the frustum is deactivated.
/// - An active child whose siblings are all inside collapses with its branch.
pub fn evaluate(
  node: &mut VisNode,
  culler: &FrustumCuller,
  dense_ratio: Option<f64>,
  out: &mut Evaluation,
) {
  if node.children.is_empty() {
    return;
  }

  let visibility: SmallVec<[Visibility; 8]> = node
    .children
    .iter()
    .map(|child| culler.classify_box(&child.bounds))
    .collect();
  let siblings = node.children.len();
  let inside = visibility.iter().filter(|v| **v == Visibility::Inside).count();
  let all_inside = inside == siblings;

  for (child, vis) in node.children.iter_mut().zip(visibility) {
    if !child.active {
      if vis.is_visible() && !all_inside {
        let distance = culler.distance_from_near(child.bounds.center());
        if expansion_allowed(dense_ratio, inside, siblings, distance, child.bounds.radius()) {
          out.candidates.push(Candidate {
            address: child.address.clone(),
            visibility: vis,
            priority: priority(&child.bounds, vis, culler),
          });
        }
      }
    } else if vis == Visibility::Outside {
      let points = child.deactivate();
      out.removed.push(Deactivation {
        address: child.address.clone(),
        points,
      });
    } else if all_inside {
      out.removed.extend(HierarchyMirror::remove_branch(child));
    }

    evaluate(child, culler, dense_ratio, out);
  }
}

/// Sort candidates by descending priority; ties keep discovery order.
pub fn rank(candidates: &mut [Candidate]) {
  candidates.sort_by(|a, b| b.priority.total_cmp(&a.priority));
}

#[cfg(test)]
mod tests {
  use glam::DVec3;

  use super::*;

  fn candidate(s: &str, priority: f64) -> Candidate {
    Candidate {
      address: s.parse().unwrap(),
      visibility: Visibility::Partial,
      priority,
    }
  }

  #[test]
  fn test_rank_is_stable_descending() {
    let mut list = vec![candidate("a", 1.0), candidate("b", 3.0), candidate("c", 1.0), candidate("d", 3.0)];
    rank(&mut list);
    let order: String = list.iter().map(|c| c.address.to_string()).collect();
    assert_eq!(order, "bdac");
  }

  #[test]
  fn test_priority_formula() {
    let culler = FrustumCuller::from_matrix(&crate::test_utils::camera(
      DVec3::new(0.0, 0.0, 10.0),
      DVec3::ZERO,
      1.0,
      50.0,
    ));
    let bb = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    // radius 1, center 9 units past the near plane
    assert!((priority(&bb, Visibility::Inside, &culler) - 2.0 / 9.0).abs() < 1e-9);
    assert!((priority(&bb, Visibility::Partial, &culler) - 1.0 / 9.0).abs() < 1e-9);
    assert_eq!(priority(&bb, Visibility::Outside, &culler), 0.0);
  }

  #[test]
  fn test_behind_near_plane_ranks_first() {
    let culler = FrustumCuller::from_matrix(&crate::test_utils::camera(
      DVec3::new(0.0, 0.0, 10.0),
      DVec3::ZERO,
      1.0,
      50.0,
    ));
    let around_eye = BoundingBox::new(DVec3::new(-1.0, -1.0, 9.0), DVec3::new(1.0, 1.0, 11.0));
    let ahead = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    assert!(
      priority(&around_eye, Visibility::Partial, &culler) > priority(&ahead, Visibility::Inside, &culler)
    );
  }

  #[test]
  fn test_expansion_gate() {
    assert!(expansion_allowed(None, 8, 8, 100.0, 1.0));
    assert!(expansion_allowed(Some(0.4), 3, 8, 100.0, 1.0));
    assert!(!expansion_allowed(Some(0.4), 4, 8, 100.0, 1.0));
    assert!(expansion_allowed(Some(0.4), 4, 8, 0.5, 1.0));
  }
}
