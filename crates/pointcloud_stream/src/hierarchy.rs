//! HierarchyMirror - in-memory tree of every persisted node.
//!
//! Built once per session from existence masks. Each [`VisNode`] owns its
//! children outright; lookups walk down from the root following address
//! prefixes. The scheduler flips `active` and attaches payloads as loads
//! complete.

use crate::error::StoreError;
use crate::octree::{BoundingBox, ExistenceMask, OctreeBounds, SpatialAddress};
use crate::point::NodePoints;
use crate::store::NodeStore;

/// One node of the mirrored octree.
#[derive(Clone, Debug)]
pub struct VisNode {
  pub address: SpatialAddress,
  pub bounds: BoundingBox,
  /// Persisted children in symbol order.
  pub children: Vec<VisNode>,
  /// Requested for display (payload may still be loading).
  pub active: bool,
  /// Payload handed to the renderer, if delivered.
  pub points: Option<NodePoints>,
}

impl VisNode {
  fn new(address: SpatialAddress, bounds: BoundingBox) -> Self {
    Self {
      address,
      bounds,
      children: Vec::new(),
      active: false,
      points: None,
    }
  }

  pub fn activate(&mut self) {
    self.active = true;
  }

  /// Clear the active flag and hand back any delivered payload.
  pub fn deactivate(&mut self) -> Option<NodePoints> {
    self.active = false;
    self.points.take()
  }

  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  fn for_each<'a>(&'a self, f: &mut impl FnMut(&'a VisNode)) {
    f(self);
    for child in &self.children {
      child.for_each(f);
    }
  }
}

/// A node taken out of the scene.
#[derive(Clone, Debug)]
pub struct Deactivation {
  pub address: SpatialAddress,
  /// Payload that was on screen; `None` when its load had not arrived.
  pub points: Option<NodePoints>,
}

/// Mirror of the persisted octree with per-node activity.
#[derive(Clone, Debug)]
pub struct HierarchyMirror {
  root: VisNode,
  bounds: OctreeBounds,
  len: usize,
}

impl HierarchyMirror {
  /// Walk the existence masks of `store` depth-first.
  ///
  /// Only the mask byte of each node file is read. A child flagged in its
  /// parent's mask without a readable file of its own is skipped with a
  /// warning. The root must exist and a corrupt file anywhere is an error.
  pub fn build(store: &NodeStore, bounds: OctreeBounds) -> Result<Self, StoreError> {
    Self::build_with(bounds, |address| {
      if address.is_root() {
        store.read_mask(address).map(Some)
      } else {
        store.read_mask_optional(address)
      }
    })
  }

  /// Build from a mask source; `Ok(None)` marks an address as absent.
  pub fn build_with<F>(bounds: OctreeBounds, mut mask_of: F) -> Result<Self, StoreError>
  where
    F: FnMut(&SpatialAddress) -> Result<Option<ExistenceMask>, StoreError>,
  {
    let address = SpatialAddress::root();
    let root_mask = mask_of(&address)?.unwrap_or_default();
    let mut root = VisNode::new(address, *bounds.root());
    root.activate();
    let mut len = 1;
    grow(&mut root, root_mask, &mut mask_of, &mut len)?;
    Ok(Self { root, bounds, len })
  }

  pub fn root(&self) -> &VisNode {
    &self.root
  }

  pub fn root_mut(&mut self) -> &mut VisNode {
    &mut self.root
  }

  pub fn bounds(&self) -> &OctreeBounds {
    &self.bounds
  }

  /// Number of mirrored nodes, root included.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn lookup(&self, address: &SpatialAddress) -> Option<&VisNode> {
    let mut node = &self.root;
    while node.address != *address {
      node = node.children.iter().find(|c| c.address.is_prefix_of(address))?;
    }
    Some(node)
  }

  pub fn lookup_mut(&mut self, address: &SpatialAddress) -> Option<&mut VisNode> {
    let mut node = &mut self.root;
    while node.address != *address {
      node = node.children.iter_mut().find(|c| c.address.is_prefix_of(address))?;
    }
    Some(node)
  }

  /// Mark `address` active. Returns false when it is not mirrored.
  pub fn activate(&mut self, address: &SpatialAddress) -> bool {
    match self.lookup_mut(address) {
      Some(node) => {
        node.activate();
        true
      }
      None => false,
    }
  }

  /// Deactivate `address`; `None` when it is absent or already inactive.
  pub fn deactivate(&mut self, address: &SpatialAddress) -> Option<Deactivation> {
    let node = self.lookup_mut(address)?;
    if !node.active {
      return None;
    }
    let points = node.deactivate();
    Some(Deactivation {
      address: address.clone(),
      points,
    })
  }

  /// Deactivate `node` and every active node below it, depth-first.
  ///
  /// Used when a subtree collapses into its ancestor's coarse points.
  pub fn remove_branch(node: &mut VisNode) -> Vec<Deactivation> {
    let mut removed = Vec::new();
    collect_branch(node, &mut removed);
    removed
  }

  pub fn active_count(&self) -> usize {
    let mut count = 0;
    self.root.for_each(&mut |n| count += usize::from(n.active));
    count
  }

  /// Active addresses in depth-first order.
  pub fn active_addresses(&self) -> Vec<SpatialAddress> {
    let mut out = Vec::new();
    self.root.for_each(&mut |n| {
      if n.active {
        out.push(n.address.clone());
      }
    });
    out
  }

  /// Number of nodes whose payload has been delivered.
  pub fn loaded_count(&self) -> usize {
    let mut count = 0;
    self.root.for_each(&mut |n| count += usize::from(n.points.is_some()));
    count
  }
}

fn grow<F>(
  node: &mut VisNode,
  mask: ExistenceMask,
  mask_of: &mut F,
  len: &mut usize,
) -> Result<(), StoreError>
where
  F: FnMut(&SpatialAddress) -> Result<Option<ExistenceMask>, StoreError>,
{
  for octant in mask.iter() {
    let address = node.address.child(octant);
    let Some(child_mask) = mask_of(&address)? else {
      continue;
    };
    let mut child = VisNode::new(address, node.bounds.subdivide(octant));
    *len += 1;
    grow(&mut child, child_mask, mask_of, len)?;
    node.children.push(child);
  }
  Ok(())
}

fn collect_branch(node: &mut VisNode, removed: &mut Vec<Deactivation>) {
  if node.active {
    let points = node.deactivate();
    removed.push(Deactivation {
      address: node.address.clone(),
      points,
    });
  }
  for child in &mut node.children {
    collect_branch(child, removed);
  }
}

#[cfg(test)]
#[path = "hierarchy_test.rs"]
mod hierarchy_test;
