//! Bounded recency cache of evicted node payloads.
//!
//! Owned by the loader thread alone. Capacity is small (default 128), so
//! entries live in a `VecDeque` ordered oldest to newest and lookups are a
//! linear scan.

use std::collections::VecDeque;

use crate::error::StreamError;
use crate::octree::SpatialAddress;
use crate::point::NodePoints;

/// One cached payload.
#[derive(Clone, Debug)]
pub struct RecencyCacheEntry {
  pub address: SpatialAddress,
  pub points: NodePoints,
}

/// Least-recently-used store keyed by address.
#[derive(Debug)]
pub struct RecencyCache {
  entries: VecDeque<RecencyCacheEntry>,
  capacity: usize,
}

impl RecencyCache {
  pub fn new(capacity: usize) -> Self {
    Self {
      entries: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains(&self, address: &SpatialAddress) -> bool {
    self.position(address).is_some()
  }

  /// Move `address` to the most-recently-used slot and return its payload.
  ///
  /// Only valid when [`Self::contains`] holds; an absent key is a contract
  /// violation reported as [`StreamError::CachePromotionOnAbsentKey`].
  pub fn promote(&mut self, address: &SpatialAddress) -> Result<NodePoints, StreamError> {
    let entry = self
      .position(address)
      .and_then(|i| self.entries.remove(i))
      .ok_or_else(|| StreamError::CachePromotionOnAbsentKey(address.clone()))?;
    let points = entry.points.clone();
    self.entries.push_back(entry);
    Ok(points)
  }

  /// Insert as most-recently-used, dropping the oldest entry on overflow.
  ///
  /// An existing entry for the same address is replaced.
  pub fn insert(&mut self, entry: RecencyCacheEntry) {
    if self.capacity == 0 {
      return;
    }
    if let Some(i) = self.position(&entry.address) {
      self.entries.remove(i);
    }
    self.entries.push_back(entry);
    while self.entries.len() > self.capacity {
      if let Some(evicted) = self.entries.pop_front() {
        log::trace!("recency cache evicted {}", evicted.address);
      }
    }
  }

  /// Addresses from least to most recently used.
  pub fn addresses(&self) -> impl Iterator<Item = &SpatialAddress> {
    self.entries.iter().map(|e| &e.address)
  }

  fn position(&self, address: &SpatialAddress) -> Option<usize> {
    self.entries.iter().position(|e| e.address == *address)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use glam::Vec3;

  use super::*;
  use crate::point::PointRecord;

  fn addr(s: &str) -> SpatialAddress {
    s.parse().unwrap()
  }

  fn entry(s: &str, x: f32) -> RecencyCacheEntry {
    RecencyCacheEntry {
      address: addr(s),
      points: Arc::from(vec![PointRecord::Xyz { position: Vec3::splat(x) }]),
    }
  }

  fn order(cache: &RecencyCache) -> Vec<String> {
    cache.addresses().map(ToString::to_string).collect()
  }

  #[test]
  fn test_capacity_evicts_oldest() {
    let mut cache = RecencyCache::new(3);
    for (i, s) in ["a", "b", "c", "d"].into_iter().enumerate() {
      cache.insert(entry(s, i as f32));
    }

    assert_eq!(cache.len(), 3);
    assert!(!cache.contains(&addr("a")));
    assert_eq!(order(&cache), ["b", "c", "d"]);
  }

  #[test]
  fn test_promote_returns_payload_and_updates_order() {
    let mut cache = RecencyCache::new(3);
    for (i, s) in ["a", "b", "c", "d"].into_iter().enumerate() {
      cache.insert(entry(s, i as f32));
    }

    for (s, x) in [("b", 1.0), ("c", 2.0), ("d", 3.0)] {
      let points = cache.promote(&addr(s)).unwrap();
      assert_eq!(points[0].position(), Vec3::splat(x));
    }
    assert_eq!(order(&cache), ["b", "c", "d"]);

    cache.promote(&addr("b")).unwrap();
    assert_eq!(order(&cache), ["c", "d", "b"]);
    cache.insert(entry("e", 4.0));
    assert_eq!(order(&cache), ["d", "b", "e"]);
  }

  #[test]
  fn test_promote_absent_key_fails() {
    let mut cache = RecencyCache::new(3);
    cache.insert(entry("a", 0.0));
    let err = cache.promote(&addr("b")).unwrap_err();
    assert!(matches!(err, StreamError::CachePromotionOnAbsentKey(a) if a == addr("b")));
  }

  #[test]
  fn test_reinsert_replaces_entry() {
    let mut cache = RecencyCache::new(3);
    cache.insert(entry("a", 0.0));
    cache.insert(entry("b", 1.0));
    cache.insert(entry("a", 9.0));

    assert_eq!(order(&cache), ["b", "a"]);
    assert_eq!(cache.promote(&addr("a")).unwrap()[0].position(), Vec3::splat(9.0));
  }

  #[test]
  fn test_zero_capacity_holds_nothing() {
    let mut cache = RecencyCache::new(0);
    cache.insert(entry("a", 0.0));
    assert!(cache.is_empty());
  }
}
