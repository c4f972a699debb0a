//! SpatialAddress - immutable value type locating a node in the octree.
//!
//! An address is a sequence of octant symbols `a..h`, one per depth level.
//! The root is the empty address. A child address is always its parent's
//! address with exactly one symbol appended.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

/// One of the 8 children of an octree node.
///
/// Octant index bits represent +X, +Y, +Z offsets:
/// - bit 0: X half (0 = lower, 1 = upper)
/// - bit 1: Y half
/// - bit 2: Z half
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Octant(u8);

impl Octant {
  /// All octants in symbol order `a..h`.
  pub const ALL: [Octant; 8] = [
    Octant(0),
    Octant(1),
    Octant(2),
    Octant(3),
    Octant(4),
    Octant(5),
    Octant(6),
    Octant(7),
  ];

  /// Create from an index in `0..8`.
  pub fn new(index: u8) -> Option<Self> {
    (index < 8).then_some(Self(index))
  }

  /// Create from a symbol in `a..=h`.
  pub fn from_symbol(symbol: char) -> Option<Self> {
    match symbol {
      'a'..='h' => Some(Self(symbol as u8 - b'a')),
      _ => None,
    }
  }

  /// Octant index in `0..8`.
  #[inline]
  pub fn index(self) -> u8 {
    self.0
  }

  /// Symbol in `a..=h`.
  #[inline]
  pub fn symbol(self) -> char {
    (b'a' + self.0) as char
  }

  /// True when this octant takes the upper half of the X axis.
  #[inline]
  pub fn upper_x(self) -> bool {
    self.0 & 1 != 0
  }

  /// True when this octant takes the upper half of the Y axis.
  #[inline]
  pub fn upper_y(self) -> bool {
    self.0 & 2 != 0
  }

  /// True when this octant takes the upper half of the Z axis.
  #[inline]
  pub fn upper_z(self) -> bool {
    self.0 & 4 != 0
  }

  /// Build an octant from per-axis upper/lower choices.
  #[inline]
  pub fn from_axes(upper_x: bool, upper_y: bool, upper_z: bool) -> Self {
    Self(upper_x as u8 | (upper_y as u8) << 1 | (upper_z as u8) << 2)
  }
}

/// Octree node address - immutable value type.
///
/// Ordering is lexicographic over the octant symbols, so the root sorts
/// first and siblings sort `a..h`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SpatialAddress {
  digits: SmallVec<[Octant; 16]>,
}

impl SpatialAddress {
  /// The root address (empty symbol sequence).
  pub fn root() -> Self {
    Self::default()
  }

  /// True for the root sentinel.
  #[inline]
  pub fn is_root(&self) -> bool {
    self.digits.is_empty()
  }

  /// Tree depth (root = 0).
  #[inline]
  pub fn depth(&self) -> usize {
    self.digits.len()
  }

  /// Octant symbols from the top level down.
  #[inline]
  pub fn octants(&self) -> &[Octant] {
    &self.digits
  }

  /// Get child address (one level deeper).
  pub fn child(&self, octant: Octant) -> Self {
    let mut digits = self.digits.clone();
    digits.push(octant);
    Self { digits }
  }

  /// Get parent address.
  ///
  /// Returns None for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.is_root() {
      return None;
    }
    let mut digits = self.digits.clone();
    digits.pop();
    Some(Self { digits })
  }

  /// Last symbol of the address (the octant within the parent).
  pub fn last(&self) -> Option<Octant> {
    self.digits.last().copied()
  }

  /// True when `self` is `other` or one of its ancestors.
  pub fn is_prefix_of(&self, other: &SpatialAddress) -> bool {
    other.digits.starts_with(&self.digits)
  }
}

impl fmt::Display for SpatialAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      return f.write_str("r");
    }
    for octant in &self.digits {
      write!(f, "{}", octant.symbol())?;
    }
    Ok(())
  }
}

impl fmt::Debug for SpatialAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "SpatialAddress({self})")
  }
}

/// Error parsing an address string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid octree address symbol {symbol:?} in {input:?}")]
pub struct ParseAddressError {
  pub input: String,
  pub symbol: char,
}

impl FromStr for SpatialAddress {
  type Err = ParseAddressError;

  /// Parses `a..h` symbol strings; `""` and `"r"` both yield the root.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == "r" {
      return Ok(Self::root());
    }
    let digits = s
      .chars()
      .map(|symbol| {
        Octant::from_symbol(symbol).ok_or_else(|| ParseAddressError {
          input: s.to_string(),
          symbol,
        })
      })
      .collect::<Result<SmallVec<_>, _>>()?;
    Ok(Self { digits })
  }
}

/// Per-node bitset marking which children have a persisted node file.
///
/// Symbol `a` is the most significant bit, `h` the least significant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExistenceMask(u8);

impl ExistenceMask {
  pub const EMPTY: Self = Self(0);

  #[inline]
  pub fn from_bits(bits: u8) -> Self {
    Self(bits)
  }

  #[inline]
  pub fn bits(self) -> u8 {
    self.0
  }

  #[inline]
  fn bit(octant: Octant) -> u8 {
    1 << (7 - octant.index())
  }

  /// Check if the child at `octant` is persisted.
  #[inline]
  pub fn contains(self, octant: Octant) -> bool {
    self.0 & Self::bit(octant) != 0
  }

  /// Mark the child at `octant` as persisted.
  #[inline]
  pub fn insert(&mut self, octant: Octant) {
    self.0 |= Self::bit(octant);
  }

  #[inline]
  pub fn is_empty(self) -> bool {
    self.0 == 0
  }

  /// Number of persisted children.
  #[inline]
  pub fn count(self) -> u32 {
    self.0.count_ones()
  }

  /// Iterate persisted children in symbol order.
  pub fn iter(self) -> impl Iterator<Item = Octant> {
    Octant::ALL.into_iter().filter(move |o| self.contains(*o))
  }
}

impl fmt::Debug for ExistenceMask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ExistenceMask({:#010b})", self.0)
  }
}

#[cfg(test)]
#[path = "address_test.rs"]
mod address_test;
