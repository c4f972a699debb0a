//! Octree addressing and geometry.
//!
//! The octree is explicit only on disk. In memory a node is identified by its
//! [`SpatialAddress`] and its box is recomputed from the root box by folding
//! one exact bisection per address symbol.
//!
//! # Module Structure
//!
//! - [`address`]: `SpatialAddress`, `Octant`, `ExistenceMask`
//! - [`bounds`]: `BoundingBox`, `OctreeBounds` (address → box, containment)

pub mod address;
pub mod bounds;

// Re-exports
pub use address::{ExistenceMask, Octant, ParseAddressError, SpatialAddress};
pub use bounds::{BoundingBox, OctreeBounds};
