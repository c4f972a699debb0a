//! Axis-aligned bounding boxes with double precision and exact octant
//! subdivision.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::address::{Octant, SpatialAddress};

/// Double-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
	/// Minimum corner.
	pub min: DVec3,
	/// Maximum corner.
	pub max: DVec3,
}

impl BoundingBox {
	/// Create a new box from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"box min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create from the six scalars `[minx, miny, minz, maxx, maxy, maxz]`.
	pub fn from_array(v: [f64; 6]) -> Self {
		Self::new(DVec3::new(v[0], v[1], v[2]), DVec3::new(v[3], v[4], v[5]))
	}

	/// The six scalars `[minx, miny, minz, maxx, maxy, maxz]`.
	pub fn to_array(&self) -> [f64; 6] {
		[self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z]
	}

	/// Degenerate box at a single point, ready to grow with [`Self::encapsulate`].
	pub fn at_point(p: DVec3) -> Self {
		Self { min: p, max: p }
	}

	/// Grow the box to include `p`.
	#[inline]
	pub fn encapsulate(&mut self, p: DVec3) {
		self.min = self.min.min(p);
		self.max = self.max.max(p);
	}

	/// Get the size of the box (max - min).
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	/// Get the center of the box (arithmetic mean per axis).
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Mean extent over the three axes, halved.
	#[inline]
	pub fn radius(&self) -> f64 {
		let size = self.size();
		(size.x + size.y + size.z) / 3.0 / 2.0
	}

	/// The 8 corners followed by the centroid.
	pub fn sample_points(&self) -> [DVec3; 9] {
		let (lo, hi) = (self.min, self.max);
		[
			DVec3::new(lo.x, lo.y, lo.z),
			DVec3::new(hi.x, lo.y, lo.z),
			DVec3::new(lo.x, hi.y, lo.z),
			DVec3::new(lo.x, lo.y, hi.z),
			DVec3::new(hi.x, hi.y, lo.z),
			DVec3::new(lo.x, hi.y, hi.z),
			DVec3::new(hi.x, lo.y, hi.z),
			DVec3::new(hi.x, hi.y, hi.z),
			self.center(),
		]
	}

	/// Box of the child at `octant`: each axis is halved at its midpoint.
	///
	/// The 8 children share their inner faces exactly and their union is
	/// this box.
	pub fn subdivide(&self, octant: Octant) -> Self {
		let mid = self.center();
		let pick = |upper: bool, lo: f64, m: f64, hi: f64| if upper { (m, hi) } else { (lo, m) };
		let (min_x, max_x) = pick(octant.upper_x(), self.min.x, mid.x, self.max.x);
		let (min_y, max_y) = pick(octant.upper_y(), self.min.y, mid.y, self.max.y);
		let (min_z, max_z) = pick(octant.upper_z(), self.min.z, mid.z, self.max.z);
		Self {
			min: DVec3::new(min_x, min_y, min_z),
			max: DVec3::new(max_x, max_y, max_z),
		}
	}

	/// Octant of this box that owns `p`: upper half on an axis iff
	/// `coord >= mid`.
	#[inline]
	pub fn octant_of(&self, p: DVec3) -> Octant {
		let mid = self.center();
		Octant::from_axes(p.x >= mid.x, p.y >= mid.y, p.z >= mid.z)
	}
}

impl Serialize for BoundingBox {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_array().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for BoundingBox {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let v = <[f64; 6]>::deserialize(deserializer)?;
		if v[0] > v[3] || v[1] > v[4] || v[2] > v[5] {
			return Err(serde::de::Error::custom("bounding box min exceeds max"));
		}
		Ok(Self::from_array(v))
	}
}

/// Root box of an octree plus address-to-box mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctreeBounds {
	root: BoundingBox,
}

impl OctreeBounds {
	pub fn new(root: BoundingBox) -> Self {
		Self { root }
	}

	/// The global box every node is carved from.
	#[inline]
	pub fn root(&self) -> &BoundingBox {
		&self.root
	}

	/// Box of the node at `address`: one [`BoundingBox::subdivide`] per symbol.
	pub fn box_of(&self, address: &SpatialAddress) -> BoundingBox {
		address
			.octants()
			.iter()
			.fold(self.root, |bb, octant| bb.subdivide(*octant))
	}

	/// Closed-open containment per axis; the upper bound is closed where it
	/// coincides with the global upper bound.
	pub fn contains(&self, bb: &BoundingBox, p: DVec3) -> bool {
		let axis = |lo: f64, hi: f64, global_hi: f64, v: f64| {
			if hi == global_hi {
				lo <= v && v <= hi
			} else {
				lo <= v && v < hi
			}
		};
		axis(bb.min.x, bb.max.x, self.root.max.x, p.x)
			&& axis(bb.min.y, bb.max.y, self.root.max.y, p.y)
			&& axis(bb.min.z, bb.max.z, self.root.max.z, p.z)
	}
}
