//! View frustum culling.
//!
//! Six clip planes are extracted from the combined projection × view ×
//! model matrix with the Gribb–Hartmann identities, using the rows of the
//! matrix as it multiplies column vectors (`clip = M * world`):
//!
//! | Plane  | Rows             |
//! |--------|------------------|
//! | near   | `row3 + row2`    |
//! | far    | `row3 - row2`    |
//! | bottom | `row3 + row1`    |
//! | top    | `row3 - row1`    |
//! | left   | `row3 + row0`    |
//! | right  | `row3 - row0`    |
//!
//! Planes point inwards, so a point is visible when it lies on the positive
//! side of all six.

use glam::{DMat4, DVec3, DVec4};

use crate::octree::BoundingBox;

/// Plane `normal · p + d = 0` with a unit-length normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
	pub normal: DVec3,
	pub d: f64,
}

impl Plane {
	/// Plane that every point is in front of.
	pub const PASS: Self = Self {
		normal: DVec3::ZERO,
		d: 1.0,
	};

	/// Normalize a raw `(a, b, c, d)` plane; `None` when the normal vanishes.
	pub fn from_coefficients(v: DVec4) -> Option<Self> {
		let normal = v.truncate();
		let length = normal.length();
		if length > 0.0 && length.is_finite() {
			Some(Self {
				normal: normal / length,
				d: v.w / length,
			})
		} else {
			None
		}
	}

	#[inline]
	pub fn signed_distance(&self, p: DVec3) -> f64 {
		self.normal.dot(p) + self.d
	}
}

/// Box classification against the frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
	/// No sample point passes.
	Outside,
	/// Some but not all sample points pass.
	Partial,
	/// All nine sample points pass.
	Inside,
}

impl Visibility {
	/// Priority weight: 2 inside, 1 partial, 0 outside.
	pub fn weight(self) -> f64 {
		match self {
			Self::Outside => 0.0,
			Self::Partial => 1.0,
			Self::Inside => 2.0,
		}
	}

	pub fn is_visible(self) -> bool {
		self != Self::Outside
	}
}

/// Index of each plane in [`FrustumCuller::planes`].
pub mod plane_index {
	pub const NEAR: usize = 0;
	pub const FAR: usize = 1;
	pub const BOTTOM: usize = 2;
	pub const TOP: usize = 3;
	pub const LEFT: usize = 4;
	pub const RIGHT: usize = 5;
}

/// Classifies points and boxes against six clip planes.
#[derive(Clone, Debug, PartialEq)]
pub struct FrustumCuller {
	planes: [Plane; 6],
}

impl Default for FrustumCuller {
	/// A culler that sees everything until the first matrix arrives.
	fn default() -> Self {
		Self {
			planes: [Plane::PASS; 6],
		}
	}
}

impl FrustumCuller {
	pub fn from_matrix(matrix: &DMat4) -> Self {
		let mut culler = Self::default();
		culler.update(matrix);
		culler
	}

	/// Re-extract the planes from `matrix`.
	///
	/// A plane whose normal degenerates to zero keeps its previous value.
	pub fn update(&mut self, matrix: &DMat4) {
		let [r0, r1, r2, r3] = [0, 1, 2, 3].map(|i| matrix.row(i));
		let raw = [r3 + r2, r3 - r2, r3 + r1, r3 - r1, r3 + r0, r3 - r0];
		for (plane, coefficients) in self.planes.iter_mut().zip(raw) {
			if let Some(p) = Plane::from_coefficients(coefficients) {
				*plane = p;
			}
		}
	}

	pub fn planes(&self) -> &[Plane; 6] {
		&self.planes
	}

	/// True when `p` is strictly in front of all six planes.
	#[inline]
	pub fn classify_point(&self, p: DVec3) -> bool {
		self.planes.iter().all(|plane| plane.signed_distance(p) > 0.0)
	}

	/// Classify by the 8 corners plus the centroid of `bb`.
	pub fn classify_box(&self, bb: &BoundingBox) -> Visibility {
		let passing = bb
			.sample_points()
			.iter()
			.filter(|&&p| self.classify_point(p))
			.count();
		match passing {
			0 => Visibility::Outside,
			9 => Visibility::Inside,
			_ => Visibility::Partial,
		}
	}

	/// Signed distance from the near plane; negative behind the camera.
	#[inline]
	pub fn distance_from_near(&self, p: DVec3) -> f64 {
		self.planes[plane_index::NEAR].signed_distance(p)
	}
}

#[cfg(test)]
#[path = "frustum_test.rs"]
mod frustum_test;
