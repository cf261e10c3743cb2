//! Axis-aligned integer box with an exclusive upper bound.
//!
//! All arithmetic assumes both corners lie inside
//! `±INFINITE_EXTENT` (`±(i32::MAX - 1000)`). True 64-bit unbounded worlds are
//! not supported.

use std::ops::Mul;

use glam::IVec3;

use crate::constants::INFINITE_EXTENT;

/// Integer axis-aligned bounding box.
///
/// `min` is inclusive, `max` is exclusive. A box with `max <= min` on any axis
/// is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntBox {
	/// Minimum corner (inclusive).
	pub min: IVec3,
	/// Maximum corner (exclusive).
	pub max: IVec3,
}

impl IntBox {
	/// Create a new box from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that `min <= max` on all axes and that both corners lie in
	/// the supported coordinate range.
	pub fn new(min: IVec3, max: IVec3) -> Self {
		debug_assert!(
			min.cmple(max).all(),
			"IntBox min must be <= max on all axes: {min} {max}"
		);
		debug_assert!(
			in_range(min) && in_range(max),
			"IntBox corners outside the supported range: {min} {max}"
		);
		Self { min, max }
	}

	/// Checked constructor: `None` if the corners are inverted or outside the
	/// supported coordinate range.
	pub fn checked(min: IVec3, max: IVec3) -> Option<Self> {
		if min.cmple(max).all() && in_range(min) && in_range(max) {
			Some(Self { min, max })
		} else {
			None
		}
	}

	/// Box containing the single voxel `p`.
	pub fn from_point(p: IVec3) -> Self {
		Self::new(p, p + IVec3::ONE)
	}

	/// Box of voxels whose distance to `center` may be below `radius`,
	/// clipped to the supported coordinate range.
	pub fn around(center: IVec3, radius: f32) -> Self {
		let extent = INFINITE_EXTENT as i64;
		let r = radius.max(0.0).ceil().min(INFINITE_EXTENT as f32) as i64;
		let clip = |v: i64| v.clamp(-extent, extent) as i32;
		let c = center.to_array();
		Self::new(
			IVec3::from_array(c.map(|c| clip(c as i64 - r))),
			IVec3::from_array(c.map(|c| clip(c as i64 + r + 1))),
		)
	}

	/// The largest supported box.
	pub const fn infinite() -> Self {
		Self {
			min: IVec3::splat(-INFINITE_EXTENT),
			max: IVec3::splat(INFINITE_EXTENT),
		}
	}

	/// Translate the box by `offset`.
	#[inline]
	pub fn translate(&self, offset: IVec3) -> Self {
		Self {
			min: self.min + offset,
			max: self.max + offset,
		}
	}

	/// Size of the box (max - min).
	#[inline]
	pub fn size(&self) -> IVec3 {
		self.max - self.min
	}

	/// True if the box contains no voxel.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.max.cmple(self.min).any()
	}

	/// Check if the voxel `p` is inside this box.
	#[inline]
	pub fn is_inside(&self, p: IVec3) -> bool {
		p.cmpge(self.min).all() && p.cmplt(self.max).all()
	}

	/// Check if this box shares at least one voxel with `other`.
	#[inline]
	pub fn intersects(&self, other: &IntBox) -> bool {
		!(self.min.x >= other.max.x
			|| other.min.x >= self.max.x
			|| self.min.y >= other.max.y
			|| other.min.y >= self.max.y
			|| self.min.z >= other.max.z
			|| other.min.z >= self.max.z)
	}

	/// Strict containment: `min <= other.min` and `max > other.max`.
	///
	/// The max side needs a one voxel margin, so `a.contains(&a)` is false.
	#[inline]
	pub fn contains(&self, other: &IntBox) -> bool {
		self.min.cmple(other.min).all() && self.max.cmpgt(other.max).all()
	}

	/// Non-strict containment: every voxel of `other` is inside this box.
	#[inline]
	pub fn covers(&self, other: &IntBox) -> bool {
		self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
	}

	/// Intersection of the two boxes, or the empty default box if they are
	/// disjoint.
	pub fn overlap(&self, other: &IntBox) -> IntBox {
		if !self.intersects(other) {
			return IntBox::default();
		}
		IntBox {
			min: self.min.max(other.min),
			max: self.max.min(other.max),
		}
	}

	/// Smallest box containing both boxes.
	pub fn union(&self, other: &IntBox) -> IntBox {
		IntBox {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
		}
	}

	/// Grow the box by `amount` voxels on every face.
	pub fn expand(&self, amount: i32) -> IntBox {
		IntBox::new(self.min - IVec3::splat(amount), self.max + IVec3::splat(amount))
	}

	/// Squared distance from the box to `p` (0 if inside).
	///
	/// Computed in i64 so far points cannot overflow.
	pub fn squared_distance_to_point(&self, p: IVec3) -> i64 {
		let mut dist = 0i64;
		for axis in 0..3 {
			let v = p[axis] as i64;
			let lo = self.min[axis] as i64;
			let hi = self.max[axis] as i64;
			if v < lo {
				dist += (v - lo) * (v - lo);
			} else if v > hi {
				dist += (v - hi) * (v - hi);
			}
		}
		dist
	}

	/// The 8 corner voxels inside the box (max faces offset by -1).
	///
	/// Corner order: bit 0 = X, bit 1 = Y, bit 2 = Z.
	pub fn corners(&self) -> [IVec3; 8] {
		let lo = self.min;
		let hi = self.max - IVec3::ONE;
		std::array::from_fn(|i| {
			IVec3::new(
				if i & 1 == 0 { lo.x } else { hi.x },
				if i & 2 == 0 { lo.y } else { hi.y },
				if i & 4 == 0 { lo.z } else { hi.z },
			)
		})
	}

	/// Scale both corners by `scale`.
	#[inline]
	pub fn scale(&self, scale: i32) -> IntBox {
		IntBox {
			min: self.min * scale,
			max: self.max * scale,
		}
	}

	/// Iterate every voxel of the box, X fastest.
	pub fn iter(&self) -> impl Iterator<Item = IVec3> {
		let b = *self;
		(b.min.z..b.max.z).flat_map(move |z| {
			(b.min.y..b.max.y).flat_map(move |y| (b.min.x..b.max.x).map(move |x| IVec3::new(x, y, z)))
		})
	}
}

impl Mul<i32> for IntBox {
	type Output = IntBox;

	fn mul(self, scale: i32) -> IntBox {
		self.scale(scale)
	}
}

impl Mul<IntBox> for i32 {
	type Output = IntBox;

	fn mul(self, b: IntBox) -> IntBox {
		b.scale(self)
	}
}

#[inline]
fn in_range(p: IVec3) -> bool {
	p.abs().cmple(IVec3::splat(INFINITE_EXTENT)).all()
}

#[cfg(test)]
#[path = "int_box_test.rs"]
mod int_box_test;
