use glam::IVec3;

use super::*;

fn b(min: [i32; 3], max: [i32; 3]) -> IntBox {
	IntBox::new(IVec3::from_array(min), IVec3::from_array(max))
}

#[test]
fn test_size_and_empty() {
	let a = b([0, 0, 0], [4, 2, 1]);
	assert_eq!(a.size(), IVec3::new(4, 2, 1));
	assert!(!a.is_empty());
	assert!(b([1, 1, 1], [1, 5, 5]).is_empty());
	assert!(IntBox::default().is_empty());
}

#[test]
fn test_is_inside_excludes_max() {
	let a = b([0, 0, 0], [16, 16, 16]);
	assert!(a.is_inside(IVec3::ZERO));
	assert!(a.is_inside(IVec3::splat(15)));
	assert!(!a.is_inside(IVec3::new(16, 0, 0)));
	assert!(!a.is_inside(IVec3::new(0, -1, 0)));
}

#[test]
fn test_intersects_touching_faces_do_not_intersect() {
	let a = b([0, 0, 0], [16, 16, 16]);
	let c = b([16, 0, 0], [32, 16, 16]);
	assert!(!a.intersects(&c));
	assert!(!c.intersects(&a));
	let d = b([15, 15, 15], [17, 17, 17]);
	assert!(a.intersects(&d));
}

#[test]
fn test_overlap_empty_iff_disjoint() {
	let boxes = [
		b([0, 0, 0], [16, 16, 16]),
		b([8, -4, 3], [20, 4, 9]),
		b([16, 0, 0], [32, 16, 16]),
		b([-10, -10, -10], [-1, -1, -1]),
		b([-3, 2, 2], [1, 3, 3]),
	];
	for a in &boxes {
		for c in &boxes {
			assert_eq!(
				a.overlap(c).is_empty(),
				!a.intersects(c),
				"overlap/intersects disagree for {a:?} and {c:?}"
			);
		}
	}
}

#[test]
fn test_overlap_values() {
	let a = b([0, 0, 0], [16, 16, 16]);
	let c = b([8, -4, 3], [20, 4, 9]);
	assert_eq!(a.overlap(&c), b([8, 0, 3], [16, 4, 9]));
	assert_eq!(a.overlap(&b([40, 40, 40], [41, 41, 41])), IntBox::default());
}

#[test]
fn test_translate_roundtrip() {
	let a = b([-7, 3, 12], [1, 9, 40]);
	let p = IVec3::new(100, -250, 3);
	assert_eq!(a.translate(p).translate(-p), a);
	assert_eq!(a.translate(p).size(), a.size());
}

#[test]
fn test_contains_is_strict_on_max() {
	let a = b([0, 0, 0], [16, 16, 16]);
	assert!(!a.contains(&a), "containment is not reflexive");
	assert!(a.covers(&a));
	let inner = b([0, 0, 0], [15, 15, 15]);
	assert!(a.contains(&inner));
	assert_eq!(a.overlap(&inner), inner);
	let touching = b([0, 0, 0], [16, 8, 8]);
	assert!(!a.contains(&touching));
	assert!(a.covers(&touching));
}

#[test]
fn test_squared_distance() {
	let a = b([0, 0, 0], [10, 10, 10]);
	assert_eq!(a.squared_distance_to_point(IVec3::new(5, 5, 5)), 0);
	assert_eq!(a.squared_distance_to_point(IVec3::new(-3, 5, 5)), 9);
	assert_eq!(a.squared_distance_to_point(IVec3::new(10, 5, 5)), 0);
	assert_eq!(a.squared_distance_to_point(IVec3::new(12, 14, 5)), 4 + 16);
}

#[test]
fn test_squared_distance_does_not_overflow() {
	let a = IntBox::from_point(IVec3::ZERO);
	let far = IVec3::splat(INFINITE_EXTENT);
	let d = a.squared_distance_to_point(far);
	assert!(d > 0);
}

#[test]
fn test_corners_use_inclusive_max() {
	let a = b([0, 0, 0], [4, 5, 6]);
	let corners = a.corners();
	assert_eq!(corners[0], IVec3::new(0, 0, 0));
	assert_eq!(corners[1], IVec3::new(3, 0, 0));
	assert_eq!(corners[2], IVec3::new(0, 4, 0));
	assert_eq!(corners[4], IVec3::new(0, 0, 5));
	assert_eq!(corners[7], IVec3::new(3, 4, 5));
	for c in corners {
		assert!(a.is_inside(c));
	}
}

#[test]
fn test_scale_and_mul() {
	let a = b([-1, 0, 2], [3, 4, 5]);
	assert_eq!(a.scale(2), b([-2, 0, 4], [6, 8, 10]));
	assert_eq!(a * 2, a.scale(2));
	assert_eq!(2 * a, a.scale(2));
}

#[test]
fn test_checked_rejects_inverted_and_out_of_range() {
	assert!(IntBox::checked(IVec3::ONE, IVec3::ZERO).is_none());
	assert!(IntBox::checked(IVec3::splat(i32::MIN), IVec3::ZERO).is_none());
	assert!(IntBox::checked(IVec3::ZERO, IVec3::ONE).is_some());
	let inf = IntBox::infinite();
	assert_eq!(IntBox::checked(inf.min, inf.max), Some(inf));
}

#[test]
fn test_infinite_translation_stays_in_i32() {
	let inf = IntBox::infinite();
	let moved = inf.translate(IVec3::splat(999));
	assert!(moved.max.x > inf.max.x);
	assert!(inf.contains(&b([-5, -5, -5], [5, 5, 5])));
}

#[test]
fn test_around_and_expand() {
	let a = IntBox::around(IVec3::new(5, 5, 5), 2.5);
	assert_eq!(a, b([2, 2, 2], [9, 9, 9]));
	let e = IntBox::from_point(IVec3::ZERO).expand(1);
	assert_eq!(e, b([-1, -1, -1], [2, 2, 2]));
}

#[test]
fn test_around_clips_to_supported_range() {
	let all = IntBox::around(IVec3::ZERO, f32::INFINITY);
	assert_eq!(all, IntBox::infinite());
	let huge = IntBox::around(IVec3::new(100, 0, -100), 1e12);
	assert_eq!(huge, IntBox::infinite());

	let edge = IntBox::around(IVec3::new(INFINITE_EXTENT - 1, 0, i32::MIN), 4.0);
	assert_eq!(edge.min, IVec3::new(INFINITE_EXTENT - 5, -4, -INFINITE_EXTENT));
	assert_eq!(edge.max, IVec3::new(INFINITE_EXTENT, 5, -INFINITE_EXTENT));
	assert!(edge.is_empty());

	assert_eq!(IntBox::around(IVec3::ZERO, f32::NAN), IntBox::from_point(IVec3::ZERO));
}

#[test]
fn test_union_and_iter() {
	let a = b([0, 0, 0], [1, 1, 1]);
	let c = b([2, 0, 0], [3, 2, 1]);
	let u = a.union(&c);
	assert_eq!(u, b([0, 0, 0], [3, 2, 1]));
	let points: Vec<_> = u.iter().collect();
	assert_eq!(points.len(), 6);
	assert_eq!(points[0], IVec3::new(0, 0, 0));
	assert_eq!(points[1], IVec3::new(1, 0, 0));
	assert_eq!(points[3], IVec3::new(0, 1, 0));
}
