use std::sync::Arc;

use glam::IVec3;

use super::*;
use crate::voxel_type::{MaterialType, ValueType};

#[test]
fn test_region_index_layout() {
  let region = SampleRegion::new(IVec3::ZERO, 1, IVec3::new(4, 3, 2));
  assert_eq!(region.index(0, 0, 0), 0);
  assert_eq!(region.index(1, 0, 0), 1);
  assert_eq!(region.index(0, 1, 0), 4);
  assert_eq!(region.index(0, 0, 1), 12);
  assert_eq!(region.array_len(), 24);
  assert_eq!(region.sample_count(), 24);
}

#[test]
fn test_region_position_uses_step() {
  let region = SampleRegion::new(IVec3::new(-8, 0, 4), 4, IVec3::splat(3));
  assert_eq!(region.position(2, 1, 0), IVec3::new(0, 4, 4));
  assert_eq!(region.voxel_bounds(), IntBox::new(IVec3::new(-8, 0, 4), IVec3::new(4, 12, 16)));
}

#[test]
fn test_clip_aligns_to_lattice() {
  // samples at x = 0, 3, 6, 9, 12
  let region = SampleRegion::new(IVec3::ZERO, 3, IVec3::new(5, 1, 1));
  let bounds = IntBox::new(IVec3::new(4, 0, 0), IVec3::new(10, 1, 1));
  let sub = region.clip(&bounds).expect("region overlaps bounds");
  assert_eq!(sub.start, IVec3::new(6, 0, 0));
  assert_eq!(sub.size, IVec3::new(2, 1, 1));
  assert_eq!(sub.start_index, IVec3::new(2, 0, 0));
  assert_eq!(sub.index(0, 0, 0), region.index(2, 0, 0));
}

#[test]
fn test_clip_negative_coordinates() {
  let region = SampleRegion::new(IVec3::splat(-10), 2, IVec3::splat(10));
  let bounds = IntBox::new(IVec3::splat(-5), IVec3::splat(0));
  let sub = region.clip(&bounds).unwrap();
  // first sample >= -5 on the lattice -10 + 2i is -4
  assert_eq!(sub.start, IVec3::splat(-4));
  assert_eq!(sub.size, IVec3::splat(2));
}

#[test]
fn test_clip_disjoint_is_none() {
  let region = SampleRegion::new(IVec3::ZERO, 1, IVec3::splat(4));
  let bounds = IntBox::new(IVec3::splat(4), IVec3::splat(8));
  assert!(region.clip(&bounds).is_none());
  // falls between lattice points
  let coarse = SampleRegion::new(IVec3::ZERO, 4, IVec3::splat(2));
  let gap = IntBox::new(IVec3::splat(1), IVec3::splat(4));
  assert!(coarse.clip(&gap).is_none());
}

#[test]
fn test_clip_infinite_bounds_keeps_everything() {
  let region = SampleRegion::new(IVec3::splat(100), 7, IVec3::new(3, 4, 5));
  assert_eq!(region.clip(&IntBox::infinite()), Some(region));
}

#[test]
fn test_constant_generator_fills_only_region() {
  let generator = ConstantGenerator::new(-0.5, Material::from_index(3));
  let mut values = vec![9.0f32; 27];
  let region = SampleRegion::new(IVec3::ZERO, 1, IVec3::ONE)
    .with_start_index(IVec3::ONE)
    .with_array_size(IVec3::splat(3));
  generator.sample_region(Some(&mut values), None, None, &region);
  assert_eq!(values[13], -0.5);
  assert_eq!(values.iter().filter(|v| **v == 9.0).count(), 26);
}

#[test]
fn test_point_getters() {
  let generator = FlatGenerator::new(0.0, Material::from_index(1));
  assert_eq!(generator.value(IVec3::new(5, -10, 5)), -1.0);
  assert_eq!(generator.value(IVec3::new(5, 10, 5)), 1.0);
  assert_eq!(generator.material(IVec3::ZERO), Material::from_index(1));
  let air = generator.voxel_type(IVec3::new(0, 3, 0));
  assert_eq!(air.value_type(), ValueType::IgnoreValue);
  assert_eq!(air.material_type(), MaterialType::IgnoreMaterial);
}

#[test]
fn test_empty_hints() {
  assert!(EmptyGenerator.is_empty(IVec3::ZERO, 1, IVec3::splat(16)));
  assert!(!ConstantGenerator::solid(Material::default()).is_empty(IVec3::ZERO, 1, IVec3::ONE));
  let flat = FlatGenerator::new(0.0, Material::default());
  assert!(flat.is_empty(IVec3::new(0, 2, 0), 1, IVec3::splat(16)));
  assert!(!flat.is_empty(IVec3::new(0, -8, 0), 1, IVec3::splat(16)));
}

fn sphere() -> SphereShapeGenerator {
  SphereShapeGenerator::new(
    Arc::new(EmptyGenerator),
    Arc::new(ConstantGenerator::solid(Material::from_index(2))),
    IVec3::ZERO,
    5.0,
  )
}

#[test]
fn test_sphere_shape_point_values() {
  let generator = sphere();
  assert_eq!(generator.value(IVec3::ZERO), -1.0);
  assert_eq!(generator.value(IVec3::new(4, 0, 0)), -1.0);
  // radius is exclusive
  assert_eq!(generator.value(IVec3::new(5, 0, 0)), 1.0);
  assert_eq!(generator.material(IVec3::ZERO), Material::from_index(2));
}

#[test]
fn test_sphere_shape_region_matches_points() {
  let generator = sphere();
  let region = SampleRegion::new(IVec3::splat(-8), 1, IVec3::splat(16));
  let mut values = vec![0.0; region.array_len()];
  let mut materials = vec![Material::default(); region.array_len()];
  generator.sample_region(Some(&mut values), Some(&mut materials), None, &region);
  region.for_each(|p, index| {
    assert_eq!(values[index], generator.value(p), "value mismatch at {p}");
    assert_eq!(materials[index], generator.material(p));
  });
}

#[test]
fn test_sphere_shape_is_empty() {
  let generator = sphere();
  assert!(generator.is_empty(IVec3::splat(32), 1, IVec3::splat(16)));
  assert!(!generator.is_empty(IVec3::splat(-8), 1, IVec3::splat(16)));
  assert!(!generator.is_empty(IVec3::splat(-1), 1, IVec3::splat(2)));
}
