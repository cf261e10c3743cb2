//! World generators: the procedural fallback behind unedited voxels.
//!
//! A generator fills a strided lattice ([`SampleRegion`]) of an output array.
//! Any of the three output channels may be omitted. The store only ever calls
//! through the [`WorldGenerator`] trait, so noise, heightmaps and compiled
//! graphs all plug in the same way.
//!
//! # Array layout
//!
//! ```text
//! sample (i, j, k) → voxel  start + (i, j, k) * step
//!                  → index  (si.x + i) + A.x * (si.y + j) + A.x * A.y * (si.z + k)
//! ```
//!
//! where `si` is `start_index` and `A` is `array_size`.

use std::sync::Arc;

use glam::IVec3;

use crate::voxel_type::IGNORE_VALUE_THRESHOLD;
use crate::{IntBox, Material, VoxelType};

/// Strided lattice of voxels mapped into a dense output array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRegion {
  /// Voxel position of sample (0, 0, 0).
  pub start: IVec3,
  /// Array coordinates of sample (0, 0, 0).
  pub start_index: IVec3,
  /// Voxel distance between adjacent samples (1 = full resolution).
  pub step: i32,
  /// Number of samples per axis.
  pub size: IVec3,
  /// Dimensions of the output array.
  pub array_size: IVec3,
}

impl SampleRegion {
  /// Region filling a dense array of exactly `size` samples.
  pub fn new(start: IVec3, step: i32, size: IVec3) -> Self {
    debug_assert!(step > 0, "step must be positive");
    debug_assert!(size.cmpge(IVec3::ZERO).all());
    Self {
      start,
      start_index: IVec3::ZERO,
      step,
      size,
      array_size: size,
    }
  }

  /// Single-sample region.
  pub fn point(p: IVec3) -> Self {
    Self::new(p, 1, IVec3::ONE)
  }

  pub fn with_start_index(mut self, start_index: IVec3) -> Self {
    self.start_index = start_index;
    self
  }

  pub fn with_array_size(mut self, array_size: IVec3) -> Self {
    self.array_size = array_size;
    self
  }

  /// Number of samples in the region.
  #[inline]
  pub fn sample_count(&self) -> usize {
    (self.size.x.max(0) as usize) * (self.size.y.max(0) as usize) * (self.size.z.max(0) as usize)
  }

  /// Number of elements the output array must hold.
  #[inline]
  pub fn array_len(&self) -> usize {
    (self.array_size.x as usize) * (self.array_size.y as usize) * (self.array_size.z as usize)
  }

  /// Array index of sample `(i, j, k)`.
  #[inline(always)]
  pub fn index(&self, i: i32, j: i32, k: i32) -> usize {
    let a = self.array_size;
    let si = self.start_index;
    ((si.x + i) + a.x * (si.y + j) + a.x * a.y * (si.z + k)) as usize
  }

  /// Voxel position of sample `(i, j, k)`.
  #[inline(always)]
  pub fn position(&self, i: i32, j: i32, k: i32) -> IVec3 {
    self.start + IVec3::new(i, j, k) * self.step
  }

  /// Voxel-space box spanned by the region: `[start, start + size * step)`.
  pub fn voxel_bounds(&self) -> IntBox {
    IntBox::new(self.start, self.start + self.size * self.step)
  }

  /// Sub-region of the samples that fall inside `bounds`, indexing into the
  /// same output array. `None` if no sample does.
  pub fn clip(&self, bounds: &IntBox) -> Option<SampleRegion> {
    let mut lo = IVec3::ZERO;
    let mut hi = IVec3::ZERO;
    for axis in 0..3 {
      let start = self.start[axis] as i64;
      let step = self.step as i64;
      let size = self.size[axis] as i64;
      let i0 = ceil_div(bounds.min[axis] as i64 - start, step).clamp(0, size);
      let i1 = ceil_div(bounds.max[axis] as i64 - start, step).clamp(0, size);
      if i1 <= i0 {
        return None;
      }
      lo[axis] = i0 as i32;
      hi[axis] = i1 as i32;
    }
    Some(SampleRegion {
      start: self.position(lo.x, lo.y, lo.z),
      start_index: self.start_index + lo,
      step: self.step,
      size: hi - lo,
      array_size: self.array_size,
    })
  }

  /// Same lattice, written into its own dense array.
  pub fn compact(&self) -> SampleRegion {
    SampleRegion::new(self.start, self.step, self.size)
  }

  /// Visit every sample as `(voxel position, array index)`, X fastest.
  pub fn for_each(&self, mut f: impl FnMut(IVec3, usize)) {
    for k in 0..self.size.z {
      for j in 0..self.size.y {
        for i in 0..self.size.x {
          f(self.position(i, j, k), self.index(i, j, k));
        }
      }
    }
  }
}

#[inline]
fn ceil_div(a: i64, b: i64) -> i64 {
  let d = a.div_euclid(b);
  if a.rem_euclid(b) != 0 {
    d + 1
  } else {
    d
  }
}

/// Procedural source of values, materials and voxel types.
///
/// Implementations must be deterministic and safe to call from many threads
/// at once.
pub trait WorldGenerator: Send + Sync {
  /// Fill the requested channels over `region`.
  ///
  /// Only the array entries addressed by `region` may be written.
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  );

  /// If true, the region MUST be empty (every value ignorable). If false it
  /// might still be.
  fn is_empty(&self, _start: IVec3, _step: i32, _size: IVec3) -> bool {
    false
  }

  fn value(&self, p: IVec3) -> f32 {
    let mut value = [0.0];
    self.sample_region(Some(&mut value), None, None, &SampleRegion::point(p));
    value[0]
  }

  fn material(&self, p: IVec3) -> Material {
    let mut material = [Material::default()];
    self.sample_region(None, Some(&mut material), None, &SampleRegion::point(p));
    material[0]
  }

  fn voxel_type(&self, p: IVec3) -> VoxelType {
    let mut voxel_type = [VoxelType::default()];
    self.sample_region(None, None, Some(&mut voxel_type), &SampleRegion::point(p));
    voxel_type[0]
  }

  fn value_and_material(&self, p: IVec3) -> (f32, Material) {
    let mut value = [0.0];
    let mut material = [Material::default()];
    self.sample_region(
      Some(&mut value),
      Some(&mut material),
      None,
      &SampleRegion::point(p),
    );
    (value[0], material[0])
  }
}

/// Fill the requested channels by evaluating `f` at every sample.
pub fn fill_region(
  mut values: Option<&mut [f32]>,
  mut materials: Option<&mut [Material]>,
  mut types: Option<&mut [VoxelType]>,
  region: &SampleRegion,
  mut f: impl FnMut(IVec3) -> (f32, Material, VoxelType),
) {
  region.for_each(|p, index| {
    let (value, material, voxel_type) = f(p);
    if let Some(values) = values.as_deref_mut() {
      values[index] = value;
    }
    if let Some(materials) = materials.as_deref_mut() {
      materials[index] = material;
    }
    if let Some(types) = types.as_deref_mut() {
      types[index] = voxel_type;
    }
  });
}

// =============================================================================
// Built-in generators
// =============================================================================

/// Same value and material everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantGenerator {
  pub value: f32,
  pub material: Material,
}

impl ConstantGenerator {
  pub fn new(value: f32, material: Material) -> Self {
    Self { value, material }
  }

  /// Solid everywhere (value -1).
  pub fn solid(material: Material) -> Self {
    Self::new(-1.0, material)
  }
}

impl WorldGenerator for ConstantGenerator {
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  ) {
    let voxel_type = VoxelType::from_value(self.value);
    fill_region(values, materials, types, region, |_| {
      (self.value, self.material, voxel_type)
    });
  }

  fn is_empty(&self, _start: IVec3, _step: i32, _size: IVec3) -> bool {
    self.value > IGNORE_VALUE_THRESHOLD
  }
}

/// Air everywhere (value 1). Always reports empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyGenerator;

impl WorldGenerator for EmptyGenerator {
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  ) {
    let voxel_type = VoxelType::from_value(1.0);
    fill_region(values, materials, types, region, |_| {
      (1.0, Material::default(), voxel_type)
    });
  }

  fn is_empty(&self, _start: IVec3, _step: i32, _size: IVec3) -> bool {
    true
  }
}

/// Horizontal ground plane: solid below `height`, air above.
///
/// Value is `y - height` clamped to `[-1, 1]`.
#[derive(Clone, Copy, Debug)]
pub struct FlatGenerator {
  pub height: f32,
  pub material: Material,
}

impl FlatGenerator {
  pub fn new(height: f32, material: Material) -> Self {
    Self { height, material }
  }

  #[inline]
  fn value_at(&self, y: i32) -> f32 {
    (y as f32 - self.height).clamp(-1.0, 1.0)
  }
}

impl WorldGenerator for FlatGenerator {
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  ) {
    fill_region(values, materials, types, region, |p| {
      let value = self.value_at(p.y);
      (value, self.material, VoxelType::from_value(value))
    });
  }

  fn is_empty(&self, start: IVec3, _step: i32, _size: IVec3) -> bool {
    // lowest sample is start.y
    self.value_at(start.y) > IGNORE_VALUE_THRESHOLD
  }
}

/// Composite generator: `inside` within a sphere, `outside` elsewhere.
///
/// Regions whose 8 corners are all on the same side (and, for the outside
/// case, which miss the sphere's bounding box) are forwarded wholesale to the
/// matching generator.
#[derive(Clone)]
pub struct SphereShapeGenerator {
  outside: Arc<dyn WorldGenerator>,
  inside: Arc<dyn WorldGenerator>,
  center: IVec3,
  radius: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SphereSide {
  Inside,
  Outside,
  Mixed,
}

impl SphereShapeGenerator {
  pub fn new(
    outside: Arc<dyn WorldGenerator>,
    inside: Arc<dyn WorldGenerator>,
    center: IVec3,
    radius: f32,
  ) -> Self {
    Self {
      outside,
      inside,
      center,
      radius,
    }
  }

  #[inline]
  pub fn is_inside(&self, p: IVec3) -> bool {
    (p - self.center).as_vec3().length() < self.radius
  }

  fn classify(&self, start: IVec3, step: i32, size: IVec3) -> SphereSide {
    let region = IntBox::new(start, start + size * step);
    if region.is_empty() {
      return SphereSide::Outside;
    }
    let mut all_inside = true;
    let mut all_outside = true;
    for corner in region.corners() {
      let inside = self.is_inside(corner);
      all_inside &= inside;
      all_outside &= !inside;
    }
    let sphere_box = IntBox::around(self.center, self.radius);
    if all_inside {
      SphereSide::Inside
    } else if all_outside && !sphere_box.intersects(&region) {
      SphereSide::Outside
    } else {
      SphereSide::Mixed
    }
  }
}

impl WorldGenerator for SphereShapeGenerator {
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  ) {
    match self.classify(region.start, region.step, region.size) {
      SphereSide::Inside => self.inside.sample_region(values, materials, types, region),
      SphereSide::Outside => self.outside.sample_region(values, materials, types, region),
      SphereSide::Mixed => fill_region(values, materials, types, region, |p| {
        let source = if self.is_inside(p) {
          &self.inside
        } else {
          &self.outside
        };
        let (value, material) = source.value_and_material(p);
        (value, material, source.voxel_type(p))
      }),
    }
  }

  fn is_empty(&self, start: IVec3, step: i32, size: IVec3) -> bool {
    match self.classify(start, step, size) {
      SphereSide::Inside => self.inside.is_empty(start, step, size),
      SphereSide::Outside => self.outside.is_empty(start, step, size),
      SphereSide::Mixed => false,
    }
  }
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod generator_test;
