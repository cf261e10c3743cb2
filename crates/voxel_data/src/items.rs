//! Placed items: overlays composited between the generator and direct edits.
//!
//! A [`LayeredGenerator`] wraps a base generator and a list of
//! [`PlacedItem`]s. Items are applied in ascending priority (ties keep
//! insertion order), so the highest priority item has the last word. The
//! result is itself a [`WorldGenerator`], which means the store resolves
//! `edits → items → generator` without knowing about items at all.

use std::sync::Arc;

use glam::IVec3;

use crate::generator::{fill_region, SampleRegion, WorldGenerator};
use crate::{IntBox, Material, VoxelType};

/// How an item's samples combine with the layers below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ItemBlend {
  /// Item value and material win outright.
  #[default]
  Replace,
  /// Solid union: `min(below, item)`; the item's material wins where the item
  /// is the more solid of the two.
  Union,
  /// Carve: `max(below, -item)`; material is left untouched.
  Subtract,
}

impl ItemBlend {
  #[inline]
  pub fn apply(self, below: (f32, Material), item: (f32, Material)) -> (f32, Material) {
    match self {
      ItemBlend::Replace => item,
      ItemBlend::Union => {
        if item.0 <= below.0 {
          item
        } else {
          below
        }
      }
      ItemBlend::Subtract => (below.0.max(-item.0), below.1),
    }
  }
}

/// Overlay occupying `bounds`, sampled from `source` in world coordinates.
#[derive(Clone)]
pub struct PlacedItem {
  pub bounds: IntBox,
  pub priority: i32,
  pub blend: ItemBlend,
  pub source: Arc<dyn WorldGenerator>,
}

impl PlacedItem {
  pub fn new(bounds: IntBox, source: Arc<dyn WorldGenerator>) -> Self {
    Self {
      bounds,
      priority: 0,
      blend: ItemBlend::Replace,
      source,
    }
  }

  /// Stamp `asset` with its minimum corner at `position`.
  pub fn asset(asset: Arc<DataAsset>, position: IVec3) -> Self {
    let bounds = IntBox::new(position, position + asset.size);
    Self::new(bounds, Arc::new(AssetInstance { asset, position }))
  }

  pub fn with_priority(mut self, priority: i32) -> Self {
    self.priority = priority;
    self
  }

  pub fn with_blend(mut self, blend: ItemBlend) -> Self {
    self.blend = blend;
    self
  }
}

impl std::fmt::Debug for PlacedItem {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PlacedItem")
      .field("bounds", &self.bounds)
      .field("priority", &self.priority)
      .field("blend", &self.blend)
      .finish_non_exhaustive()
  }
}

/// Dense value/material stamp, X fastest.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataAsset {
  size: IVec3,
  values: Vec<f32>,
  materials: Vec<Material>,
}

impl DataAsset {
  /// Asset of `size` voxels filled with `value`/`material`.
  pub fn new(size: IVec3, value: f32, material: Material) -> Self {
    debug_assert!(size.cmpgt(IVec3::ZERO).all(), "asset size must be positive");
    let len = (size.x * size.y * size.z) as usize;
    Self {
      size,
      values: vec![value; len],
      materials: vec![material; len],
    }
  }

  /// Rasterize `f` over every local position.
  pub fn from_fn(size: IVec3, mut f: impl FnMut(IVec3) -> (f32, Material)) -> Self {
    let mut asset = Self::new(size, 1.0, Material::default());
    for p in IntBox::new(IVec3::ZERO, size).iter() {
      let (value, material) = f(p);
      asset.set(p, value, material);
    }
    asset
  }

  pub fn size(&self) -> IVec3 {
    self.size
  }

  #[inline]
  fn index(&self, local: IVec3) -> usize {
    debug_assert!(
      local.cmpge(IVec3::ZERO).all() && local.cmplt(self.size).all(),
      "{local} outside asset of size {}",
      self.size
    );
    (local.x + self.size.x * (local.y + self.size.y * local.z)) as usize
  }

  pub fn get(&self, local: IVec3) -> (f32, Material) {
    let index = self.index(local);
    (self.values[index], self.materials[index])
  }

  pub fn set(&mut self, local: IVec3, value: f32, material: Material) {
    let index = self.index(local);
    self.values[index] = value;
    self.materials[index] = material;
  }
}

/// A [`DataAsset`] placed in the world.
struct AssetInstance {
  asset: Arc<DataAsset>,
  position: IVec3,
}

impl WorldGenerator for AssetInstance {
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  ) {
    let local_bounds = IntBox::new(IVec3::ZERO, self.asset.size);
    fill_region(values, materials, types, region, |p| {
      let local = p - self.position;
      let (value, material) = if local_bounds.is_inside(local) {
        self.asset.get(local)
      } else {
        (1.0, Material::default())
      };
      (value, material, VoxelType::from_value(value))
    });
  }
}

/// Base generator with placed items composited on top.
#[derive(Clone)]
pub struct LayeredGenerator {
  base: Arc<dyn WorldGenerator>,
  items: Vec<PlacedItem>,
}

impl LayeredGenerator {
  pub fn new(base: Arc<dyn WorldGenerator>) -> Self {
    Self {
      base,
      items: Vec::new(),
    }
  }

  pub fn with_item(mut self, item: PlacedItem) -> Self {
    self.add_item(item);
    self
  }

  /// Insert keeping items sorted by priority.
  pub fn add_item(&mut self, item: PlacedItem) {
    let at = self.items.partition_point(|i| i.priority <= item.priority);
    self.items.insert(at, item);
  }

  /// Items in application order.
  pub fn items(&self) -> &[PlacedItem] {
    &self.items
  }

  pub fn base(&self) -> &Arc<dyn WorldGenerator> {
    &self.base
  }
}

impl WorldGenerator for LayeredGenerator {
  fn sample_region(
    &self,
    values: Option<&mut [f32]>,
    materials: Option<&mut [Material]>,
    mut types: Option<&mut [VoxelType]>,
    region: &SampleRegion,
  ) {
    let bounds = region.voxel_bounds();
    let touching: Vec<&PlacedItem> = self
      .items
      .iter()
      .filter(|item| item.bounds.intersects(&bounds))
      .collect();
    if touching.is_empty() {
      self.base.sample_region(values, materials, types, region);
      return;
    }

    // Blending needs both channels, so missing outputs get scratch arrays.
    let len = region.array_len();
    let mut scratch_values = Vec::new();
    let mut scratch_materials = Vec::new();
    let values = match values {
      Some(v) => v,
      None => {
        scratch_values.resize(len, 0.0);
        &mut scratch_values[..]
      }
    };
    let materials = match materials {
      Some(m) => m,
      None => {
        scratch_materials.resize(len, Material::default());
        &mut scratch_materials[..]
      }
    };
    self
      .base
      .sample_region(Some(&mut *values), Some(&mut *materials), None, region);

    for item in touching {
      let Some(sub) = region.clip(&item.bounds) else {
        continue;
      };
      let local = sub.compact();
      let mut item_values = vec![0.0; local.array_len()];
      let mut item_materials = vec![Material::default(); local.array_len()];
      item
        .source
        .sample_region(Some(&mut item_values), Some(&mut item_materials), None, &local);
      for k in 0..sub.size.z {
        for j in 0..sub.size.y {
          for i in 0..sub.size.x {
            let dst = sub.index(i, j, k);
            let src = local.index(i, j, k);
            let (value, material) = item.blend.apply(
              (values[dst], materials[dst]),
              (item_values[src], item_materials[src]),
            );
            values[dst] = value;
            materials[dst] = material;
          }
        }
      }
    }

    if let Some(types) = types.as_deref_mut() {
      region.for_each(|_, index| types[index] = VoxelType::from_value(values[index]));
    }
  }

  fn is_empty(&self, start: IVec3, step: i32, size: IVec3) -> bool {
    let bounds = IntBox::new(start, start + size * step);
    self.base.is_empty(start, step, size)
      && !self.items.iter().any(|item| item.bounds.intersects(&bounds))
  }
}

#[cfg(test)]
#[path = "items_test.rs"]
mod items_test;
