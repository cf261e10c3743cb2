//! Per-cell trust flags reported by generators.
//!
//! A consumer merging several sources (generator, overlays, edits) uses the
//! voxel type to decide whether a sample should win, be blended by sign, or be
//! skipped entirely. Generators can fill whole homogeneous regions with
//! `IgnoreValue` to let the consumer skip work.

/// How a cell's value should be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ValueType {
  /// Trust the value.
  #[default]
  UseValue = 0,
  /// Use the value only where it agrees in sign with the underlying layer.
  UseValueIfSameSign = 1,
  /// Empty space: the value carries no information.
  IgnoreValue = 2,
}

/// How a cell's material should be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MaterialType {
  #[default]
  UseMaterial = 0,
  IgnoreMaterial = 1,
}

/// Value threshold above which a cell is considered fully empty.
pub const IGNORE_VALUE_THRESHOLD: f32 = 1.0 - 1e-4;

/// Packed value/material type.
///
/// Bits 0-1 hold the [`ValueType`], bit 2 the [`MaterialType`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelType(u8);

impl VoxelType {
  const VALUE_MASK: u8 = 0b011;
  const MATERIAL_BIT: u8 = 0b100;

  pub const fn new(value: ValueType, material: MaterialType) -> Self {
    Self(value as u8 | (material as u8) << 2)
  }

  /// Derive the type of a cell from its density value.
  ///
  /// Positive values are outside the surface, so their material is ignored.
  pub fn from_value(value: f32) -> Self {
    let value_type = if value > IGNORE_VALUE_THRESHOLD {
      ValueType::IgnoreValue
    } else if value > 0.0 {
      ValueType::UseValueIfSameSign
    } else {
      ValueType::UseValue
    };
    let material_type = if value <= 0.0 {
      MaterialType::UseMaterial
    } else {
      MaterialType::IgnoreMaterial
    };
    Self::new(value_type, material_type)
  }

  #[inline]
  pub fn value_type(self) -> ValueType {
    match self.0 & Self::VALUE_MASK {
      0 => ValueType::UseValue,
      1 => ValueType::UseValueIfSameSign,
      _ => ValueType::IgnoreValue,
    }
  }

  #[inline]
  pub fn material_type(self) -> MaterialType {
    if self.0 & Self::MATERIAL_BIT == 0 {
      MaterialType::UseMaterial
    } else {
      MaterialType::IgnoreMaterial
    }
  }

  /// Raw packed byte.
  #[inline]
  pub const fn bits(self) -> u8 {
    self.0
  }

  /// Rebuild from a packed byte. Unknown bits are dropped.
  #[inline]
  pub const fn from_bits(bits: u8) -> Self {
    let value = bits & Self::VALUE_MASK;
    // 3 is not a valid value type
    let value = if value == 3 { 2 } else { value };
    Self(value | (bits & Self::MATERIAL_BIT))
  }
}

#[cfg(test)]
#[path = "voxel_type_test.rs"]
mod voxel_type_test;
