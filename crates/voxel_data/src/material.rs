//! Packed 4-channel voxel material.

/// Voxel material: two palette indices, a blend alpha between them and an
/// auxiliary tag (foliage/actor id, left to the consumer).
///
/// Stored as 4 bytes in the order `[index_a, index_b, alpha, aux]`, which is
/// also its save-file encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Material {
  /// Primary palette index.
  pub index_a: u8,
  /// Secondary palette index.
  pub index_b: u8,
  /// Blend from `index_a` (0) to `index_b` (255).
  pub alpha: u8,
  /// Auxiliary tag.
  pub aux: u8,
}

impl Material {
  /// Size of the packed representation in bytes.
  pub const BYTES: usize = 4;

  pub const fn new(index_a: u8, index_b: u8, alpha: u8, aux: u8) -> Self {
    Self {
      index_a,
      index_b,
      alpha,
      aux,
    }
  }

  /// Single-index material with no blend.
  pub const fn from_index(index: u8) -> Self {
    Self::new(index, index, 0, 0)
  }

  /// Compare the palette indices only, ignoring alpha and aux.
  #[inline]
  pub fn same_indices(&self, other: &Material) -> bool {
    self.index_a == other.index_a && self.index_b == other.index_b
  }

  #[inline]
  pub const fn to_bytes(self) -> [u8; 4] {
    [self.index_a, self.index_b, self.alpha, self.aux]
  }

  #[inline]
  pub const fn from_bytes(bytes: [u8; 4]) -> Self {
    Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
  }
}
