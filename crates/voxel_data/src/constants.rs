//! Chunk layout constants for 16³ data chunks.
//!
//! Every height-0 octree leaf covers one chunk. Its dense buffers are laid out
//! with X as the fastest axis:
//!
//! ```text
//! index = x | y << 4 | z << 8
//!       = x + 16 * y + 256 * z
//! ```
//!
//! A node of height `h` covers `CHUNK_SIZE << h` voxels per axis. The root of a
//! store of depth `d` spans `[-S/2, S/2)` on every axis with `S = CHUNK_SIZE << d`.

use glam::IVec3;

/// Number of voxels per chunk axis (must be a power of two)
pub const CHUNK_SIZE: i32 = 16;

/// log2(CHUNK_SIZE)
pub const CHUNK_SHIFT: u32 = 4;

/// Voxels in a chunk (16³ = 4096)
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Mask for extracting a single axis from a chunk index (0xF = 15)
pub const INDEX_MASK: usize = 0xF;

/// Bit shift for the Y coordinate of a chunk index
pub const Y_SHIFT: u32 = CHUNK_SHIFT;

/// Bit shift for the Z coordinate of a chunk index
pub const Z_SHIFT: u32 = 2 * CHUNK_SHIFT;

/// Deepest supported octree. The root then spans 2^28 voxels, well inside the
/// overflow-safe coordinate range.
pub const MAX_DEPTH: u8 = 24;

/// Extent of the infinite box on every axis: `±(i32::MAX - 1000)`.
///
/// Boxes are only supported inside this range, which leaves headroom for
/// translation and corner arithmetic without overflowing.
pub const INFINITE_EXTENT: i32 = i32::MAX - 1000;

/// Convert chunk-local coordinates to a buffer index.
#[inline(always)]
pub const fn local_to_index(x: usize, y: usize, z: usize) -> usize {
  x | (y << Y_SHIFT) | (z << Z_SHIFT)
}

/// Convert a buffer index back to chunk-local coordinates.
#[inline(always)]
pub const fn index_to_local(idx: usize) -> (usize, usize, usize) {
  let x = idx & INDEX_MASK;
  let y = (idx >> Y_SHIFT) & INDEX_MASK;
  let z = idx >> Z_SHIFT;
  (x, y, z)
}

/// Edge length in voxels of a node at `height`.
#[inline(always)]
pub const fn node_size(height: u8) -> i32 {
  CHUNK_SIZE << height
}

/// Minimum corner of the chunk containing `p`.
#[inline]
pub fn chunk_origin(p: IVec3) -> IVec3 {
  IVec3::new(
    p.x & !(CHUNK_SIZE - 1),
    p.y & !(CHUNK_SIZE - 1),
    p.z & !(CHUNK_SIZE - 1),
  )
}

/// Buffer index of `p` inside its chunk.
#[inline]
pub fn chunk_index(p: IVec3) -> usize {
  let mask = CHUNK_SIZE - 1;
  local_to_index((p.x & mask) as usize, (p.y & mask) as usize, (p.z & mask) as usize)
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
