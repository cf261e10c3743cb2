//! Save snapshots and their binary layout.
//!
//! ```text
//! u32 version
//! u32 chunk_count
//! chunk_count × { u64 id, i32 x, i32 y, i32 z, u8 flags }    flags: 1 = values, 2 = materials
//! u32 len | RLE(values of every chunk with flag 1, in chunk order)
//! u32 len | RLE(materials of every chunk with flag 2, in chunk order)
//! ```
//!
//! All integers are little endian. Decoding checks the layout only; whether
//! the chunk positions fit a given store is checked when loading.

use glam::IVec3;

use crate::constants::CHUNK_VOLUME;
use crate::error::{DataError, DataResult};
use crate::{rle, Material};

/// Current layout version.
pub const SAVE_VERSION: u32 = 1;

const FLAG_VALUES: u8 = 1;
const FLAG_MATERIALS: u8 = 2;
const INDEX_ENTRY_BYTES: usize = 8 + 3 * 4 + 1;

/// Full snapshot of one dirty leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkSave {
  /// Stable leaf id.
  pub id: u64,
  /// Minimum corner of the chunk.
  pub position: IVec3,
  /// `CHUNK_VOLUME` values, or `None` if the leaf defers to the generator.
  pub values: Option<Vec<f32>>,
  /// `CHUNK_VOLUME` materials, or `None` if the leaf defers to the generator.
  pub materials: Option<Vec<Material>>,
}

/// Compressed snapshot of a whole store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldSave {
  /// Depth (root height) of the store that produced the save.
  pub depth: i32,
  pub data: Vec<u8>,
}

impl WorldSave {
  pub fn from_chunks(depth: u8, chunks: &[ChunkSave]) -> Self {
    let mut data = Vec::with_capacity(8 + chunks.len() * INDEX_ENTRY_BYTES);
    data.extend_from_slice(&SAVE_VERSION.to_le_bytes());
    data.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let mut values = Vec::new();
    let mut materials = Vec::new();
    for chunk in chunks {
      data.extend_from_slice(&chunk.id.to_le_bytes());
      for axis in 0..3 {
        data.extend_from_slice(&chunk.position[axis].to_le_bytes());
      }
      let mut flags = 0;
      if let Some(v) = &chunk.values {
        debug_assert_eq!(v.len(), CHUNK_VOLUME);
        flags |= FLAG_VALUES;
        values.extend_from_slice(v);
      }
      if let Some(m) = &chunk.materials {
        debug_assert_eq!(m.len(), CHUNK_VOLUME);
        flags |= FLAG_MATERIALS;
        materials.extend_from_slice(m);
      }
      data.push(flags);
    }

    for encoded in [rle::encode(&values), rle::encode(&materials)] {
      data.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
      data.extend_from_slice(&encoded);
    }

    Self {
      depth: depth as i32,
      data,
    }
  }

  /// Decode and validate the layout.
  pub fn chunks(&self) -> DataResult<Vec<ChunkSave>> {
    let mut reader = Reader::new(&self.data);
    let version = reader.u32()?;
    if version != SAVE_VERSION {
      return Err(DataError::UnsupportedVersion(version));
    }
    let count = reader.u32()? as usize;
    if count.saturating_mul(INDEX_ENTRY_BYTES) > reader.remaining() {
      return Err(corrupt(format!("chunk count {count} exceeds data size")));
    }

    let mut chunks = Vec::with_capacity(count);
    let mut flags = Vec::with_capacity(count);
    for _ in 0..count {
      let id = reader.u64()?;
      let position = IVec3::new(reader.i32()?, reader.i32()?, reader.i32()?);
      let f = reader.u8()?;
      if f & !(FLAG_VALUES | FLAG_MATERIALS) != 0 {
        return Err(corrupt(format!("unknown chunk flags {f:#04x}")));
      }
      flags.push(f);
      chunks.push(ChunkSave {
        id,
        position,
        values: None,
        materials: None,
      });
    }

    let with_values = flags.iter().filter(|f| **f & FLAG_VALUES != 0).count();
    let with_materials = flags.iter().filter(|f| **f & FLAG_MATERIALS != 0).count();

    let len = reader.u32()? as usize;
    let values: Vec<f32> = rle::decode_exact(reader.take(len)?, with_values * CHUNK_VOLUME)?;
    let len = reader.u32()? as usize;
    let materials: Vec<Material> =
      rle::decode_exact(reader.take(len)?, with_materials * CHUNK_VOLUME)?;
    if reader.remaining() != 0 {
      return Err(corrupt(format!("{} trailing bytes", reader.remaining())));
    }

    let mut values = values.chunks_exact(CHUNK_VOLUME);
    let mut materials = materials.chunks_exact(CHUNK_VOLUME);
    for (chunk, f) in chunks.iter_mut().zip(&flags) {
      if f & FLAG_VALUES != 0 {
        chunk.values = values.next().map(<[f32]>::to_vec);
      }
      if f & FLAG_MATERIALS != 0 {
        chunk.materials = materials.next().map(<[Material]>::to_vec);
      }
    }
    Ok(chunks)
  }
}

fn corrupt(message: String) -> DataError {
  DataError::CorruptSave(message)
}

/// Little endian cursor over the save bytes.
struct Reader<'a> {
  bytes: &'a [u8],
  offset: usize,
}

impl<'a> Reader<'a> {
  fn new(bytes: &'a [u8]) -> Self {
    Self { bytes, offset: 0 }
  }

  fn remaining(&self) -> usize {
    self.bytes.len() - self.offset
  }

  fn take(&mut self, len: usize) -> DataResult<&'a [u8]> {
    if len > self.remaining() {
      return Err(corrupt(format!(
        "truncated at byte {}: needed {len}, {} left",
        self.offset,
        self.remaining()
      )));
    }
    let slice = &self.bytes[self.offset..self.offset + len];
    self.offset += len;
    Ok(slice)
  }

  fn array<const N: usize>(&mut self) -> DataResult<[u8; N]> {
    let mut out = [0; N];
    out.copy_from_slice(self.take(N)?);
    Ok(out)
  }

  fn u8(&mut self) -> DataResult<u8> {
    Ok(self.array::<1>()?[0])
  }

  fn u32(&mut self) -> DataResult<u32> {
    Ok(u32::from_le_bytes(self.array()?))
  }

  fn i32(&mut self) -> DataResult<i32> {
    Ok(i32::from_le_bytes(self.array()?))
  }

  fn u64(&mut self) -> DataResult<u64> {
    Ok(u64::from_le_bytes(self.array()?))
  }
}

#[cfg(test)]
#[path = "save_test.rs"]
mod save_test;
