//! Run-length codec for save data.
//!
//! A stream is a sequence of records:
//!
//! ```text
//! u16 run_length (LE) | payload (T::BYTES, LE)
//! ```
//!
//! Runs are capped at [`MAX_RUN`]; longer runs are split into several records.
//! Float runs compare bit patterns, so encoding is lossless and a
//! `decode(encode(x))` round trip is bit exact (including `-0.0` and NaN
//! payloads).

use crate::Material;

/// Longest run a single record can hold.
pub const MAX_RUN: usize = 0xFFFE;

/// Bytes used by the run length prefix.
const RUN_BYTES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RleError {
  #[error("truncated RLE record at byte {offset}")]
  Truncated { offset: usize },

  #[error("zero-length RLE run at byte {offset}")]
  ZeroLengthRun { offset: usize },

  #[error("RLE decoded {found} elements, expected {expected}")]
  LengthMismatch { expected: usize, found: usize },
}

/// Element type storable in an RLE stream.
pub trait RlePayload: Copy {
  /// Encoded size in bytes.
  const BYTES: usize;

  /// Whether two elements belong to the same run.
  fn same_run(&self, other: &Self) -> bool;

  fn write_le(&self, out: &mut Vec<u8>);

  /// Decode from exactly `Self::BYTES` bytes.
  fn read_le(bytes: &[u8]) -> Self;
}

impl RlePayload for u8 {
  const BYTES: usize = 1;

  #[inline]
  fn same_run(&self, other: &Self) -> bool {
    self == other
  }

  #[inline]
  fn write_le(&self, out: &mut Vec<u8>) {
    out.push(*self);
  }

  #[inline]
  fn read_le(bytes: &[u8]) -> Self {
    bytes[0]
  }
}

impl RlePayload for f32 {
  const BYTES: usize = 4;

  #[inline]
  fn same_run(&self, other: &Self) -> bool {
    self.to_bits() == other.to_bits()
  }

  #[inline]
  fn write_le(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.to_le_bytes());
  }

  #[inline]
  fn read_le(bytes: &[u8]) -> Self {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
  }
}

impl RlePayload for Material {
  const BYTES: usize = Material::BYTES;

  #[inline]
  fn same_run(&self, other: &Self) -> bool {
    self == other
  }

  #[inline]
  fn write_le(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.to_bytes());
  }

  #[inline]
  fn read_le(bytes: &[u8]) -> Self {
    Material::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
  }
}

/// Encode `data` into RLE records.
pub fn encode<T: RlePayload>(data: &[T]) -> Vec<u8> {
  let mut out = Vec::new();
  let mut i = 0;
  while i < data.len() {
    let first = data[i];
    let mut run = 1;
    while run < MAX_RUN && i + run < data.len() && first.same_run(&data[i + run]) {
      run += 1;
    }
    out.extend_from_slice(&(run as u16).to_le_bytes());
    first.write_le(&mut out);
    i += run;
  }
  out
}

/// Decode a full RLE stream.
pub fn decode<T: RlePayload>(bytes: &[u8]) -> Result<Vec<T>, RleError> {
  decode_bounded(bytes, None)
}

/// Decode a stream that must expand to exactly `expected` elements.
///
/// Stops at the first run that would overshoot `expected`, so a hostile
/// stream never allocates past it.
pub fn decode_exact<T: RlePayload>(bytes: &[u8], expected: usize) -> Result<Vec<T>, RleError> {
  let out = decode_bounded(bytes, Some(expected))?;
  if out.len() != expected {
    return Err(RleError::LengthMismatch {
      expected,
      found: out.len(),
    });
  }
  Ok(out)
}

fn decode_bounded<T: RlePayload>(bytes: &[u8], limit: Option<usize>) -> Result<Vec<T>, RleError> {
  let mut out = Vec::with_capacity(limit.unwrap_or(0));
  let record = RUN_BYTES + T::BYTES;
  let mut offset = 0;
  while offset < bytes.len() {
    if offset + record > bytes.len() {
      return Err(RleError::Truncated { offset });
    }
    let run = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as usize;
    if run == 0 {
      return Err(RleError::ZeroLengthRun { offset });
    }
    if let Some(expected) = limit.filter(|&expected| out.len() + run > expected) {
      return Err(RleError::LengthMismatch {
        expected,
        found: out.len() + run,
      });
    }
    let value = T::read_le(&bytes[offset + RUN_BYTES..offset + record]);
    out.extend(std::iter::repeat(value).take(run));
    offset += record;
  }
  Ok(out)
}

#[cfg(test)]
#[path = "rle_test.rs"]
mod rle_test;
