//! Errors surfaced by save/load and diff replay.
//!
//! Hot-path accessors never return errors: misuse of lock handles is a
//! contract violation caught by debug assertions.

use glam::IVec3;

use crate::rle::RleError;

/// Result alias for fallible store operations.
pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
  #[error("corrupt save: {0}")]
  CorruptSave(String),

  #[error("save depth mismatch: store has depth {expected}, save has {found}")]
  DepthMismatch { expected: u8, found: i32 },

  #[error("unsupported save version {0}")]
  UnsupportedVersion(u32),

  #[error("chunk at {0} is outside the world or not chunk aligned")]
  ChunkOutOfWorld(IVec3),

  #[error("diff references leaf slot {0}, packet lists fewer leaves")]
  UnknownLeaf(u32),

  #[error("diff index {index} out of range for leaf slot {leaf}")]
  DiffIndexOutOfRange { leaf: u32, index: u32 },

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error(transparent)]
  Rle(#[from] RleError),
}
