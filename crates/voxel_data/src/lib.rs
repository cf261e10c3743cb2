//! voxel_data - Sparse, concurrently editable voxel storage
//!
//! This crate stores a signed-distance voxel world as an octree of 16³ chunks
//! layered over a procedural generator. Only edited chunks own memory; every
//! other voxel is resolved from the generator on read.
//!
//! # Features
//!
//! - **Region Locking**: Readers and writers lock boxes of the world; disjoint
//!   writers run in parallel, overlapping ones serialize
//! - **Generator Fallback**: Unedited voxels come from a pluggable
//!   [`WorldGenerator`], optionally overlaid with placed items
//! - **Save/Load**: RLE compressed snapshots that report exactly which cells
//!   changed on load
//! - **Diffs**: Per-edit records keyed by leaf `(id, position)` for replication
//! - **Async Edits**: Lock, edit and release on rayon's thread pool
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voxel_data::{ConstantGenerator, DataConfig, IntBox, Material, VoxelData};
//!
//! let generator = Arc::new(ConstantGenerator::new(-1.0, Material::default()));
//! let data = VoxelData::new(DataConfig::default().with_depth(4), generator)?;
//!
//! let p = glam::IVec3::new(5, 5, 5);
//! let lock = data.begin_set(IntBox::from_point(p), "edit");
//! data.set_value(&lock, p, 1.0);
//! data.end_set(lock);
//!
//! let save = data.get_save();
//! let modified = VoxelData::new(DataConfig::default().with_depth(4), data.generator())?
//!   .load_from_save(&save, true)?;
//! assert_eq!(modified, vec![p]);
//! ```

pub mod constants;
pub mod rle;

// Core value types
mod int_box;
mod material;
mod voxel_type;
pub use int_box::IntBox;
pub use material::Material;
pub use voxel_type::{MaterialType, ValueType, VoxelType, IGNORE_VALUE_THRESHOLD};

// Errors
mod error;
pub use error::{DataError, DataResult};

// Procedural fallback and placed items
pub mod generator;
pub use generator::{
  fill_region, ConstantGenerator, EmptyGenerator, FlatGenerator, SampleRegion,
  SphereShapeGenerator, WorldGenerator,
};
mod items;
pub use items::{DataAsset, ItemBlend, LayeredGenerator, PlacedItem};

// Lockable octree and region lock handles
mod octree;
mod lock;
pub use lock::{LockHandle, LockKind};

// Save snapshots and replication diffs
mod save;
pub use save::{ChunkSave, WorldSave, SAVE_VERSION};
mod diff;
pub use diff::{DiffPacket, LeafRecord, MaterialDiff, ValueDiff};

// The store
mod data;
pub use data::{DataConfig, DiscardAction, VoxelData};

// Async edits on rayon's pool
pub mod threading;
pub use threading::{TaskExecutor, TaskId};
