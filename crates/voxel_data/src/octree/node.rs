//! Node - a lockable cube of the octree.
//!
//! A node of height `h` covers `CHUNK_SIZE << h` voxels per axis. Its state
//! lives in an `UnsafeCell` guarded by the node's own reader/writer lock:
//!
//! - `Unmodified`: no children, no buffers; reads fall through to the
//!   generator.
//! - `Chunk`: height 0 leaf with lazily allocated dense buffers.
//! - `Branch`: exactly 8 children, octant bits +X (0), +Y (1), +Z (2).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::IVec3;
use lock_api::{RawRwLock as _, RawRwLockDowngrade as _, RawRwLockRecursive as _};
use parking_lot::RawRwLock;

use crate::constants::{node_size, CHUNK_VOLUME};
use crate::{IntBox, Material};

/// Dense per-chunk buffers, each allocated on its first write.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChunkBuffers {
  pub values: Option<Box<[f32]>>,
  pub materials: Option<Box<[Material]>>,
}

impl ChunkBuffers {
  /// True if neither buffer is allocated.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.values.is_none() && self.materials.is_none()
  }

  /// Number of allocated buffers (0..=2).
  #[inline]
  pub fn buffer_count(&self) -> usize {
    self.values.is_some() as usize + self.materials.is_some() as usize
  }
}

pub(crate) enum NodeState {
  Unmodified,
  Chunk(ChunkBuffers),
  Branch(Box<[Node; 8]>),
}

impl NodeState {
  #[inline]
  pub fn is_branch(&self) -> bool {
    matches!(self, NodeState::Branch(_))
  }

  /// Buffers held by this node alone (children excluded).
  #[inline]
  pub fn buffers(&self) -> Option<&ChunkBuffers> {
    match self {
      NodeState::Chunk(buffers) => Some(buffers),
      _ => None,
    }
  }
}

pub(crate) struct Node {
  lock: RawRwLock,
  min: IVec3,
  height: u8,
  id: AtomicU64,
  state: UnsafeCell<NodeState>,
}

// SAFETY: `state` is only accessed while holding `lock` (shared for reads,
// exclusive for writes) or through `&mut Node`.
unsafe impl Sync for Node {}
unsafe impl Send for Node {}

impl Node {
  pub fn new(min: IVec3, height: u8, id: u64) -> Self {
    Self {
      lock: RawRwLock::INIT,
      min,
      height,
      id: AtomicU64::new(id),
      state: UnsafeCell::new(NodeState::Unmodified),
    }
  }

  #[inline]
  pub fn min(&self) -> IVec3 {
    self.min
  }

  #[inline]
  pub fn height(&self) -> u8 {
    self.height
  }

  #[inline]
  pub fn size(&self) -> i32 {
    node_size(self.height)
  }

  #[inline]
  pub fn bounds(&self) -> IntBox {
    IntBox::new(self.min, self.min + IVec3::splat(self.size()))
  }

  /// Stable id, assigned at creation and preserved through saves and diffs.
  #[inline]
  pub fn id(&self) -> u64 {
    self.id.load(Ordering::Relaxed)
  }

  #[inline]
  pub fn set_id(&self, id: u64) {
    self.id.store(id, Ordering::Relaxed);
  }

  /// Octant of the child containing `p`.
  #[inline]
  pub fn child_octant(&self, p: IVec3) -> usize {
    debug_assert!(self.height > 0);
    let half = self.size() / 2;
    let rel = p - self.min;
    let x = (rel.x >= half) as usize;
    let y = (rel.y >= half) as usize;
    let z = (rel.z >= half) as usize;
    x | (y << 1) | (z << 2)
  }

  // ===========================================================================
  // State access
  // ===========================================================================

  /// # Safety
  /// The caller must hold this node's lock (shared or exclusive), or an
  /// exclusive lock on an ancestor.
  #[inline]
  pub unsafe fn state(&self) -> &NodeState {
    &*self.state.get()
  }

  /// # Safety
  /// The caller must hold this node's lock exclusively, or an exclusive lock
  /// on an ancestor, and no other reference to the state may be alive.
  #[allow(clippy::mut_from_ref)]
  #[inline]
  pub unsafe fn state_mut(&self) -> &mut NodeState {
    &mut *self.state.get()
  }

  /// Replace an unmodified node with 8 unmodified children.
  ///
  /// # Safety
  /// Same contract as [`Node::state_mut`].
  pub unsafe fn split(&self, ids: &AtomicU64) {
    debug_assert!(self.height > 0, "cannot split a height 0 leaf");
    debug_assert!(
      matches!(self.state(), NodeState::Unmodified),
      "only unmodified nodes are split"
    );
    let half = self.size() / 2;
    let children: [Node; 8] = std::array::from_fn(|octant| {
      let offset = IVec3::new(
        (octant & 1) as i32,
        ((octant >> 1) & 1) as i32,
        ((octant >> 2) & 1) as i32,
      ) * half;
      Node::new(
        self.min + offset,
        self.height - 1,
        ids.fetch_add(1, Ordering::Relaxed),
      )
    });
    *self.state_mut() = NodeState::Branch(Box::new(children));
  }

  // ===========================================================================
  // Locking
  // ===========================================================================

  /// Shared lock. Recursive so one thread may hold several read handles.
  #[inline]
  pub fn lock_shared(&self) {
    self.lock.lock_shared_recursive();
  }

  #[inline]
  pub fn lock_exclusive(&self) {
    self.lock.lock_exclusive();
  }

  /// # Safety
  /// The current thread's context must hold a shared lock on this node.
  #[inline]
  pub unsafe fn unlock_shared(&self) {
    self.lock.unlock_shared();
  }

  /// # Safety
  /// The node must be exclusively locked by the caller.
  #[inline]
  pub unsafe fn unlock_exclusive(&self) {
    self.lock.unlock_exclusive();
  }

  /// Turn an exclusive lock into a shared one without letting writers in.
  ///
  /// # Safety
  /// The node must be exclusively locked by the caller.
  #[inline]
  pub unsafe fn downgrade(&self) {
    self.lock.downgrade();
  }

  #[cfg(test)]
  pub fn is_locked(&self) -> bool {
    self.lock.is_locked()
  }
}

/// Allocate a buffer of `CHUNK_VOLUME` default elements.
pub(crate) fn new_buffer<T: Copy + Default>() -> Box<[T]> {
  vec![T::default(); CHUNK_VOLUME].into_boxed_slice()
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
