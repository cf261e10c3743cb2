//! Region lock handles.
//!
//! A [`LockHandle`] is the token returned by `begin_get`/`begin_set`. It
//! borrows the store, so the store cannot be dropped while a handle is alive,
//! and it is consumed by `end_get`/`end_set`, so a handle cannot be released
//! twice. A handle dropped without being released logs an error, trips a
//! debug assertion and still releases its locks.

use std::fmt;

use crate::octree::{lock, LockedNodes};
use crate::IntBox;

/// Access requested by a lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockKind {
  Read,
  Write,
}

/// Locks held over a box of the store.
#[must_use = "a lock handle must be passed back to end_get/end_set"]
pub struct LockHandle<'a> {
  pub(crate) store: u64,
  pub(crate) kind: LockKind,
  pub(crate) bounds: IntBox,
  pub(crate) name: &'static str,
  pub(crate) nodes: LockedNodes<'a>,
  released: bool,
}

impl<'a> LockHandle<'a> {
  pub(crate) fn new(
    store: u64,
    kind: LockKind,
    bounds: IntBox,
    name: &'static str,
    nodes: LockedNodes<'a>,
  ) -> Self {
    Self {
      store,
      kind,
      bounds,
      name,
      nodes,
      released: false,
    }
  }

  pub fn kind(&self) -> LockKind {
    self.kind
  }

  /// Box this handle grants access to.
  pub fn bounds(&self) -> IntBox {
    self.bounds
  }

  /// Debug name given when the lock was taken.
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Number of node locks held.
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  pub(crate) fn release(mut self) {
    // SAFETY: the nodes were recorded by the lock traversal and, since
    // `released` is false, are still held.
    unsafe { lock::unlock(&mut self.nodes) };
    self.released = true;
  }
}

impl Drop for LockHandle<'_> {
  fn drop(&mut self) {
    if self.released {
      return;
    }
    log::error!(
      "{:?} lock '{}' over {:?} dropped without being released",
      self.kind,
      self.name,
      self.bounds
    );
    // SAFETY: see `release`.
    unsafe { lock::unlock(&mut self.nodes) };
    self.released = true;
    if !std::thread::panicking() {
      debug_assert!(false, "lock '{}' was never released", self.name);
    }
  }
}

impl fmt::Debug for LockHandle<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LockHandle")
      .field("kind", &self.kind)
      .field("bounds", &self.bounds)
      .field("name", &self.name)
      .field("nodes", &self.nodes.len())
      .finish()
  }
}
