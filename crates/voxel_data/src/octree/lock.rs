//! Region lock traversal.
//!
//! Every acquisition walks the tree in the same order: parent before
//! children, children in octant order. Two overlapping requests therefore
//! always contend on their first common node in the same order, which rules
//! out lock cycles.
//!
//! ```text
//! read:   shared on every node intersecting the box
//! write:  shared on branches, exclusive on leaves
//!         partially covered unmodified node (height > 0):
//!           exclusive → split → downgrade to shared → recurse
//! ```
//!
//! Branches never collapse while any descendant is locked, because collapsing
//! requires the root exclusively.

use std::sync::atomic::AtomicU64;

use smallvec::SmallVec;

use super::{Node, NodeState};
use crate::IntBox;

/// Lock mode held on one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeLock {
  Shared,
  Exclusive,
}

pub(crate) type LockedNodes<'a> = SmallVec<[(&'a Node, NodeLock); 8]>;

/// Lock the root and every node intersecting `bounds` for reading.
pub(crate) fn lock_read<'a>(root: &'a Node, bounds: &IntBox, out: &mut LockedNodes<'a>) {
  root.lock_shared();
  out.push((root, NodeLock::Shared));
  read_children(root, bounds, out);
}

fn lock_read_rec<'a>(node: &'a Node, bounds: &IntBox, out: &mut LockedNodes<'a>) {
  if !node.bounds().intersects(bounds) {
    return;
  }
  node.lock_shared();
  out.push((node, NodeLock::Shared));
  read_children(node, bounds, out);
}

fn read_children<'a>(node: &'a Node, bounds: &IntBox, out: &mut LockedNodes<'a>) {
  // SAFETY: `node` is locked shared by this traversal.
  if let NodeState::Branch(children) = unsafe { node.state() } {
    for child in children.iter() {
      lock_read_rec(child, bounds, out);
    }
  }
}

/// Lock `bounds` for writing, starting at the root.
///
/// A box entirely outside the root only takes the root shared, which is
/// enough to exclude store-wide maintenance.
pub(crate) fn lock_write<'a>(
  root: &'a Node,
  bounds: &IntBox,
  ids: &AtomicU64,
  out: &mut LockedNodes<'a>,
) {
  if !root.bounds().intersects(bounds) {
    root.lock_shared();
    out.push((root, NodeLock::Shared));
    return;
  }
  lock_write_rec(root, bounds, ids, out);
}

fn lock_write_rec<'a>(node: &'a Node, bounds: &IntBox, ids: &AtomicU64, out: &mut LockedNodes<'a>) {
  node.lock_shared();
  let mut mode = NodeLock::Shared;
  loop {
    // SAFETY: `node` is locked in `mode` by this traversal.
    let is_branch = unsafe { node.state() }.is_branch();
    match (is_branch, mode) {
      (true, _) => {
        if mode == NodeLock::Exclusive {
          // SAFETY: exclusively locked just above.
          unsafe { node.downgrade() };
        }
        out.push((node, NodeLock::Shared));
        // SAFETY: branches never change while locked shared.
        let NodeState::Branch(children) = (unsafe { node.state() }) else {
          unreachable!()
        };
        for child in children.iter() {
          if child.bounds().intersects(bounds) {
            lock_write_rec(child, bounds, ids, out);
          }
        }
        return;
      }
      (false, NodeLock::Shared) => {
        // Upgrade by relocking. The state is re-checked on the next pass
        // since another writer may have split the node in between.
        // SAFETY: locked shared above.
        unsafe { node.unlock_shared() };
        node.lock_exclusive();
        mode = NodeLock::Exclusive;
      }
      (false, NodeLock::Exclusive) => {
        let node_bounds = node.bounds();
        if node.height() > 0 && !bounds.covers(&node_bounds) {
          // SAFETY: exclusively locked, and a non-branch node with height > 0
          // is always unmodified.
          unsafe { node.split(ids) };
          continue;
        }
        out.push((node, NodeLock::Exclusive));
        return;
      }
    }
  }
}

/// Release in reverse acquisition order.
///
/// # Safety
/// `nodes` must be exactly the locks recorded by [`lock_read`] or
/// [`lock_write`], not yet released.
pub(crate) unsafe fn unlock(nodes: &mut LockedNodes<'_>) {
  while let Some((node, mode)) = nodes.pop() {
    match mode {
      NodeLock::Shared => node.unlock_shared(),
      NodeLock::Exclusive => node.unlock_exclusive(),
    }
  }
}

/// Exclusive lock on the root, released on drop. Used by store-wide
/// maintenance: since every handle starts at the root, holding it excludes
/// all other access.
pub(crate) struct RootGuard<'a> {
  root: &'a Node,
}

impl<'a> RootGuard<'a> {
  pub fn new(root: &'a Node) -> Self {
    root.lock_exclusive();
    Self { root }
  }

  pub fn root(&self) -> &'a Node {
    self.root
  }
}

impl Drop for RootGuard<'_> {
  fn drop(&mut self) {
    // SAFETY: locked exclusively in `new`.
    unsafe { self.root.unlock_exclusive() };
  }
}
