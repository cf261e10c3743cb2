//! Octree of lockable nodes.
//!
//! The root is owned by the store; every branch exclusively owns its 8
//! children. Nodes are created lazily by splitting: an edit that needs a
//! height 0 chunk splits every unmodified node on the way down.
//!
//! # Module Structure
//!
//! - [`node`]: `Node`, `NodeState`, `ChunkBuffers`
//! - [`lock`]: pre-order lock traversal and the root guard
//!
//! The walkers below are `unsafe`: the caller vouches that the nodes visited
//! are covered by locks it holds (see each function).

pub(crate) mod lock;
pub(crate) mod node;

use std::sync::atomic::AtomicU64;

use glam::IVec3;

pub(crate) use lock::{LockedNodes, RootGuard};
pub(crate) use node::{new_buffer, ChunkBuffers, Node, NodeState};

/// Deepest existing node containing `p` (a chunk, or an unmodified node).
///
/// # Safety
/// Every node on the path from `root` to `p` must be locked by the caller
/// (shared or exclusive), directly or through an exclusive ancestor.
pub(crate) unsafe fn find_node(root: &Node, p: IVec3) -> &Node {
  let mut node = root;
  while let NodeState::Branch(children) = node.state() {
    node = &children[node.child_octant(p)];
  }
  node
}

/// Height 0 node containing `p`, splitting unmodified nodes on the way.
///
/// # Safety
/// `p` must be inside `root`, and the caller must hold an exclusive lock on
/// the first non-branch node of the path (or on an ancestor of it) plus a
/// lock on every branch above it.
pub(crate) unsafe fn find_or_create_chunk<'a>(root: &'a Node, p: IVec3, ids: &AtomicU64) -> &'a Node {
  debug_assert!(root.bounds().is_inside(p));
  let mut node = root;
  loop {
    if node.height() == 0 {
      return node;
    }
    if !node.state().is_branch() {
      node.split(ids);
    }
    let NodeState::Branch(children) = node.state() else {
      unreachable!()
    };
    node = &children[node.child_octant(p)];
  }
}

/// Visit every node in pre-order, children in octant order.
///
/// # Safety
/// The whole subtree must be locked by the caller.
pub(crate) unsafe fn visit<'a>(node: &'a Node, f: &mut impl FnMut(&'a Node)) {
  f(node);
  if let NodeState::Branch(children) = node.state() {
    for child in children.iter() {
      visit(child, f);
    }
  }
}

/// Visit every node holding at least one buffer, in pre-order.
///
/// # Safety
/// Same contract as [`visit`].
pub(crate) unsafe fn visit_chunks<'a>(node: &'a Node, f: &mut impl FnMut(&'a Node, &'a ChunkBuffers)) {
  visit(node, &mut |n: &'a Node| {
    if let NodeState::Chunk(buffers) = n.state() {
      if !buffers.is_empty() {
        f(n, buffers);
      }
    }
  });
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
