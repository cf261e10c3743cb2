use std::sync::atomic::AtomicU64;

use glam::IVec3;

use super::lock::NodeLock;
use super::*;
use crate::IntBox;

/// Root of height 2 spanning [-32, 32)³.
fn root() -> Node {
  Node::new(IVec3::splat(-32), 2, 0)
}

fn chunk_box(min: IVec3) -> IntBox {
  IntBox::new(min, min + IVec3::splat(16))
}

#[test]
fn test_read_lock_on_unmodified_root_locks_root_only() {
  let root = root();
  let mut locked = LockedNodes::new();
  lock::lock_read(&root, &chunk_box(IVec3::ZERO), &mut locked);
  assert_eq!(locked.len(), 1);
  assert_eq!(locked[0].1, NodeLock::Shared);
  unsafe { lock::unlock(&mut locked) };
  assert!(locked.is_empty());
  assert!(!root.is_locked());
}

#[test]
fn test_write_lock_splits_down_to_chunk() {
  let root = root();
  let ids = AtomicU64::new(1);
  let mut locked = LockedNodes::new();
  lock::lock_write(&root, &chunk_box(IVec3::ZERO), &ids, &mut locked);

  // root and one height 1 branch shared, one chunk exclusive
  let modes: Vec<_> = locked.iter().map(|(n, m)| (n.height(), *m)).collect();
  assert_eq!(
    modes,
    vec![
      (2, NodeLock::Shared),
      (1, NodeLock::Shared),
      (0, NodeLock::Exclusive)
    ]
  );
  assert_eq!(locked[2].0.min(), IVec3::ZERO);
  unsafe { lock::unlock(&mut locked) };
  assert!(!root.is_locked());
}

#[test]
fn test_write_lock_fully_covered_node_is_not_split() {
  let root = root();
  let ids = AtomicU64::new(1);
  let mut locked = LockedNodes::new();
  let whole = IntBox::new(IVec3::splat(-32), IVec3::splat(32));
  lock::lock_write(&root, &whole, &ids, &mut locked);
  assert_eq!(locked.len(), 1);
  assert_eq!(locked[0].1, NodeLock::Exclusive);
  assert!(!unsafe { root.state() }.is_branch());
  unsafe { lock::unlock(&mut locked) };
}

#[test]
fn test_write_lock_outside_root_takes_root_shared() {
  let root = root();
  let ids = AtomicU64::new(1);
  let mut locked = LockedNodes::new();
  lock::lock_write(&root, &chunk_box(IVec3::splat(64)), &ids, &mut locked);
  assert_eq!(locked.len(), 1);
  assert_eq!(locked[0].1, NodeLock::Shared);
  unsafe { lock::unlock(&mut locked) };
}

#[test]
fn test_read_lock_visits_intersecting_children_in_preorder() {
  let root = root();
  let ids = AtomicU64::new(1);
  unsafe {
    find_or_create_chunk(&root, IVec3::ZERO, &ids);
  }
  let mut locked = LockedNodes::new();
  // spans the boundary between octant 0 and octant 1 of the root
  let bounds = IntBox::new(IVec3::new(-1, 0, 0), IVec3::new(1, 1, 1));
  lock::lock_read(&root, &bounds, &mut locked);
  let heights: Vec<_> = locked.iter().map(|(n, _)| n.height()).collect();
  // root, the unmodified octant containing x = -1, then the branch and chunk at x = 0
  assert_eq!(heights, vec![2, 1, 1, 0]);
  assert!(locked[1].0.min().x < locked[2].0.min().x);
  unsafe { lock::unlock(&mut locked) };
}

#[test]
fn test_find_or_create_chunk_and_find_node() {
  let root = root();
  let ids = AtomicU64::new(1);
  let p = IVec3::new(-17, 5, 31);
  let chunk = unsafe { find_or_create_chunk(&root, p, &ids) };
  assert_eq!(chunk.height(), 0);
  assert!(chunk.bounds().is_inside(p));
  let found = unsafe { find_node(&root, p) };
  assert!(std::ptr::eq(chunk, found));
  // untouched octant stays a height 1 unmodified node
  let other = unsafe { find_node(&root, IVec3::splat(-30)) };
  assert_eq!(other.height(), 1);
}

#[test]
fn test_visit_chunks_skips_empty_chunks() {
  let root = root();
  let ids = AtomicU64::new(1);
  unsafe {
    let a = find_or_create_chunk(&root, IVec3::ZERO, &ids);
    find_or_create_chunk(&root, IVec3::splat(-1), &ids);
    *a.state_mut() = NodeState::Chunk(ChunkBuffers {
      values: Some(new_buffer()),
      materials: None,
    });
  }
  let mut seen = Vec::new();
  unsafe { visit_chunks(&root, &mut |node, _| seen.push(node.min())) };
  assert_eq!(seen, vec![IVec3::ZERO]);
}

#[test]
fn test_root_guard_excludes_readers() {
  let root = root();
  {
    let _guard = RootGuard::new(&root);
    assert!(root.is_locked());
  }
  assert!(!root.is_locked());
}
