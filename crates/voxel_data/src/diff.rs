//! Incremental edit records for replication.
//!
//! When the store runs in multiplayer mode, every `set_*` call appends a diff
//! naming a leaf slot of the packet and the cell's index inside that leaf.
//! Diffs are never deduplicated: replaying them in order reproduces the last
//! write to each cell.
//!
//! ```text
//! leaves:  [0] (id 25, (0,0,0))   [1] (id 57, (0,0,0))   [2] (id 9, (16,0,0))
//! values:  {leaf 0, 1365, 0.5}  {leaf 2, 0, 1.0}  {leaf 1, 1365, 0.25}
//! ```
//!
//! A slot is keyed by `(id, position)`. One position may show up under
//! successive ids (the chunk was dropped and re-created in between), but an
//! id always names a single position within a packet.

use std::collections::HashMap;

use glam::IVec3;

use crate::Material;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueDiff {
  /// Slot in [`DiffPacket::leaves`].
  pub leaf: u32,
  pub index: u32,
  pub value: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialDiff {
  /// Slot in [`DiffPacket::leaves`].
  pub leaf: u32,
  pub index: u32,
  pub material: Material,
}

/// Leaf referenced by a diff packet: where the receiver must place `id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeafRecord {
  pub id: u64,
  pub position: IVec3,
}

/// Drained diff log, ready to ship to peers.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiffPacket {
  /// Every leaf referenced below, in first-use order.
  pub leaves: Vec<LeafRecord>,
  /// Value edits in insertion order.
  pub values: Vec<ValueDiff>,
  /// Material edits in insertion order.
  pub materials: Vec<MaterialDiff>,
}

impl DiffPacket {
  pub fn is_empty(&self) -> bool {
    self.values.is_empty() && self.materials.is_empty()
  }

  /// Total number of edit records.
  pub fn len(&self) -> usize {
    self.values.len() + self.materials.len()
  }
}

#[derive(Debug, Default)]
pub(crate) struct DiffLog {
  leaves: Vec<LeafRecord>,
  slots: HashMap<(u64, IVec3), u32>,
  values: Vec<ValueDiff>,
  materials: Vec<MaterialDiff>,
}

impl DiffLog {
  fn slot(&mut self, id: u64, position: IVec3) -> u32 {
    let leaves = &mut self.leaves;
    *self.slots.entry((id, position)).or_insert_with(|| {
      leaves.push(LeafRecord { id, position });
      (leaves.len() - 1) as u32
    })
  }

  pub fn push_value(&mut self, id: u64, position: IVec3, index: usize, value: f32) {
    let leaf = self.slot(id, position);
    self.values.push(ValueDiff {
      leaf,
      index: index as u32,
      value,
    });
  }

  pub fn push_material(&mut self, id: u64, position: IVec3, index: usize, material: Material) {
    let leaf = self.slot(id, position);
    self.materials.push(MaterialDiff {
      leaf,
      index: index as u32,
      material,
    });
  }

  /// Relabel every slot `(from, position)` as `(to, position)`.
  ///
  /// Called when the leaf at `position` is re-keyed, so edits already logged
  /// for it keep pointing at the same chunk under the id it now carries.
  pub fn rename(&mut self, from: u64, to: u64, position: IVec3) {
    if from == to {
      return;
    }
    for (slot, record) in self.leaves.iter_mut().enumerate() {
      if record.id != from || record.position != position {
        continue;
      }
      record.id = to;
      let slot = slot as u32;
      if self.slots.get(&(from, position)) == Some(&slot) {
        self.slots.remove(&(from, position));
      }
      self.slots.insert((to, position), slot);
    }
  }

  /// Give every slot that uses `id` away from `keep` a fresh id (one per
  /// position), so `id` names a single position again.
  pub fn retire(&mut self, id: u64, keep: IVec3, mut fresh: impl FnMut() -> u64) {
    let mut stale: Vec<IVec3> = self
      .leaves
      .iter()
      .filter(|r| r.id == id && r.position != keep)
      .map(|r| r.position)
      .collect();
    stale.sort_unstable_by_key(|p| p.to_array());
    stale.dedup();
    for position in stale {
      self.rename(id, fresh(), position);
    }
  }

  /// Drain everything recorded so far.
  pub fn take(&mut self) -> DiffPacket {
    self.slots.clear();
    DiffPacket {
      leaves: std::mem::take(&mut self.leaves),
      values: std::mem::take(&mut self.values),
      materials: std::mem::take(&mut self.materials),
    }
  }
}

#[cfg(test)]
#[path = "diff_test.rs"]
mod diff_test;
