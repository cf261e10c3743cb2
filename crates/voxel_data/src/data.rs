//! VoxelData - the public entry point of the store.
//!
//! ```text
//! begin_get/begin_set(box) ──► LockHandle ──► get_*/set_*(&handle, p) ──► end_get/end_set(handle)
//!                                               │
//!                                               ▼
//!                                  chunk buffer, else generator (+ placed items)
//! ```
//!
//! Store-wide maintenance (discard, compaction, generator swaps, loading and
//! diff replay) takes the root exclusively and so waits for every
//! outstanding handle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{IVec3, Vec3};
use parking_lot::{Mutex, RwLock};
use web_time::Instant;

use crate::constants::{chunk_index, chunk_origin, index_to_local, CHUNK_SIZE, CHUNK_VOLUME, MAX_DEPTH};
use crate::diff::{DiffLog, DiffPacket, LeafRecord};
use crate::error::{DataError, DataResult};
use crate::generator::{SampleRegion, WorldGenerator};
use crate::lock::{LockHandle, LockKind};
use crate::octree::{self, lock, new_buffer, ChunkBuffers, LockedNodes, Node, NodeState, RootGuard};
use crate::save::{ChunkSave, WorldSave};
use crate::{IntBox, Material};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Store configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataConfig {
  /// Root height. The world spans `CHUNK_SIZE << depth` voxels per axis,
  /// centered on the origin.
  pub depth: u8,

  /// Record value/material diffs on every write for replication.
  pub multiplayer: bool,
}

impl DataConfig {
  pub fn with_depth(mut self, depth: u8) -> Self {
    self.depth = depth;
    self
  }

  pub fn with_multiplayer(mut self, multiplayer: bool) -> Self {
    self.multiplayer = multiplayer;
    self
  }

  /// World edge length in voxels.
  #[inline]
  pub fn world_size(&self) -> i32 {
    CHUNK_SIZE << self.depth
  }

  fn validate(&self) -> DataResult<()> {
    if self.depth == 0 || self.depth > MAX_DEPTH {
      return Err(DataError::InvalidConfig(format!(
        "depth must be in 1..={MAX_DEPTH}, got {}",
        self.depth
      )));
    }
    Ok(())
  }
}

impl Default for DataConfig {
  fn default() -> Self {
    Self {
      depth: 8,
      multiplayer: false,
    }
  }
}

/// Verdict of a `discard_values_by_predicate` callback for one box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardAction {
  /// Drop every edit inside the box.
  Discard,
  /// Ask again for each child box (each voxel, below chunk level).
  Subdivide,
  /// Leave the box alone.
  Keep,
}

/// Sparse voxel store: octree of edits over a procedural generator.
pub struct VoxelData {
  config: DataConfig,
  store_id: u64,
  root: Node,
  generator: RwLock<Arc<dyn WorldGenerator>>,
  next_id: AtomicU64,
  diffs: Mutex<DiffLog>,
}

impl VoxelData {
  pub fn new(config: DataConfig, generator: Arc<dyn WorldGenerator>) -> DataResult<Self> {
    config.validate()?;
    let half = config.world_size() / 2;
    let root = Node::new(IVec3::splat(-half), config.depth, 0);
    log::debug!(
      "created voxel data: depth {}, {} voxels per axis, multiplayer {}",
      config.depth,
      config.world_size(),
      config.multiplayer
    );
    Ok(Self {
      config,
      store_id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
      root,
      generator: RwLock::new(generator),
      next_id: AtomicU64::new(1),
      diffs: Mutex::new(DiffLog::default()),
    })
  }

  // ===========================================================================
  // World
  // ===========================================================================

  pub fn config(&self) -> &DataConfig {
    &self.config
  }

  pub fn depth(&self) -> u8 {
    self.config.depth
  }

  /// Edge length of the world in voxels.
  pub fn size(&self) -> i32 {
    self.config.world_size()
  }

  /// `[-size/2, size/2)` on every axis.
  pub fn bounds(&self) -> IntBox {
    self.root.bounds()
  }

  #[inline]
  pub fn is_in_world(&self, p: IVec3) -> bool {
    self.bounds().is_inside(p)
  }

  pub fn clamp_to_world(&self, p: IVec3) -> IVec3 {
    let bounds = self.bounds();
    p.clamp(bounds.min, bounds.max - IVec3::ONE)
  }

  /// Current fallback generator.
  pub fn generator(&self) -> Arc<dyn WorldGenerator> {
    self.generator.read().clone()
  }

  // ===========================================================================
  // Locking
  // ===========================================================================

  /// Lock `bounds` for reading. Blocks until no writer holds an overlapping
  /// region.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "data::begin_get"))]
  pub fn begin_get(&self, bounds: IntBox, name: &'static str) -> LockHandle<'_> {
    let mut nodes = LockedNodes::new();
    lock::lock_read(&self.root, &bounds, &mut nodes);
    LockHandle::new(self.store_id, LockKind::Read, bounds, name, nodes)
  }

  pub fn end_get(&self, lock: LockHandle<'_>) {
    debug_assert_eq!(lock.store, self.store_id, "lock handle from another store");
    debug_assert_eq!(lock.kind, LockKind::Read, "end_get on a write lock");
    lock.release();
  }

  /// Lock `bounds` for writing. Blocks until no other handle holds an
  /// overlapping region.
  ///
  /// A thread holding a write handle must not take any other handle until
  /// it is released: leaf locks are exclusive and not reentrant. Several
  /// read handles per thread are fine.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "data::begin_set"))]
  pub fn begin_set(&self, bounds: IntBox, name: &'static str) -> LockHandle<'_> {
    let mut nodes = LockedNodes::new();
    lock::lock_write(&self.root, &bounds, &self.next_id, &mut nodes);
    LockHandle::new(self.store_id, LockKind::Write, bounds, name, nodes)
  }

  pub fn end_set(&self, lock: LockHandle<'_>) {
    debug_assert_eq!(lock.store, self.store_id, "lock handle from another store");
    debug_assert_eq!(lock.kind, LockKind::Write, "end_set on a read lock");
    lock.release();
  }

  /// Trade a read handle for a write handle over the same box.
  ///
  /// NOT atomic: the read locks are released before the write locks are
  /// taken, so another writer may get in between. Re-check anything read
  /// under the old handle.
  pub fn promote<'a>(&'a self, lock: LockHandle<'a>) -> LockHandle<'a> {
    debug_assert_eq!(lock.kind, LockKind::Read, "only read handles can be promoted");
    let bounds = lock.bounds;
    let name = lock.name;
    self.end_get(lock);
    self.begin_set(bounds, name)
  }

  #[inline]
  fn check_access(&self, lock: &LockHandle<'_>, p: IVec3, write: bool) {
    debug_assert_eq!(lock.store, self.store_id, "lock handle from another store");
    debug_assert!(
      !write || lock.kind == LockKind::Write,
      "write through read lock '{}'",
      lock.name
    );
    debug_assert!(
      lock.bounds.is_inside(p),
      "{p} outside lock '{}' {:?}",
      lock.name,
      lock.bounds
    );
  }

  // ===========================================================================
  // Point access
  // ===========================================================================

  pub fn get_value(&self, lock: &LockHandle<'_>, p: IVec3) -> f32 {
    self.check_access(lock, p, false);
    if self.is_in_world(p) {
      // SAFETY: `lock` covers `p`, so every node on its path is locked.
      let node = unsafe { octree::find_node(&self.root, p) };
      if let Some(values) = unsafe { node.state() }.buffers().and_then(|b| b.values.as_deref()) {
        return values[chunk_index(p)];
      }
    }
    self.generator.read().value(p)
  }

  pub fn get_material(&self, lock: &LockHandle<'_>, p: IVec3) -> Material {
    self.check_access(lock, p, false);
    if self.is_in_world(p) {
      // SAFETY: as in `get_value`.
      let node = unsafe { octree::find_node(&self.root, p) };
      if let Some(materials) = unsafe { node.state() }
        .buffers()
        .and_then(|b| b.materials.as_deref())
      {
        return materials[chunk_index(p)];
      }
    }
    self.generator.read().material(p)
  }

  pub fn get_value_and_material(&self, lock: &LockHandle<'_>, p: IVec3) -> (f32, Material) {
    (self.get_value(lock, p), self.get_material(lock, p))
  }

  pub fn set_value(&self, lock: &LockHandle<'_>, p: IVec3, value: f32) {
    self.check_access(lock, p, true);
    let Some(chunk) = self.edit_chunk(p) else {
      return;
    };
    // SAFETY: `edit_chunk` returns a chunk exclusively held through `lock`.
    let buffers = unsafe { chunk_buffers_mut(chunk) };
    let index = chunk_index(p);
    let values = buffers
      .values
      .get_or_insert_with(|| self.generated_values(chunk.min()));
    values[index] = value;
    if self.config.multiplayer {
      self.diffs.lock().push_value(chunk.id(), chunk.min(), index, value);
    }
  }

  pub fn set_material(&self, lock: &LockHandle<'_>, p: IVec3, material: Material) {
    self.check_access(lock, p, true);
    let Some(chunk) = self.edit_chunk(p) else {
      return;
    };
    // SAFETY: as in `set_value`.
    let buffers = unsafe { chunk_buffers_mut(chunk) };
    let index = chunk_index(p);
    let materials = buffers
      .materials
      .get_or_insert_with(|| self.generated_materials(chunk.min()));
    materials[index] = material;
    if self.config.multiplayer {
      self
        .diffs
        .lock()
        .push_material(chunk.id(), chunk.min(), index, material);
    }
  }

  pub fn set_value_and_material(&self, lock: &LockHandle<'_>, p: IVec3, value: f32, material: Material) {
    self.set_value(lock, p, value);
    self.set_material(lock, p, material);
  }

  /// Chunk owning `p`, split out of the tree if needed. `None` outside the
  /// world.
  fn edit_chunk(&self, p: IVec3) -> Option<&Node> {
    debug_assert!(self.is_in_world(p), "write outside the world at {p}");
    if !self.is_in_world(p) {
      return None;
    }
    // SAFETY: the caller's write handle covers `p`: branches on the path are
    // locked shared and the first non-branch node is held exclusively.
    Some(unsafe { octree::find_or_create_chunk(&self.root, p, &self.next_id) })
  }

  fn generated_values(&self, min: IVec3) -> Box<[f32]> {
    let mut values = new_buffer::<f32>();
    self
      .generator
      .read()
      .sample_region(Some(&mut values), None, None, &chunk_region(min));
    values
  }

  fn generated_materials(&self, min: IVec3) -> Box<[Material]> {
    let mut materials = new_buffer::<Material>();
    self
      .generator
      .read()
      .sample_region(None, Some(&mut materials), None, &chunk_region(min));
    materials
  }

  /// Normalized central-difference gradient of the value field at `p`.
  ///
  /// `lock` must cover the 3×3×3 neighbourhood of `p`.
  pub fn get_gradient(&self, lock: &LockHandle<'_>, p: IVec3) -> Vec3 {
    let axis = |d: IVec3| self.get_value(lock, p + d) - self.get_value(lock, p - d);
    Vec3::new(axis(IVec3::X), axis(IVec3::Y), axis(IVec3::Z)).normalize_or_zero()
  }

  // ===========================================================================
  // Region access
  // ===========================================================================

  /// Strided read into caller arrays, laid out as described by `region`.
  ///
  /// Samples outside the world come from the generator.
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, name = "data::get_values_and_materials")
  )]
  pub fn get_values_and_materials(
    &self,
    lock: &LockHandle<'_>,
    mut values: Option<&mut [f32]>,
    mut materials: Option<&mut [Material]>,
    region: &SampleRegion,
  ) {
    if region.sample_count() == 0 {
      return;
    }
    let last = region.position(region.size.x - 1, region.size.y - 1, region.size.z - 1);
    let samples = IntBox::new(region.start, last + IVec3::ONE);
    debug_assert!(
      lock.bounds.covers(&samples),
      "region {samples:?} outside lock '{}' {:?}",
      lock.name,
      lock.bounds
    );
    debug_assert!(values.as_ref().map_or(true, |v| v.len() >= region.array_len()));
    debug_assert!(materials.as_ref().map_or(true, |m| m.len() >= region.array_len()));

    let generator = self.generator();
    if !self.bounds().covers(&samples) {
      generator.sample_region(values.as_deref_mut(), materials.as_deref_mut(), None, region);
    }
    // SAFETY: the region lies inside `lock`, so every node it touches is
    // locked.
    unsafe { read_region(&self.root, generator.as_ref(), values, materials, region) };
  }

  /// True if nothing in the region was edited and the generator guarantees
  /// it is empty.
  pub fn is_empty(&self, lock: &LockHandle<'_>, start: IVec3, step: i32, size: IVec3) -> bool {
    let region = IntBox::new(start, start + size * step);
    debug_assert!(lock.bounds.intersects(&region) || region.is_empty());
    if !self.generator.read().is_empty(start, step, size) {
      return false;
    }
    // SAFETY: nodes intersecting the lock box are locked.
    !unsafe { has_buffers(&self.root, &region.overlap(&lock.bounds)) }
  }

  // ===========================================================================
  // Maintenance
  // ===========================================================================

  /// Revert edits to the generator, letting `predicate` prune the octree
  /// top-down. Returns the number of buffers freed.
  ///
  /// The predicate is expected to be monotonic: `Keep` for a box should not
  /// become `Discard` for a sub-box. This is not checked.
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, name = "data::discard_values_by_predicate")
  )]
  pub fn discard_values_by_predicate(&self, mut predicate: impl FnMut(&IntBox) -> DiscardAction) -> usize {
    let guard = RootGuard::new(&self.root);
    let generator = self.generator();
    // SAFETY: the root is held exclusively.
    let freed = unsafe { discard(guard.root(), generator.as_ref(), &mut predicate) };
    log::debug!("discarded {freed} buffers");
    freed
  }

  /// Free buffers identical to the generator and collapse empty branches.
  /// Returns the number of buffers freed.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "data::compact"))]
  pub fn compact(&self) -> usize {
    let start = Instant::now();
    let guard = RootGuard::new(&self.root);
    let generator = self.generator();
    // SAFETY: the root is held exclusively.
    let freed = unsafe { compact(guard.root(), generator.as_ref()) };
    log::debug!("compacted {freed} buffers in {:?}", start.elapsed());
    freed
  }

  /// Swap the fallback generator. Waits for every outstanding handle.
  pub fn set_world_generator(&self, generator: Arc<dyn WorldGenerator>) {
    let _guard = RootGuard::new(&self.root);
    *self.generator.write() = generator;
    log::info!("world generator replaced");
  }

  /// Swap the fallback generator, but keep what the old one produced inside
  /// the sphere by writing it out as explicit chunk data first.
  pub fn set_world_generator_preserving_sphere(
    &self,
    generator: Arc<dyn WorldGenerator>,
    center: IVec3,
    radius: f32,
  ) {
    let guard = RootGuard::new(&self.root);
    let old = self.generator();
    let sphere = IntBox::around(center, radius).overlap(&self.bounds());
    let inside = |p: IVec3| (p - center).as_vec3().length() < radius;
    let mut preserved = 0;

    if !sphere.is_empty() {
      // chunk coordinates; origins are aligned so the division is exact
      let first = chunk_origin(sphere.min) / CHUNK_SIZE;
      let last = chunk_origin(sphere.max - IVec3::ONE) / CHUNK_SIZE;
      for origin in IntBox::new(first, last + IVec3::ONE).iter().map(|c| c * CHUNK_SIZE) {
        let cells: Vec<usize> = (0..CHUNK_VOLUME)
          .filter(|&i| inside(origin + local_position(i)))
          .collect();
        if cells.is_empty() {
          continue;
        }
        // SAFETY: the root is held exclusively.
        let chunk = unsafe { octree::find_or_create_chunk(guard.root(), origin, &self.next_id) };
        let buffers = unsafe { chunk_buffers_mut(chunk) };
        let region = chunk_region(origin);
        if buffers.values.is_none() {
          let mut kept = new_buffer::<f32>();
          let mut fresh = new_buffer::<f32>();
          old.sample_region(Some(&mut kept), None, None, &region);
          generator.sample_region(Some(&mut fresh), None, None, &region);
          for &i in &cells {
            fresh[i] = kept[i];
          }
          buffers.values = Some(fresh);
        }
        if buffers.materials.is_none() {
          let mut kept = new_buffer::<Material>();
          let mut fresh = new_buffer::<Material>();
          old.sample_region(None, Some(&mut kept), None, &region);
          generator.sample_region(None, Some(&mut fresh), None, &region);
          for &i in &cells {
            fresh[i] = kept[i];
          }
          buffers.materials = Some(fresh);
        }
        preserved += 1;
      }
    }

    *self.generator.write() = generator;
    log::info!("world generator replaced, preserved {preserved} chunks around {center}");
  }

  /// Number of chunks holding at least one buffer.
  pub fn dirty_chunk_count(&self) -> usize {
    let lock = self.begin_get(self.bounds(), "dirty_chunk_count");
    let mut count = 0;
    // SAFETY: the whole world is read locked.
    unsafe { octree::visit_chunks(&self.root, &mut |_, _| count += 1) };
    self.end_get(lock);
    count
  }

  // ===========================================================================
  // Save / load
  // ===========================================================================

  /// Snapshot every dirty chunk. Non-destructive.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "data::get_save"))]
  pub fn get_save(&self) -> WorldSave {
    let start = Instant::now();
    let lock = self.begin_get(self.bounds(), "save");
    let mut chunks = Vec::new();
    // SAFETY: the whole world is read locked.
    unsafe {
      octree::visit_chunks(&self.root, &mut |node, buffers| {
        chunks.push(ChunkSave {
          id: node.id(),
          position: node.min(),
          values: buffers.values.as_ref().map(|v| v.to_vec()),
          materials: buffers.materials.as_ref().map(|m| m.to_vec()),
        })
      })
    };
    self.end_get(lock);

    let save = WorldSave::from_chunks(self.depth(), &chunks);
    log::info!(
      "saved {} chunks ({} bytes) in {:?}",
      chunks.len(),
      save.data.len(),
      start.elapsed()
    );
    save
  }

  /// Install a save and return every cell whose value or material changed.
  ///
  /// With `reset`, chunks missing from the save revert to the generator.
  /// The save is fully decoded and validated before the store is touched;
  /// on error the store is unchanged.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "data::load_from_save"))]
  pub fn load_from_save(&self, save: &WorldSave, reset: bool) -> DataResult<Vec<IVec3>> {
    let start = Instant::now();
    if save.depth != self.depth() as i32 {
      log::warn!("rejected save of depth {}", save.depth);
      return Err(DataError::DepthMismatch {
        expected: self.depth(),
        found: save.depth,
      });
    }
    let chunks = save.chunks().inspect_err(|e| log::warn!("rejected save: {e}"))?;
    self.validate_leaves(chunks.iter().map(|c| (c.id, c.position)))?;

    let guard = RootGuard::new(&self.root);
    let root = guard.root();
    let generator = self.generator();
    self.reserve_ids(chunks.iter().map(|c| c.id));
    // SAFETY: the root is held exclusively for the rest of this function.
    let mut by_id = unsafe { node_ids(root) };
    let mut diffs = self.diffs.lock();
    let mut modified = Vec::new();

    if reset {
      let saved: HashSet<IVec3> = chunks.iter().map(|c| c.position).collect();
      let mut stale = Vec::new();
      unsafe {
        octree::visit_chunks(root, &mut |node, _| {
          if !saved.contains(&node.min()) {
            stale.push(node);
          }
        })
      };
      for node in stale {
        unsafe { replace_buffers(node, ChunkBuffers::default(), generator.as_ref(), &mut modified) };
      }
    }

    for chunk in chunks {
      let node = unsafe { octree::find_or_create_chunk(root, chunk.position, &self.next_id) };
      let buffers = ChunkBuffers {
        values: chunk.values.map(Vec::into_boxed_slice),
        materials: chunk.materials.map(Vec::into_boxed_slice),
      };
      unsafe { replace_buffers(node, buffers, generator.as_ref(), &mut modified) };
      self.adopt_id(node, chunk.id, &mut by_id, &mut diffs);
    }

    log::info!(
      "loaded save ({} bytes, reset {reset}): {} cells modified in {:?}",
      save.data.len(),
      modified.len(),
      start.elapsed()
    );
    Ok(modified)
  }

  // ===========================================================================
  // Diffs
  // ===========================================================================

  /// Drain the diffs recorded since the last call. Empty unless the store
  /// runs in multiplayer mode.
  pub fn take_diffs(&self) -> DiffPacket {
    self.diffs.lock().take()
  }

  /// Replay a peer's diffs in order and return the cells that changed.
  ///
  /// The packet is validated before anything is written.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "data::apply_diffs"))]
  pub fn apply_diffs(&self, packet: &DiffPacket) -> DataResult<Vec<IVec3>> {
    self.validate_diff_leaves(&packet.leaves)?;
    let slots = packet.leaves.len();
    let edits = packet
      .values
      .iter()
      .map(|d| (d.leaf, d.index))
      .chain(packet.materials.iter().map(|d| (d.leaf, d.index)));
    for (leaf, index) in edits {
      if leaf as usize >= slots {
        return Err(DataError::UnknownLeaf(leaf));
      }
      if index as usize >= CHUNK_VOLUME {
        return Err(DataError::DiffIndexOutOfRange { leaf, index });
      }
    }

    let guard = RootGuard::new(&self.root);
    let root = guard.root();
    self.reserve_ids(packet.leaves.iter().map(|l| l.id));
    // SAFETY: the root is held exclusively for the rest of this function.
    let mut by_id = unsafe { node_ids(root) };
    let mut diffs = self.diffs.lock();
    // records are adopted in order, so a position listed under successive
    // ids ends up with the last one
    let mut leaves: Vec<&Node> = Vec::with_capacity(slots);
    for leaf in &packet.leaves {
      let node = unsafe { octree::find_or_create_chunk(root, leaf.position, &self.next_id) };
      self.adopt_id(node, leaf.id, &mut by_id, &mut diffs);
      leaves.push(node);
    }
    drop(diffs);

    let mut seen = HashSet::new();
    let mut modified = Vec::new();
    for diff in &packet.values {
      let node = leaves[diff.leaf as usize];
      let index = diff.index as usize;
      let buffers = unsafe { chunk_buffers_mut(node) };
      let values = buffers
        .values
        .get_or_insert_with(|| self.generated_values(node.min()));
      if values[index].to_bits() != diff.value.to_bits() {
        values[index] = diff.value;
        let p = node.min() + local_position(index);
        if seen.insert(p) {
          modified.push(p);
        }
      }
    }
    for diff in &packet.materials {
      let node = leaves[diff.leaf as usize];
      let index = diff.index as usize;
      let buffers = unsafe { chunk_buffers_mut(node) };
      let materials = buffers
        .materials
        .get_or_insert_with(|| self.generated_materials(node.min()));
      if materials[index] != diff.material {
        materials[index] = diff.material;
        let p = node.min() + local_position(index);
        if seen.insert(p) {
          modified.push(p);
        }
      }
    }
    log::debug!(
      "applied {} diffs over {} leaves, {} cells modified",
      packet.len(),
      packet.leaves.len(),
      modified.len()
    );
    Ok(modified)
  }

  // ===========================================================================
  // Leaf ids
  // ===========================================================================

  /// Chunk aligned, inside the world, no duplicate ids or positions.
  fn validate_leaves(&self, leaves: impl Iterator<Item = (u64, IVec3)>) -> DataResult<()> {
    let mut ids = HashSet::new();
    let mut positions = HashSet::new();
    for (id, position) in leaves {
      if chunk_origin(position) != position || !self.is_in_world(position) {
        return Err(DataError::ChunkOutOfWorld(position));
      }
      if !positions.insert(position) {
        return Err(DataError::CorruptSave(format!("duplicate chunk at {position}")));
      }
      if !ids.insert(id) {
        return Err(DataError::CorruptSave(format!("duplicate leaf id {id}")));
      }
    }
    Ok(())
  }

  /// Chunk aligned, inside the world, and no id listed at two positions.
  /// A position may repeat under different ids.
  fn validate_diff_leaves(&self, leaves: &[LeafRecord]) -> DataResult<()> {
    let mut positions: HashMap<u64, IVec3> = HashMap::with_capacity(leaves.len());
    for leaf in leaves {
      let position = leaf.position;
      if chunk_origin(position) != position || !self.is_in_world(position) {
        return Err(DataError::ChunkOutOfWorld(position));
      }
      let first = *positions.entry(leaf.id).or_insert(position);
      if first != position {
        return Err(DataError::CorruptSave(format!(
          "leaf id {} listed at {first} and {position}",
          leaf.id
        )));
      }
    }
    Ok(())
  }

  /// Keep freshly assigned ids clear of ids about to be adopted.
  fn reserve_ids(&self, ids: impl Iterator<Item = u64>) {
    if let Some(max) = ids.max() {
      self.next_id.fetch_max(max.saturating_add(1), Ordering::Relaxed);
    }
  }

  /// Give `node` the id `id`, re-keying whichever node held it before.
  ///
  /// `diffs` follows along: edits recorded under an id keep naming the chunk
  /// they were made in, and `id` ends up naming `node`'s position only.
  fn adopt_id<'a>(
    &self,
    node: &'a Node,
    id: u64,
    by_id: &mut HashMap<u64, &'a Node>,
    diffs: &mut DiffLog,
  ) {
    let current = node.id();
    if current == id {
      return;
    }
    let fresh = || self.next_id.fetch_add(1, Ordering::Relaxed);
    if let Some(other) = by_id.remove(&id) {
      let moved = fresh();
      other.set_id(moved);
      diffs.rename(id, moved, other.min());
      by_id.insert(moved, other);
    }
    // slots left over from chunks that were dropped since
    diffs.retire(id, node.min(), fresh);
    diffs.rename(current, id, node.min());
    if by_id.get(&current).is_some_and(|n| std::ptr::eq(*n, node)) {
      by_id.remove(&current);
    }
    node.set_id(id);
    by_id.insert(id, node);
  }
}

// =============================================================================
// Tree walkers
// =============================================================================

#[inline]
fn chunk_region(min: IVec3) -> SampleRegion {
  SampleRegion::new(min, 1, IVec3::splat(CHUNK_SIZE))
}

#[inline]
fn local_position(index: usize) -> IVec3 {
  let (x, y, z) = index_to_local(index);
  IVec3::new(x as i32, y as i32, z as i32)
}

/// Buffers of a height 0 node, turning `Unmodified` into an empty chunk.
///
/// # Safety
/// The node must be exclusively held by the caller (directly or through an
/// ancestor) and no other reference to its state may be alive.
#[allow(clippy::mut_from_ref)]
unsafe fn chunk_buffers_mut(node: &Node) -> &mut ChunkBuffers {
  debug_assert_eq!(node.height(), 0);
  let state = node.state_mut();
  if matches!(state, NodeState::Unmodified) {
    *state = NodeState::Chunk(ChunkBuffers::default());
  }
  match state {
    NodeState::Chunk(buffers) => buffers,
    NodeState::Unmodified | NodeState::Branch(_) => unreachable!("height 0 nodes never branch"),
  }
}

/// Every node by id.
///
/// # Safety
/// The whole tree must be locked by the caller.
unsafe fn node_ids(root: &Node) -> HashMap<u64, &Node> {
  let mut map = HashMap::new();
  octree::visit(root, &mut |node| {
    map.insert(node.id(), node);
  });
  map
}

/// Swap a chunk's buffers, appending every cell whose resolved value or
/// material changes to `modified`.
///
/// # Safety
/// Same contract as [`chunk_buffers_mut`].
unsafe fn replace_buffers(
  node: &Node,
  new: ChunkBuffers,
  generator: &dyn WorldGenerator,
  modified: &mut Vec<IVec3>,
) {
  let old = match std::mem::replace(node.state_mut(), NodeState::Unmodified) {
    NodeState::Chunk(buffers) => buffers,
    _ => ChunkBuffers::default(),
  };
  let region = chunk_region(node.min());

  let generated_values = (old.values.is_none() != new.values.is_none()).then(|| {
    let mut values = new_buffer::<f32>();
    generator.sample_region(Some(&mut values), None, None, &region);
    values
  });
  let generated_materials = (old.materials.is_none() != new.materials.is_none()).then(|| {
    let mut materials = new_buffer::<Material>();
    generator.sample_region(None, Some(&mut materials), None, &region);
    materials
  });

  for index in 0..CHUNK_VOLUME {
    let value = |buffer: &Option<Box<[f32]>>| {
      buffer
        .as_ref()
        .or(generated_values.as_ref())
        .map(|v| v[index].to_bits())
    };
    let material = |buffer: &Option<Box<[Material]>>| {
      buffer
        .as_ref()
        .or(generated_materials.as_ref())
        .map(|m| m[index])
    };
    if value(&old.values) != value(&new.values) || material(&old.materials) != material(&new.materials) {
      modified.push(node.min() + local_position(index));
    }
  }

  if !new.is_empty() {
    *node.state_mut() = NodeState::Chunk(new);
  }
}

/// # Safety
/// Every node the region touches must be locked by the caller.
unsafe fn read_region(
  node: &Node,
  generator: &dyn WorldGenerator,
  mut values: Option<&mut [f32]>,
  mut materials: Option<&mut [Material]>,
  region: &SampleRegion,
) {
  let Some(sub) = region.clip(&node.bounds()) else {
    return;
  };
  match node.state() {
    NodeState::Branch(children) => {
      for child in children.iter() {
        read_region(
          child,
          generator,
          values.as_deref_mut(),
          materials.as_deref_mut(),
          &sub,
        );
      }
    }
    NodeState::Chunk(buffers) => {
      let generate_values = values.is_some() && buffers.values.is_none();
      let generate_materials = materials.is_some() && buffers.materials.is_none();
      if generate_values || generate_materials {
        generator.sample_region(
          values.as_deref_mut().filter(|_| generate_values),
          materials.as_deref_mut().filter(|_| generate_materials),
          None,
          &sub,
        );
      }
      if let (Some(out), Some(src)) = (values.as_deref_mut(), buffers.values.as_deref()) {
        sub.for_each(|p, index| out[index] = src[chunk_index(p)]);
      }
      if let (Some(out), Some(src)) = (materials.as_deref_mut(), buffers.materials.as_deref()) {
        sub.for_each(|p, index| out[index] = src[chunk_index(p)]);
      }
    }
    NodeState::Unmodified => generator.sample_region(values, materials, None, &sub),
  }
}

/// # Safety
/// Every node intersecting `bounds` must be locked by the caller.
unsafe fn has_buffers(node: &Node, bounds: &IntBox) -> bool {
  if !node.bounds().intersects(bounds) {
    return false;
  }
  match node.state() {
    NodeState::Branch(children) => children.iter().any(|child| has_buffers(child, bounds)),
    NodeState::Chunk(buffers) => !buffers.is_empty(),
    NodeState::Unmodified => false,
  }
}

/// # Safety
/// The subtree must be held exclusively by the caller.
unsafe fn count_buffers(node: &Node) -> usize {
  let mut count = 0;
  octree::visit_chunks(node, &mut |_, buffers| count += buffers.buffer_count());
  count
}

/// Collapse a branch whose children are all unmodified.
///
/// # Safety
/// The subtree must be held exclusively by the caller.
unsafe fn collapse_if_unmodified(node: &Node) {
  let collapse = match node.state() {
    NodeState::Branch(children) => children
      .iter()
      .all(|child| matches!(child.state(), NodeState::Unmodified)),
    _ => false,
  };
  if collapse {
    *node.state_mut() = NodeState::Unmodified;
  }
}

/// # Safety
/// The subtree must be held exclusively by the caller.
unsafe fn discard(
  node: &Node,
  generator: &dyn WorldGenerator,
  predicate: &mut impl FnMut(&IntBox) -> DiscardAction,
) -> usize {
  match predicate(&node.bounds()) {
    DiscardAction::Keep => 0,
    DiscardAction::Discard => {
      let freed = count_buffers(node);
      *node.state_mut() = NodeState::Unmodified;
      freed
    }
    DiscardAction::Subdivide => {
      let freed = match node.state_mut() {
        NodeState::Branch(children) => children
          .iter()
          .map(|child| discard(child, generator, &mut *predicate))
          .sum(),
        NodeState::Chunk(buffers) => {
          discard_cells(node.min(), buffers, generator, &mut *predicate);
          0
        }
        NodeState::Unmodified => 0,
      };
      collapse_if_unmodified(node);
      freed
    }
  }
}

/// Per-voxel pass inside a chunk: discarded cells get their generator value
/// and material back.
fn discard_cells(
  min: IVec3,
  buffers: &mut ChunkBuffers,
  generator: &dyn WorldGenerator,
  predicate: &mut impl FnMut(&IntBox) -> DiscardAction,
) {
  let mut generated: Option<(Box<[f32]>, Box<[Material]>)> = None;
  for index in 0..CHUNK_VOLUME {
    let p = min + local_position(index);
    match predicate(&IntBox::from_point(p)) {
      DiscardAction::Keep => {}
      DiscardAction::Subdivide => {
        debug_assert!(false, "cannot subdivide the single voxel {p}");
      }
      DiscardAction::Discard => {
        let (values, materials) = generated.get_or_insert_with(|| {
          let mut values = new_buffer::<f32>();
          let mut materials = new_buffer::<Material>();
          generator.sample_region(Some(&mut values), Some(&mut materials), None, &chunk_region(min));
          (values, materials)
        });
        if let Some(v) = buffers.values.as_deref_mut() {
          v[index] = values[index];
        }
        if let Some(m) = buffers.materials.as_deref_mut() {
          m[index] = materials[index];
        }
      }
    }
  }
}

/// # Safety
/// The subtree must be held exclusively by the caller.
unsafe fn compact(node: &Node, generator: &dyn WorldGenerator) -> usize {
  let freed = match node.state_mut() {
    NodeState::Branch(children) => children.iter().map(|child| compact(child, generator)).sum(),
    NodeState::Chunk(buffers) => {
      let region = chunk_region(node.min());
      let mut freed = 0;
      if let Some(values) = &buffers.values {
        let mut generated = new_buffer::<f32>();
        generator.sample_region(Some(&mut generated), None, None, &region);
        if values.iter().zip(generated.iter()).all(|(a, b)| a.to_bits() == b.to_bits()) {
          buffers.values = None;
          freed += 1;
        }
      }
      if let Some(materials) = &buffers.materials {
        let mut generated = new_buffer::<Material>();
        generator.sample_region(None, Some(&mut generated), None, &region);
        if **materials == *generated {
          buffers.materials = None;
          freed += 1;
        }
      }
      if buffers.is_empty() {
        *node.state_mut() = NodeState::Unmodified;
      }
      freed
    }
    NodeState::Unmodified => 0,
  };
  collapse_if_unmodified(node);
  freed
}

#[cfg(test)]
#[path = "data_test.rs"]
mod data_test;
