//! Asynchronous edits on rayon's thread pool.
//!
//! The store itself is synchronous: every access happens under a lock handle
//! on the calling thread. `TaskExecutor` wraps "take the lock, run the edit,
//! release" into a task so tools can fire edits without blocking.
//!
//! # Usage
//!
//! ```ignore
//! let executor = TaskExecutor::new();
//!
//! let task_id = executor.spawn_edit(Arc::clone(&data), bounds, move |data, lock| {
//!   data.set_value(lock, p, -1.0);
//! });
//!
//! // Poll each frame...
//! if let Some(()) = executor.poll::<()>(task_id) {}
//! // ...or block.
//! executor.wait::<()>(task_id);
//! ```

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::lock::LockHandle;
use crate::{IntBox, VoxelData};

/// Unique identifier for a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
  fn next() -> Self {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    Self(COUNTER.fetch_add(1, Ordering::Relaxed))
  }
}

/// Type-erased task output.
type TaskResult = Box<dyn Any + Send>;

struct Shared {
  /// Results received from the channel but not yet claimed.
  results: Mutex<HashMap<TaskId, TaskResult>>,
  /// Tasks spawned and not yet finished.
  pending: Mutex<HashSet<TaskId>>,
  receiver: Receiver<(TaskId, TaskResult)>,
}

/// Runs closures on rayon's pool and hands their results back by id.
#[derive(Clone)]
pub struct TaskExecutor {
  sender: Sender<(TaskId, TaskResult)>,
  shared: Arc<Shared>,
}

impl TaskExecutor {
  pub fn new() -> Self {
    let (sender, receiver) = crossbeam_channel::unbounded();
    Self {
      sender,
      shared: Arc::new(Shared {
        results: Mutex::new(HashMap::new()),
        pending: Mutex::new(HashSet::new()),
        receiver,
      }),
    }
  }

  /// Spawn `work` on rayon's thread pool (non-blocking).
  pub fn spawn<F, T>(&self, work: F) -> TaskId
  where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
  {
    let task_id = TaskId::next();
    self.shared.pending.lock().insert(task_id);

    let sender = self.sender.clone();
    let shared = Arc::clone(&self.shared);
    rayon::spawn(move || {
      let result: TaskResult = Box::new(work());
      // Send before clearing `pending`: a task that is no longer pending
      // always has its result in the channel or the map.
      if sender.send((task_id, result)).is_err() {
        log::debug!("task {task_id:?} finished after its executor was dropped");
      }
      shared.pending.lock().remove(&task_id);
    });
    task_id
  }

  /// Take a write lock over `bounds`, run `edit`, release.
  pub fn spawn_edit<F, T>(&self, data: Arc<VoxelData>, bounds: IntBox, edit: F) -> TaskId
  where
    F: FnOnce(&VoxelData, &LockHandle<'_>) -> T + Send + 'static,
    T: Send + 'static,
  {
    self.spawn(move || {
      let lock = data.begin_set(bounds, "async edit");
      let result = edit(&data, &lock);
      data.end_set(lock);
      result
    })
  }

  /// Take a read lock over `bounds`, run `query`, release.
  pub fn spawn_query<F, T>(&self, data: Arc<VoxelData>, bounds: IntBox, query: F) -> TaskId
  where
    F: FnOnce(&VoxelData, &LockHandle<'_>) -> T + Send + 'static,
    T: Send + 'static,
  {
    self.spawn(move || {
      let lock = data.begin_get(bounds, "async query");
      let result = query(&data, &lock);
      data.end_get(lock);
      result
    })
  }

  fn drain(&self) {
    let mut results = self.shared.results.lock();
    for (task_id, result) in self.shared.receiver.try_iter() {
      results.insert(task_id, result);
    }
  }

  /// Poll for a task's result (non-blocking).
  ///
  /// `None` if the task is still running, unknown, already claimed, or
  /// produced a different type.
  pub fn poll<T: 'static>(&self, task_id: TaskId) -> Option<T> {
    self.drain();
    let result = self.shared.results.lock().remove(&task_id)?;
    result.downcast::<T>().ok().map(|b| *b)
  }

  /// Block until `task_id` finishes and return its result.
  ///
  /// `None` if the id is unknown or already claimed, or the result has a
  /// different type.
  pub fn wait<T: 'static>(&self, task_id: TaskId) -> Option<T> {
    loop {
      let finished = !self.is_pending(task_id);
      self.drain();
      if let Some(result) = self.shared.results.lock().remove(&task_id) {
        return result.downcast::<T>().ok().map(|b| *b);
      }
      if finished {
        return None;
      }
      // Short timeout so concurrent waiters see results drained by each other.
      if let Ok((id, result)) = self.shared.receiver.recv_timeout(Duration::from_millis(1)) {
        self.shared.results.lock().insert(id, result);
      }
    }
  }

  /// Check if a task is still running.
  pub fn is_pending(&self, task_id: TaskId) -> bool {
    self.shared.pending.lock().contains(&task_id)
  }

  /// Number of tasks queued or running.
  pub fn pending_count(&self) -> usize {
    self.shared.pending.lock().len()
  }

  /// Number of worker threads in rayon's pool.
  pub fn num_threads(&self) -> usize {
    rayon::current_num_threads()
  }
}

impl Default for TaskExecutor {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
#[path = "threading_test.rs"]
mod threading_test;
