use std::time::Duration;

use glam::IVec3;

use super::*;
use crate::{ConstantGenerator, DataConfig, Material};

fn store() -> Arc<VoxelData> {
  let generator = Arc::new(ConstantGenerator::new(1.0, Material::default()));
  Arc::new(VoxelData::new(DataConfig::default().with_depth(3), generator).unwrap())
}

#[test]
fn test_spawn_and_poll() {
  let executor = TaskExecutor::new();

  let task_id = executor.spawn(|| 42i32);

  // Poll until complete
  let mut result = None;
  for _ in 0..1000 {
    if let Some(r) = executor.poll::<i32>(task_id) {
      result = Some(r);
      break;
    }
    std::thread::sleep(Duration::from_millis(1));
  }

  assert_eq!(result, Some(42));
  assert!(!executor.is_pending(task_id));
}

#[test]
fn test_multiple_tasks_wait() {
  let executor = TaskExecutor::new();
  let ids: Vec<_> = (0..10).map(|i| executor.spawn(move || i * 2)).collect();
  let results: Vec<_> = ids.iter().map(|&id| executor.wait::<i32>(id).unwrap()).collect();
  assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
  assert_eq!(executor.pending_count(), 0);
}

#[test]
fn test_result_claimed_once() {
  let executor = TaskExecutor::new();
  let task_id = executor.spawn(|| "done");
  assert_eq!(executor.wait::<&str>(task_id), Some("done"));
  assert_eq!(executor.wait::<&str>(task_id), None);
  assert_eq!(executor.poll::<&str>(task_id), None);
}

#[test]
fn test_wrong_type_is_none() {
  let executor = TaskExecutor::new();
  let task_id = executor.spawn(|| 1u8);
  assert_eq!(executor.wait::<u32>(task_id), None);
}

#[test]
fn test_clones_share_results() {
  let executor = TaskExecutor::new();
  let other = executor.clone();
  let task_id = executor.spawn(|| 7u64);
  assert_eq!(other.wait::<u64>(task_id), Some(7));
}

#[test]
fn test_num_threads() {
  assert!(TaskExecutor::default().num_threads() >= 1);
}

#[test]
fn test_spawn_edit_then_query() {
  let executor = TaskExecutor::new();
  let data = store();
  let p = IVec3::new(3, -4, 5);

  let edit = executor.spawn_edit(Arc::clone(&data), IntBox::from_point(p), move |data, lock| {
    data.set_value(lock, p, -0.5);
    data.get_value(lock, p)
  });
  assert_eq!(executor.wait::<f32>(edit), Some(-0.5));

  let query = executor.spawn_query(Arc::clone(&data), IntBox::from_point(p), move |data, lock| {
    data.get_value(lock, p)
  });
  assert_eq!(executor.wait::<f32>(query), Some(-0.5));
}

#[test]
fn test_concurrent_edits_on_one_cell() {
  let executor = TaskExecutor::new();
  let data = store();
  let p = IVec3::ZERO;
  let bounds = IntBox::from_point(p);

  let ids: Vec<_> = (0..64)
    .map(|_| {
      executor.spawn_edit(Arc::clone(&data), bounds, move |data, lock| {
        let v = data.get_value(lock, p);
        data.set_value(lock, p, v + 1.0);
      })
    })
    .collect();
  for id in ids {
    assert_eq!(executor.wait::<()>(id), Some(()));
  }

  let lock = data.begin_get(bounds, "check");
  assert_eq!(data.get_value(&lock, p), 65.0);
  data.end_get(lock);
}
