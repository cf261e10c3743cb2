use super::*;

#[test]
fn test_log_keeps_insertion_order_and_duplicates() {
  let mut log = DiffLog::default();
  let a = IVec3::ZERO;
  log.push_value(3, a, 10, 0.5);
  log.push_value(3, a, 10, -0.5);
  log.push_material(3, a, 10, Material::from_index(2));

  let packet = log.take();
  assert_eq!(packet.len(), 3);
  assert_eq!(packet.values[0].value, 0.5);
  assert_eq!(packet.values[1].value, -0.5);
  assert_eq!(packet.materials[0].material, Material::from_index(2));
  assert_eq!(packet.leaves, vec![LeafRecord { id: 3, position: a }]);
}

#[test]
fn test_leaves_listed_once_in_first_use_order() {
  let mut log = DiffLog::default();
  log.push_value(9, IVec3::splat(16), 0, 1.0);
  log.push_material(4, IVec3::ZERO, 0, Material::default());
  log.push_value(9, IVec3::splat(16), 1, 1.0);
  let packet = log.take();
  let ids: Vec<_> = packet.leaves.iter().map(|l| l.id).collect();
  assert_eq!(ids, vec![9, 4]);
}

#[test]
fn test_take_drains() {
  let mut log = DiffLog::default();
  log.push_value(1, IVec3::ZERO, 0, 1.0);
  assert!(!log.take().is_empty());
  let again = log.take();
  assert!(again.is_empty());
  assert!(again.leaves.is_empty());

  // a leaf drained once is listed again on its next use
  log.push_value(1, IVec3::ZERO, 0, 1.0);
  assert_eq!(log.take().leaves.len(), 1);
}

#[test]
fn test_same_position_under_new_id_gets_its_own_slot() {
  let mut log = DiffLog::default();
  log.push_value(25, IVec3::ZERO, 0, 0.5);
  log.push_value(57, IVec3::ZERO, 0, 0.25);
  log.push_value(25, IVec3::ZERO, 1, 0.75);
  let packet = log.take();
  assert_eq!(
    packet.leaves,
    vec![
      LeafRecord { id: 25, position: IVec3::ZERO },
      LeafRecord { id: 57, position: IVec3::ZERO },
    ]
  );
  let slots: Vec<_> = packet.values.iter().map(|d| d.leaf).collect();
  assert_eq!(slots, vec![0, 1, 0]);
}

#[test]
fn test_rename_relabels_logged_slots() {
  let mut log = DiffLog::default();
  let p = IVec3::new(16, 0, 0);
  log.push_value(4, p, 0, 1.0);
  log.push_value(4, IVec3::ZERO, 0, 1.0);
  log.rename(4, 30, p);

  // later writes under the new id reuse the relabelled slot
  log.push_value(30, p, 1, 2.0);
  let packet = log.take();
  assert_eq!(packet.leaves[0], LeafRecord { id: 30, position: p });
  assert_eq!(packet.leaves[1], LeafRecord { id: 4, position: IVec3::ZERO });
  assert_eq!(packet.leaves.len(), 2);
  assert_eq!(packet.values[2].leaf, 0);
}

#[test]
fn test_retire_moves_other_positions_off_an_id() {
  let mut log = DiffLog::default();
  let a = IVec3::ZERO;
  let b = IVec3::splat(-64);
  log.push_value(25, a, 0, 0.5);
  log.push_value(25, b, 0, -0.5);

  let mut next = 100;
  log.retire(25, a, || {
    next += 1;
    next
  });
  let packet = log.take();
  assert_eq!(packet.leaves[0], LeafRecord { id: 25, position: a });
  assert_eq!(packet.leaves[1], LeafRecord { id: 101, position: b });
}
