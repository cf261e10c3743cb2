use super::*;
use crate::rle::RleError;

fn chunk(id: u64, position: IVec3, values: bool, materials: bool) -> ChunkSave {
  ChunkSave {
    id,
    position,
    values: values.then(|| (0..CHUNK_VOLUME).map(|i| (i % 7) as f32 * 0.25 - 1.0).collect()),
    materials: materials.then(|| vec![Material::from_index(id as u8); CHUNK_VOLUME]),
  }
}

#[test]
fn test_empty_save_roundtrip() {
  let save = WorldSave::from_chunks(4, &[]);
  assert_eq!(save.depth, 4);
  assert_eq!(save.chunks().unwrap(), vec![]);
}

#[test]
fn test_roundtrip_mixed_flags() {
  let chunks = vec![
    chunk(1, IVec3::ZERO, true, true),
    chunk(2, IVec3::new(-16, 0, 32), true, false),
    chunk(3, IVec3::new(16, 16, 16), false, true),
  ];
  let save = WorldSave::from_chunks(3, &chunks);
  assert_eq!(save.chunks().unwrap(), chunks);
}

#[test]
fn test_header_layout() {
  let save = WorldSave::from_chunks(2, &[chunk(0x0102, IVec3::new(16, -16, 0), true, false)]);
  let d = &save.data;
  assert_eq!(&d[0..4], &SAVE_VERSION.to_le_bytes());
  assert_eq!(&d[4..8], &1u32.to_le_bytes());
  assert_eq!(&d[8..16], &0x0102u64.to_le_bytes());
  assert_eq!(&d[16..20], &16i32.to_le_bytes());
  assert_eq!(&d[20..24], &(-16i32).to_le_bytes());
  assert_eq!(d[28], 1);
}

#[test]
fn test_bad_version_rejected() {
  let mut save = WorldSave::from_chunks(2, &[]);
  save.data[0] = 9;
  assert!(matches!(save.chunks(), Err(DataError::UnsupportedVersion(9))));
}

#[test]
fn test_truncated_save_rejected() {
  let mut save = WorldSave::from_chunks(2, &[chunk(1, IVec3::ZERO, true, true)]);
  save.data.truncate(save.data.len() - 3);
  assert!(save.chunks().is_err());
}

#[test]
fn test_trailing_bytes_rejected() {
  let mut save = WorldSave::from_chunks(2, &[chunk(1, IVec3::ZERO, false, true)]);
  save.data.push(0);
  assert!(matches!(save.chunks(), Err(DataError::CorruptSave(_))));
}

#[test]
fn test_huge_chunk_count_rejected_before_allocating() {
  let mut save = WorldSave::from_chunks(2, &[]);
  save.data[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
  assert!(matches!(save.chunks(), Err(DataError::CorruptSave(_))));
}

#[test]
fn test_flag_without_payload_is_length_mismatch() {
  let mut save = WorldSave::from_chunks(2, &[chunk(1, IVec3::ZERO, false, true)]);
  // claim a value buffer that was never written
  save.data[28] |= 1;
  assert!(matches!(
    save.chunks(),
    Err(DataError::Rle(RleError::LengthMismatch { .. }))
  ));
}

#[test]
fn test_unknown_flags_rejected() {
  let mut save = WorldSave::from_chunks(2, &[chunk(1, IVec3::ZERO, true, false)]);
  save.data[28] = 0x80;
  assert!(matches!(save.chunks(), Err(DataError::CorruptSave(_))));
}
