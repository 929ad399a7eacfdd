//! Tests for the WAL append engine
//!
//! These tests verify:
//! - Appended operations come back through replay unchanged
//! - No instruction straddles a page boundary
//! - Concurrent appenders receive disjoint ranges
//! - Pointers resolve to the data they were returned for

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use mapwal::volume::{MemoryVolumeFactory, Volume, VolumeFactory};
use mapwal::wal::{Instruction, WalReader};
use mapwal::{ReplaySink, WalConfig, WalError, WalPointer, WriteAheadLog};
use parking_lot::Mutex;
use proptest::prelude::*;

// =============================================================================
// Helper Functions
// =============================================================================

/// Memory factory that keeps a handle on every volume it creates
#[derive(Default)]
struct CapturingFactory {
    volumes: Mutex<Vec<Arc<dyn Volume>>>,
}

impl VolumeFactory for CapturingFactory {
    fn make_volume(&self, path: Option<&Path>) -> mapwal::Result<Arc<dyn Volume>> {
        let volume = MemoryVolumeFactory.make_volume(path)?;
        self.volumes.lock().push(Arc::clone(&volume));
        Ok(volume)
    }
}

fn capturing_wal(page_shift: u32) -> (WriteAheadLog, Arc<CapturingFactory>) {
    let factory = Arc::new(CapturingFactory::default());
    let config = WalConfig::builder().page_shift(page_shift).build();
    let mut wal = WriteAheadLog::with_factory(config, factory.clone()).unwrap();
    wal.start_next_file().unwrap();
    (wal, factory)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Long(u64, u64),
    ByteArray(u64, Vec<u8>),
    Record(u64, Option<Vec<u8>>),
    Tombstone(u64),
}

#[derive(Default)]
struct OpSink {
    ops: Vec<Op>,
}

impl ReplaySink for OpSink {
    fn write_long(&mut self, offset: u64, value: u64) {
        self.ops.push(Op::Long(offset, value));
    }
    fn write_byte_array(&mut self, offset: u64, data: &[u8]) {
        self.ops.push(Op::ByteArray(offset, data.to_vec()));
    }
    fn write_record(&mut self, record_id: u64, data: Option<&[u8]>) {
        self.ops.push(Op::Record(record_id, data.map(<[u8]>::to_vec)));
    }
    fn write_tombstone(&mut self, record_id: u64) {
        self.ops.push(Op::Tombstone(record_id));
    }
}

fn apply(wal: &WriteAheadLog, op: &Op) {
    match op {
        Op::Long(offset, value) => wal.append_long(*offset, *value).unwrap(),
        Op::ByteArray(offset, data) => {
            wal.append_byte_array(*offset, data).unwrap();
        }
        Op::Record(id, data) => {
            wal.append_record(*id, data.as_deref()).unwrap();
        }
        Op::Tombstone(id) => wal.append_tombstone(*id).unwrap(),
    }
}

/// Walk a sealed volume and check every instruction stays inside one page
fn assert_no_straddling(volume: &dyn Volume, page_size: u64) {
    for entry in WalReader::new(volume, 0) {
        let entry = entry.unwrap();
        // a skip-many's own word must fit; the bytes it skips may run to the page end
        let len = match entry.instruction {
            Instruction::SkipMany { .. } => 4,
            _ => entry.len,
        };
        let first = entry.offset / page_size;
        let last = (entry.offset + len - 1) / page_size;
        assert_eq!(first, last, "{:?} at {} straddles a page", entry.instruction, entry.offset);
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..(1 << 48), any::<u64>()).prop_map(|(o, v)| Op::Long(o, v)),
        (0u64..(1 << 48), prop::collection::vec(any::<u8>(), 0..120))
            .prop_map(|(o, d)| Op::ByteArray(o, d)),
        (any::<u64>(), prop::option::of(prop::collection::vec(any::<u8>(), 0..120)))
            .prop_map(|(id, d)| Op::Record(id, d)),
        any::<u64>().prop_map(Op::Tombstone),
    ]
}

// =============================================================================
// Round-trip
// =============================================================================

proptest! {
    #[test]
    fn test_replay_reproduces_appends(
        ops in prop::collection::vec(op_strategy(), 1..60),
        page_shift in 8u32..11,
    ) {
        let (mut wal, factory) = capturing_wal(page_shift);
        for op in &ops {
            apply(&wal, op);
        }
        wal.seal().unwrap();

        let volume = Arc::clone(&factory.volumes.lock()[0]);
        assert_no_straddling(volume.as_ref(), 1 << page_shift);

        let mut sink = OpSink::default();
        wal.replay_wal(&mut sink).unwrap();
        prop_assert_eq!(sink.ops, ops);
    }
}

#[test]
fn test_rotation_resets_cursor() {
    let (mut wal, factory) = capturing_wal(8);
    wal.append_long(1, 1).unwrap();
    wal.seal().unwrap();
    wal.start_next_file().unwrap();
    assert_eq!(wal.cursor(), 16);

    wal.append_long(2, 2).unwrap();
    wal.seal().unwrap();

    assert_eq!(factory.volumes.lock().len(), 2);
    let mut sink = OpSink::default();
    let stats = wal.replay_wal(&mut sink).unwrap();
    assert_eq!(sink.ops, vec![Op::Long(1, 1), Op::Long(2, 2)]);
    assert_eq!(stats.files_replayed, 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_appenders_get_disjoint_ranges() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 500;

    let (mut wal, factory) = capturing_wal(8);
    crossbeam::thread::scope(|s| {
        for t in 0..THREADS {
            let wal = &wal;
            s.spawn(move |_| {
                for i in 0..PER_THREAD {
                    let key = t * PER_THREAD + i;
                    if i % 3 == 0 {
                        wal.append_byte_array(key, &key.to_be_bytes()).unwrap();
                    } else {
                        wal.append_long(key, key * 7).unwrap();
                    }
                }
            });
        }
    })
    .unwrap();
    wal.seal().unwrap();

    let volume = Arc::clone(&factory.volumes.lock()[0]);
    assert_no_straddling(volume.as_ref(), 256);

    let mut sink = OpSink::default();
    wal.replay_wal(&mut sink).unwrap();
    assert_eq!(sink.ops.len() as u64, THREADS * PER_THREAD);

    let seen: BTreeSet<u64> = sink
        .ops
        .iter()
        .map(|op| match op {
            Op::Long(key, value) => {
                assert_eq!(*value, key * 7);
                *key
            }
            Op::ByteArray(key, data) => {
                assert_eq!(data.as_slice(), &key.to_be_bytes());
                *key
            }
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(seen.len() as u64, THREADS * PER_THREAD);
}

// =============================================================================
// Pointers
// =============================================================================

#[test]
fn test_byte_array_pointer_reads_back() {
    let (wal, _factory) = capturing_wal(10);
    wal.append_long(0, 0).unwrap();
    let pointer = wal.append_byte_array(123, b"hello wal").unwrap();

    assert_eq!(pointer.size(), 9);
    assert_eq!(pointer.file_index(), 0);
    assert_eq!(pointer.offset(), 16 + 15 + 9);

    assert_eq!(wal.wal_get_byte_array_copy(pointer).unwrap().as_ref(), b"hello wal");

    let mut streamed = String::new();
    wal.wal_get_byte_array(pointer)
        .unwrap()
        .read_to_string(&mut streamed)
        .unwrap();
    assert_eq!(streamed, "hello wal");
}

#[test]
fn test_record_pointer_reads_back() {
    let (wal, _factory) = capturing_wal(10);
    let null = wal.append_record(1, None).unwrap();
    let empty = wal.append_record(2, Some(&[])).unwrap();
    let full = wal.append_record(3, Some(&[4, 5, 6])).unwrap();

    assert_eq!(null.size(), 0);
    assert_eq!(null.offset(), 16);
    assert_eq!(wal.wal_get_record(null).unwrap(), None);
    assert_eq!(wal.wal_get_record(empty).unwrap().unwrap().len(), 0);
    assert_eq!(wal.wal_get_record(full).unwrap().unwrap().as_ref(), &[4, 5, 6]);
}

#[test]
fn test_pointers_into_second_file() {
    let (mut wal, _factory) = capturing_wal(10);
    let first = wal.append_byte_array(0, b"one").unwrap();
    wal.seal().unwrap();
    wal.start_next_file().unwrap();
    let second = wal.append_byte_array(0, b"two").unwrap();

    assert_eq!(second.file_index(), 1);
    assert_eq!(wal.wal_get_byte_array_copy(first).unwrap().as_ref(), b"one");
    assert_eq!(wal.wal_get_byte_array_copy(second).unwrap().as_ref(), b"two");
}

#[test]
fn test_record_pointer_to_other_instruction_is_corruption() {
    let (wal, _factory) = capturing_wal(10);
    wal.append_long(8, 8).unwrap();

    let err = wal.wal_get_record(WalPointer::record(0, 16).unwrap()).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_pointer_to_unknown_file() {
    let (wal, _factory) = capturing_wal(10);
    let pointer = WalPointer::byte_array(1, 4, 16).unwrap();
    assert!(matches!(
        wal.wal_get_byte_array_copy(pointer),
        Err(WalError::UnknownFile(4))
    ));
}
