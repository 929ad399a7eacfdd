//! Tests for volumes
//!
//! These tests verify:
//! - Memory and file volumes behave the same through the trait
//! - Packed longs written through a volume decode back
//! - Factories hand out the right kind of volume

use std::io::Read;
use std::sync::Arc;

use mapwal::volume::packed;
use mapwal::volume::{
    FileVolume, FileVolumeFactory, MemoryVolume, MemoryVolumeFactory, Volume, VolumeFactory,
    VolumeReader,
};
use mapwal::WalError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn each_volume(test: impl Fn(&dyn Volume)) {
    test(&MemoryVolume::new());

    let temp = TempDir::new().unwrap();
    test(&FileVolume::open(&temp.path().join("volume")).unwrap());
}

// =============================================================================
// Shared Behaviour
// =============================================================================

#[test]
fn test_growth_and_length() {
    each_volume(|volume| {
        assert_eq!(volume.length(), 0);
        volume.ensure_available(100).unwrap();
        assert_eq!(volume.length(), 100);
        volume.ensure_available(50).unwrap();
        assert_eq!(volume.length(), 100);
    });
}

#[test]
fn test_out_of_bounds_access_is_io_error() {
    each_volume(|volume| {
        volume.ensure_available(8).unwrap();
        assert!(matches!(volume.put_u64(4, 1), Err(WalError::Io(_))));
        let mut buf = [0u8; 4];
        assert!(matches!(volume.get_data(6, &mut buf), Err(WalError::Io(_))));
    });
}

#[test]
fn test_packed_longs_through_volume() {
    each_volume(|volume| {
        volume.ensure_available(64).unwrap();
        let mut offset = 0;
        let values = [0u64, 127, 128, 16_383, 1 << 40, u64::MAX];
        for value in values {
            offset += volume.put_packed_long(offset, value).unwrap() as u64;
        }
        assert_eq!(
            offset as usize,
            values.iter().map(|v| packed::packed_len(*v)).sum::<usize>()
        );

        let mut pos = 0;
        for value in values {
            let (decoded, len) = volume.get_packed_long(pos).unwrap();
            assert_eq!(decoded, value);
            pos += len as u64;
        }
    });
}

#[test]
fn test_unterminated_packed_long_is_invalid_data() {
    each_volume(|volume| {
        volume.ensure_available(3).unwrap();
        volume.put_data(0, &[0x01, 0x02, 0x03]).unwrap();
        match volume.get_packed_long(0) {
            Err(WalError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("expected invalid data, got {:?}", other),
        }
        assert!(volume.get_packed_long(3).is_err());
    });
}

#[test]
fn test_truncate_then_close() {
    each_volume(|volume| {
        volume.ensure_available(32).unwrap();
        volume.truncate(0).unwrap();
        assert_eq!(volume.length(), 0);

        volume.close().unwrap();
        assert!(volume.is_closed());
        assert!(matches!(volume.sync(), Err(WalError::VolumeClosed)));
        volume.delete_file().unwrap();
    });
}

#[test]
fn test_volume_reader_streams_range() {
    let volume: Arc<dyn Volume> = Arc::new(MemoryVolume::new());
    volume.ensure_available(64).unwrap();
    let data: Vec<u8> = (0..64).collect();
    volume.put_data(0, &data).unwrap();

    let mut reader = VolumeReader::new(Arc::clone(&volume), 10, 20);
    let mut first = [0u8; 5];
    reader.read_exact(&mut first).unwrap();
    assert_eq!(first, [10, 11, 12, 13, 14]);
    assert_eq!(reader.remaining(), 15);

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, (15..30).collect::<Vec<u8>>());
}

// =============================================================================
// Factories
// =============================================================================

#[test]
fn test_memory_factory_ignores_path() {
    let a = MemoryVolumeFactory.make_volume(None).unwrap();
    let b = MemoryVolumeFactory
        .make_volume(Some(std::path::Path::new("/nonexistent/x")))
        .unwrap();
    a.ensure_available(4).unwrap();
    assert_eq!(b.length(), 0);
}

#[test]
fn test_file_factory_creates_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("made");
    let volume = FileVolumeFactory.make_volume(Some(&path)).unwrap();
    volume.ensure_available(16).unwrap();
    volume.sync().unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 16);
    assert!(matches!(
        FileVolumeFactory.make_volume(None),
        Err(WalError::Config(_))
    ));
}
