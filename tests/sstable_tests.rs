// SSTable Tests for TCDB
// These tests drive table files through the TableStore used by the engine

use tcdb::coding::{encode_to_vec, entry_id, entry_key, entry_op_type, entry_value, query_entry, OpType};
use tcdb::compaction::Manifest;
use tcdb::filter::BloomFilter;
use tcdb::sstable::table_name;
use tcdb::storage::TableStore;
use tcdb::Error;
use tempfile::TempDir;

fn sorted_entries(n: u32) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            let key = format!("key{:05}", i);
            if i % 10 == 9 {
                encode_to_vec(key.as_bytes(), b"", i as u64, OpType::Delete)
            } else {
                encode_to_vec(key.as_bytes(), format!("value{}", i).as_bytes(), i as u64, OpType::Insert)
            }
        })
        .collect()
}

fn open_store(dir: &TempDir) -> TableStore {
    TableStore::open(dir.path(), 512, Some(BloomFilter::default()), 4).unwrap()
}

/// Test writing a table and reading every key back
#[test]
fn test_write_and_point_lookups() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entries = sorted_entries(1000);

    let summary = store.write_table(&table_name(1), &entries).unwrap();
    assert_eq!(summary.num_entries, 1000);
    assert!(summary.num_blocks > 1);
    assert_eq!(summary.max_entry_id, 999);

    let meta = store.load_meta(&table_name(1)).unwrap();
    assert_eq!(meta.num_blocks(), summary.num_blocks);
    assert_eq!(meta.flexible.max_entry_id, 999);
    store.verify_table(&meta).unwrap();

    for i in 0..1000u32 {
        let key = format!("key{:05}", i);
        let entry = store.get_from_table(&meta, &query_entry(key.as_bytes())).unwrap().unwrap();
        assert_eq!(entry_key(&entry), key.as_bytes());
        assert_eq!(entry_id(&entry), i as u64);
        if i % 10 == 9 {
            assert_eq!(entry_op_type(&entry), OpType::Delete);
        } else {
            assert_eq!(entry_value(&entry), format!("value{}", i).as_bytes());
        }
    }
    assert!(store.get_from_table(&meta, &query_entry(b"key00000x")).unwrap().is_none());
    assert!(store.get_from_table(&meta, &query_entry(b"zzz")).unwrap().is_none());
}

/// The newest version of a key wins inside one table
#[test]
fn test_newest_version_in_table() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entries = vec![
        encode_to_vec(b"a", b"old", 1, OpType::Insert),
        encode_to_vec(b"a", b"new", 5, OpType::Insert),
        encode_to_vec(b"b", b"only", 2, OpType::Insert),
    ];
    store.write_table(&table_name(1), &entries).unwrap();
    let meta = store.load_meta(&table_name(1)).unwrap();

    let hit = store.get_from_table(&meta, &query_entry(b"a")).unwrap().unwrap();
    assert_eq!(entry_value(&hit), b"new");
}

/// Full scans return entries in the order they were written
#[test]
fn test_table_entries_scan() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entries = sorted_entries(300);
    store.write_table(&table_name(7), &entries).unwrap();

    let meta = store.load_meta(&table_name(7)).unwrap();
    assert_eq!(store.table_entries(&meta).unwrap(), entries);
    assert_eq!(meta.min_entry.as_ref(), entries[0].as_slice());
    assert_eq!(meta.max_entry.as_ref(), entries[299].as_slice());
}

/// Flipping a data byte is caught by the checksum
#[test]
fn test_checksum_detects_corruption() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.write_table(&table_name(1), &sorted_entries(100)).unwrap();

    let path = store.table_path(&table_name(1));
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[10] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let meta = store.load_meta(&table_name(1)).unwrap();
    assert!(matches!(store.verify_table(&meta), Err(Error::ChecksumMismatch { .. })));
}

/// Listing only reports well-named table files, and removal is idempotent
#[test]
fn test_list_and_remove_tables() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for id in [3u64, 1, 2] {
        store.write_table(&table_name(id), &sorted_entries(5)).unwrap();
    }
    std::fs::write(dir.path().join("not-a-table.tdb"), b"x").unwrap();

    assert_eq!(store.list_tables().unwrap(), vec![table_name(1), table_name(2), table_name(3)]);

    store.remove_table(&table_name(2)).unwrap();
    store.remove_table(&table_name(2)).unwrap();
    assert_eq!(store.list_tables().unwrap(), vec![table_name(1), table_name(3)]);
}

/// The manifest written by the store reads back with the store's paths
#[test]
fn test_manifest_round_trip_through_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let fresh = store.read_manifest().unwrap();
    assert!(fresh.levels.is_empty());

    let mut manifest = Manifest::new("elsewhere", "elsewhere");
    manifest.levels = vec![vec![table_name(4), table_name(5)], vec![], vec![table_name(1)]];
    store.write_manifest(&manifest).unwrap();

    let loaded = store.read_manifest().unwrap();
    assert_eq!(loaded.levels, manifest.levels);
    assert_eq!(loaded.manifest_path, store.manifest_path().display().to_string());
    assert_eq!(loaded.log_path, store.log_path().display().to_string());
}
