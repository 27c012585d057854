// Bloom Filter Tests for TCDB
// These tests verify that the filter never hides a key and does prune misses

use tcdb::coding::{encode_to_vec, OpType};
use tcdb::filter::BloomFilter;
use tcdb::sstable::table_name;
use tcdb::storage::TableStore;
use tcdb::{Options, DB};
use tempfile::TempDir;

/// Every inserted key must be found through the filtered read path
#[test]
fn test_no_false_negatives_through_db() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default().use_bloom_filter(true)).unwrap();

    for i in 0..2000u32 {
        db.insert(format!("bloom{:05}", i).as_bytes(), b"x").unwrap();
    }
    db.flush().unwrap();

    for i in 0..2000u32 {
        assert_eq!(db.get(format!("bloom{:05}", i).as_bytes()).unwrap(), Some(b"x".to_vec()));
    }
}

/// Reads give the same answers with and without filters
#[test]
fn test_filter_does_not_change_results() {
    for use_filter in [false, true] {
        let dir = TempDir::new().unwrap();
        let db = DB::open(dir.path(), Options::default().use_bloom_filter(use_filter)).unwrap();
        for i in (0..1000u32).step_by(2) {
            db.insert(format!("k{:05}", i).as_bytes(), b"even").unwrap();
        }
        db.flush().unwrap();
        for i in 0..1000u32 {
            let expected = (i % 2 == 0).then(|| b"even".to_vec());
            assert_eq!(db.get(format!("k{:05}", i).as_bytes()).unwrap(), expected);
        }
    }
}

/// Tables written with a filter prune most absent keys
#[test]
fn test_table_filter_prunes_misses() {
    let dir = TempDir::new().unwrap();
    let policy = BloomFilter::new(0.01);
    let store = TableStore::open(dir.path(), 4096, Some(policy.clone()), 2).unwrap();

    let entries: Vec<Vec<u8>> = (0..5000u32)
        .map(|i| encode_to_vec(format!("present{:05}", i).as_bytes(), b"v", i as u64, OpType::Insert))
        .collect();
    store.write_table(&table_name(1), &entries).unwrap();
    let meta = store.load_meta(&table_name(1)).unwrap();
    assert!(meta.flexible.has_filter());

    for i in 0..5000u32 {
        assert!(meta.may_contain_key(&policy, format!("present{:05}", i).as_bytes()));
    }
    let false_positives = (0..10_000u32)
        .filter(|i| meta.may_contain_key(&policy, format!("absent{}", i).as_bytes()))
        .count();
    assert!(false_positives < 300, "{} false positives", false_positives);
}

/// Tables written without a filter never rule a key out
#[test]
fn test_table_without_filter() {
    let dir = TempDir::new().unwrap();
    let store = TableStore::open(dir.path(), 4096, None, 2).unwrap();
    let entries = vec![encode_to_vec(b"only", b"v", 0, OpType::Insert)];
    store.write_table(&table_name(1), &entries).unwrap();

    let meta = store.load_meta(&table_name(1)).unwrap();
    assert!(!meta.flexible.has_filter());
    assert!(meta.may_contain_key(&BloomFilter::default(), b"anything"));
}
