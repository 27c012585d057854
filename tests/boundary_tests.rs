// Boundary Condition Tests for TCDB
// These tests verify behavior at edge cases and limits

use tcdb::{Error, Options, DB};
use tempfile::TempDir;

/// Test operations on completely empty database
#[test]
fn test_empty_database_operations() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    // Get from empty database
    assert_eq!(db.get(b"nonexistent").unwrap(), None);

    // Delete from empty database
    assert!(db.delete(b"nonexistent").is_ok());
    assert_eq!(db.get(b"nonexistent").unwrap(), None);

    // Flush a memtable that only holds a tombstone
    assert!(db.flush().is_ok());
    assert_eq!(db.num_files_at_level(0).unwrap(), 1);
    assert_eq!(db.get(b"nonexistent").unwrap(), None);
}

/// Empty keys are rejected, empty values are not
#[test]
fn test_empty_key_and_value() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    assert!(matches!(db.insert(b"", b"value"), Err(Error::BadArgument(_))));

    db.insert(b"empty_value", b"").unwrap();
    assert_eq!(db.get(b"empty_value").unwrap(), Some(Vec::new()));
    db.flush().unwrap();
    assert_eq!(db.get(b"empty_value").unwrap(), Some(Vec::new()));
}

/// Values larger than a block and than the arena's block size
#[test]
fn test_large_values() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default().block_size(1024)).unwrap();

    let large = vec![0xABu8; 256 * 1024];
    db.insert(b"large", &large).unwrap();
    db.insert(b"small", b"s").unwrap();
    assert_eq!(db.get(b"large").unwrap(), Some(large.clone()));

    db.flush().unwrap();
    assert_eq!(db.get(b"large").unwrap(), Some(large));
    assert_eq!(db.get(b"small").unwrap(), Some(b"s".to_vec()));
}

/// Binary keys, including bytes that are significant to the encoding
#[test]
fn test_binary_keys() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    let keys: Vec<Vec<u8>> = vec![
        vec![0x00],
        vec![0x00, 0x00, 0x01],
        vec![0xFF; 300],
        vec![0x80, 0x7F],
        b";\n".to_vec(),
    ];
    for (i, key) in keys.iter().enumerate() {
        db.insert(key, &[i as u8]).unwrap();
    }
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(db.get(key).unwrap(), Some(vec![i as u8]));
    }

    db.flush().unwrap();
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(db.get(key).unwrap(), Some(vec![i as u8]));
    }
}

/// Keys that share prefixes sort by bytes, shorter first
#[test]
fn test_prefix_keys() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.insert(b"a", b"1").unwrap();
    db.insert(b"ab", b"2").unwrap();
    db.insert(b"abc", b"3").unwrap();
    db.flush().unwrap();
    db.delete(b"ab").unwrap();

    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"ab").unwrap(), None);
    assert_eq!(db.get(b"abc").unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.get(b"abcd").unwrap(), None);
}

/// Invalid options are refused before anything touches the disk
#[test]
fn test_invalid_options() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let result = DB::open(&path, Options::default().memtable_size(0));
    assert!(matches!(result, Err(Error::BadArgument(_))));
    assert!(!path.exists());
}
