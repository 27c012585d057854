// Recovery Tests for TCDB
// Writes only become durable once flushed; these tests check what a restart
// recovers and how the directory is cleaned up afterwards

use tcdb::sstable::{table_name, TABLE_EXTENSION};
use tcdb::{Error, Options, DB};
use tempfile::TempDir;

/// Flushed data survives a process that never closes the database
#[test]
fn test_flushed_data_survives_abandoned_handle() {
    let dir = TempDir::new().unwrap();
    {
        let db = DB::open(dir.path(), Options::default()).unwrap();
        for i in 0..100u32 {
            db.insert(format!("durable{:03}", i).as_bytes(), b"yes").unwrap();
        }
        db.flush().unwrap();
        db.insert(b"volatile", b"lost").unwrap();
        // Simulate a crash: no close, no drop.
        std::mem::forget(db);
    }

    let db = DB::open(dir.path(), Options::default()).unwrap();
    for i in 0..100u32 {
        assert_eq!(db.get(format!("durable{:03}", i).as_bytes()).unwrap(), Some(b"yes".to_vec()));
    }
    assert_eq!(db.get(b"volatile").unwrap(), None);
}

/// Dropping the handle flushes the memtable
#[test]
fn test_drop_flushes_memtable() {
    let dir = TempDir::new().unwrap();
    {
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.insert(b"key", b"value").unwrap();
    }
    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
    assert_eq!(db.num_files_at_level(0).unwrap(), 1);
}

/// A table left behind by an interrupted flush is removed on open
#[test]
fn test_orphan_table_cleanup() {
    let dir = TempDir::new().unwrap();
    {
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.insert(b"a", b"1").unwrap();
        db.close().unwrap();
    }
    let orphan = dir.path().join(format!("{}.{}", table_name(0x20), TABLE_EXTENSION));
    std::fs::write(&orphan, b"half written").unwrap();
    let unrelated = dir.path().join("notes.txt");
    std::fs::write(&unrelated, b"keep me").unwrap();

    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert!(!orphan.exists());
    assert!(unrelated.exists());
    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));

    let log = std::fs::read_to_string(dir.path().join("LOG")).unwrap();
    assert!(log.contains(&format!("[Warn] - Removed orphan table {}", table_name(0x20))));
}

/// Entry ids resume after the newest flushed entry so new writes shadow old ones
#[test]
fn test_entry_ids_resume_after_restart() {
    let dir = TempDir::new().unwrap();
    for round in 0..5u32 {
        let db = DB::open(dir.path(), Options::default()).unwrap();
        if round > 0 {
            assert_eq!(
                db.get(b"counter").unwrap(),
                Some(format!("{}", round - 1).into_bytes())
            );
        }
        db.insert(b"counter", format!("{}", round).as_bytes()).unwrap();
        db.close().unwrap();
    }
    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert_eq!(db.get(b"counter").unwrap(), Some(b"4".to_vec()));
}

/// A table listed in the manifest that fails to load aborts the open
#[test]
fn test_corrupted_live_table() {
    let dir = TempDir::new().unwrap();
    let name = {
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.insert(b"a", b"1").unwrap();
        db.flush().unwrap();
        db.level_files(0).unwrap().remove(0)
    };
    let path = dir.path().join(format!("{}.{}", name, TABLE_EXTENSION));
    std::fs::write(&path, b"tiny").unwrap();

    let result = DB::open(dir.path(), Options::default());
    assert!(matches!(result, Err(Error::Corruption(_))));
}

/// A manifest that is not valid text is reported as corruption
#[test]
fn test_corrupted_manifest() {
    let dir = TempDir::new().unwrap();
    drop(DB::open(dir.path(), Options::default()).unwrap());
    std::fs::write(dir.path().join("MANIFEST"), [0xFFu8, 0xFE, 0x00]).unwrap();

    assert!(DB::open(dir.path(), Options::default()).is_err());
}
