//! Basic usage example for TCDB
//!
//! Builds a [`Config`], opens a database from it, then writes, reads and
//! deletes a few keys. Write failures are logged and the run carries on.
//!
//! ```text
//! cargo run --example basic [config.json]
//! ```

use tcdb::{Config, DB};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::new().set("database_dir", "./example_data"),
    };

    let db = DB::open_with_config(&config)?;
    println!("Database opened at {}", config.database_dir());

    println!("Writing data...");
    for (key, value) in [("key1", "value1"), ("key2", "value2"), ("key3", "value3")] {
        if let Err(e) = db.insert(key.as_bytes(), value.as_bytes()) {
            log::error!("insert {} failed: {}", key, e);
        }
    }

    println!("Reading data...");
    if let Some(value) = db.get(b"key1")? {
        println!("key1 => {:?}", String::from_utf8_lossy(&value));
    }

    println!("Deleting key2...");
    if let Err(e) = db.delete(b"key2") {
        log::error!("delete failed: {}", e);
    }

    match db.get(b"key2")? {
        Some(_) => println!("key2 still exists (unexpected)"),
        None => println!("key2 was successfully deleted"),
    }

    db.close()?;
    println!("Database closed");

    Ok(())
}
