//! Example walking through the store operations
//!
//! Run with:
//! ```bash
//! cargo run --example basic_usage
//! ```

use jsonkv_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use jsonkv_core::{ClearOutcome, LocalStore, StoreConfig, StoreError};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_config(LogConfig::new(LogLevel::Debug))?;

    let dir = std::env::temp_dir().join("jsonkv-demo");
    let store = LocalStore::open(StoreConfig::in_directory(&dir))?;
    store.clear_all(true)?;

    store.create("greeting", json!("hello"), None)?;
    store.create("session", json!({ "user": 42 }), Some(2))?;
    println!("greeting = {}", store.read("greeting")?);

    match store.create("greeting", json!("again"), None) {
        Err(StoreError::DuplicateKey(key)) => println!("{} already exists", key),
        other => println!("unexpected: {:?}", other),
    }

    std::thread::sleep(std::time::Duration::from_secs(3));
    match store.read("session") {
        Err(err @ StoreError::Expired { .. }) => println!("{}", err),
        other => println!("unexpected: {:?}", other),
    }

    println!("all = {:?}", store.display_all()?);
    println!("stats = {:?}", store.stats()?);

    if let ClearOutcome::Cleared { removed } = store.clear_all(true)? {
        println!("removed {} entries", removed);
    }

    Ok(())
}
