//! jsonkv: an embedded key-value store persisted to a single JSON file.
//!
//! ```no_run
//! use jsonkv_core::{LocalStore, StoreConfig};
//! use serde_json::json;
//!
//! let store = LocalStore::open(StoreConfig::in_directory("/var/lib/jsonkv"))?;
//! store.create("greeting", json!("hello"), Some(60))?;
//! assert_eq!(store.read("greeting")?, json!("hello"));
//! # Ok::<(), jsonkv_core::StoreError>(())
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod store;

pub use config::{Config, ConfigError, StoreConfig};
pub use logging::{init_logging, LogLevel};
pub use store::{ClearOutcome, ErrorKind, LocalStore, StoreError, StoreResult, StoreStats};
