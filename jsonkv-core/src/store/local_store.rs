/*
    local_store.rs - The store facade

    Composes validation, the entry table, TTL checks and the data file
    into the public operations.

    Concurrency:
    - One RwLock guards the entry table, and every file access happens
      while its write guard is held
    - A mutation and the rewrite that persists it form one critical
      section; if the rewrite fails the mutation is undone before the
      guard is released, so no caller ever sees memory ahead of disk
    - Reads share the lock; guards release on every exit path

    Expiry is passive: an expired entry fails `read` and `delete` but stays
    in the table until `clear_all` or an explicit `purge_expired`.
*/

use crate::config::StoreConfig;
use crate::metrics::{self, record_counter, record_error, record_gauge};
use crate::store::data_file::DataFile;
use crate::store::entry::{Entry, EntryTable};
use crate::store::errors::{StoreError, StoreResult};
use crate::store::ttl::{self, Clock, SystemClock};
use crate::store::validator::{normalize_value, ValidationRules, Validator};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Helper to convert poison errors into StoreError
fn handle_poison<T>(_err: PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned("a thread panicked while holding the store lock".to_string())
}

/// Count the operation, and its failure kind if it failed
fn observe<T>(op: &'static str, result: StoreResult<T>) -> StoreResult<T> {
    record_counter(op, 1);
    if let Err(err) = &result {
        record_error(err.kind().as_str());
    }
    result
}

/// Result of [`LocalStore::clear_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The table was emptied
    Cleared { removed: usize },
    /// Confirmation was withheld; nothing changed
    NotCleared,
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub live_entries: usize,
    pub expired_entries: usize,
    pub file_size_bytes: u64,
}

/// Embedded key-value store backed by a single JSON file
pub struct LocalStore {
    config: StoreConfig,
    validator: Validator,
    data_file: DataFile,
    clock: Arc<dyn Clock>,
    table: RwLock<EntryTable>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("path", &self.data_file.path())
            .field("rules", self.validator.rules())
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Open the store in `config.directory`, creating it if needed
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open with an explicit time source
    pub fn open_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        config.validate().map_err(|e| StoreError::InvalidConfig(e.to_string()))?;

        std::fs::create_dir_all(&config.directory)?;

        let validator = Validator::new(ValidationRules::from(&config));
        let data_file = DataFile::new(config.file_path(), config.max_file_size_bytes);
        let table = Self::load_or_create(&data_file, &validator)?;

        record_gauge(metrics::ENTRIES, table.len() as f64);

        Ok(LocalStore {
            config,
            validator,
            data_file,
            clock,
            table: RwLock::new(table),
        })
    }

    fn load_or_create(data_file: &DataFile, validator: &Validator) -> StoreResult<EntryTable> {
        let loaded = match data_file.load() {
            Ok(Some(table)) => match Self::check_loaded(&table, validator) {
                Ok(()) => Some(table),
                Err(err) => {
                    warn!(error = %err, "Data file violates store limits");
                    data_file.quarantine()?;
                    None
                }
            },
            Ok(None) => None,
            Err(StoreError::Deserialization(reason)) => {
                warn!(
                    path = %data_file.path().display(),
                    %reason,
                    "Data file is unreadable"
                );
                data_file.quarantine()?;
                None
            }
            // Oversized files and I/O failures are surfaced, never replaced
            Err(err) => return Err(err),
        };

        match loaded {
            Some(table) => {
                info!(
                    path = %data_file.path().display(),
                    entries = table.len(),
                    "Opened data store"
                );
                Ok(table)
            }
            None => {
                let table = EntryTable::new();
                data_file.write(&table)?;
                info!(path = %data_file.path().display(), "Created new data store");
                Ok(table)
            }
        }
    }

    fn check_loaded(table: &EntryTable, validator: &Validator) -> StoreResult<()> {
        for (key, entry) in table {
            validator.validate_key(key)?;
            validator.validate_value(entry.value())?;
        }
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        self.data_file.path()
    }

    /// Store a new entry.
    ///
    /// An empty string value is stored as `null`. With a `ttl` the entry
    /// expires `ttl` seconds from now; without one it never expires.
    pub fn create(&self, key: &str, value: Value, ttl: Option<u64>) -> StoreResult<()> {
        observe(metrics::OPS_CREATE, self.create_inner(key, value, ttl))
    }

    fn create_inner(&self, key: &str, value: Value, ttl: Option<u64>) -> StoreResult<()> {
        self.validator.validate_key(key)?;
        let value = normalize_value(value);
        let size = self.validator.validate_value(&value)?;

        let mut table = self.table.write().map_err(handle_poison)?;

        if table.contains_key(key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        let expires_at = ttl::expiry_from_ttl(self.clock.now_secs(), ttl);
        table.insert(key.to_string(), Entry::new(value, expires_at));

        if let Err(err) = self.persist(&table) {
            table.remove(key);
            return Err(err);
        }

        debug!(key, bytes = size, ?expires_at, "Created entry");
        Ok(())
    }

    /// Serialize `value` and store it as a new entry
    pub fn create_serialized<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> StoreResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.create(key, value, ttl)
    }

    /// Return the value of a live entry
    pub fn read(&self, key: &str) -> StoreResult<Value> {
        observe(metrics::OPS_READ, self.read_inner(key))
    }

    fn read_inner(&self, key: &str) -> StoreResult<Value> {
        self.validator.validate_key(key)?;

        let table = self.table.read().map_err(handle_poison)?;
        let entry = table.get(key).ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        self.ensure_live(key, entry)?;

        Ok(entry.value().clone())
    }

    /// Read a live entry and deserialize it into `T`
    pub fn read_as<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        let value = self.read(key)?;
        serde_json::from_value(value).map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    /// Remove a live entry, returning its value.
    ///
    /// An expired entry is not removed; the call fails with `Expired`.
    pub fn delete(&self, key: &str) -> StoreResult<Value> {
        observe(metrics::OPS_DELETE, self.delete_inner(key))
    }

    fn delete_inner(&self, key: &str) -> StoreResult<Value> {
        self.validator.validate_key(key)?;

        let mut table = self.table.write().map_err(handle_poison)?;

        let entry = table.get(key).ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        self.ensure_live(key, entry)?;

        let Some(removed) = table.remove(key) else {
            return Err(StoreError::KeyNotFound(key.to_string()));
        };

        if let Err(err) = self.persist(&table) {
            table.insert(key.to_string(), removed);
            return Err(err);
        }

        debug!(key, "Deleted entry");
        Ok(removed.into_value())
    }

    /// Empty the store if `confirmed`, otherwise leave it untouched.
    ///
    /// The file is rewritten as an empty JSON object, never truncated.
    pub fn clear_all(&self, confirmed: bool) -> StoreResult<ClearOutcome> {
        if !confirmed {
            info!("Clear not confirmed, data store left unchanged");
            return Ok(ClearOutcome::NotCleared);
        }
        observe(metrics::OPS_CLEAR, self.clear_inner())
    }

    fn clear_inner(&self) -> StoreResult<ClearOutcome> {
        let mut table = self.table.write().map_err(handle_poison)?;

        let previous = std::mem::take(&mut *table);
        if let Err(err) = self.persist(&table) {
            *table = previous;
            return Err(err);
        }

        info!(removed = previous.len(), "Cleared data store");
        Ok(ClearOutcome::Cleared {
            removed: previous.len(),
        })
    }

    /// Snapshot of every key and value.
    ///
    /// Expired entries are included; only `read` and `delete` apply TTL.
    pub fn display_all(&self) -> StoreResult<BTreeMap<String, Value>> {
        observe(metrics::OPS_LIST, self.display_inner())
    }

    fn display_inner(&self) -> StoreResult<BTreeMap<String, Value>> {
        let table = self.table.read().map_err(handle_poison)?;

        if table.is_empty() {
            return Err(StoreError::EmptyStore);
        }

        Ok(table
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value().clone()))
            .collect())
    }

    /// Remove every expired entry and persist. Returns how many were removed.
    ///
    /// Never called implicitly.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        observe(metrics::OPS_PURGE, self.purge_inner())
    }

    fn purge_inner(&self) -> StoreResult<usize> {
        let mut table = self.table.write().map_err(handle_poison)?;
        let now = self.clock.now_secs();

        let expired: Vec<String> = table
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let removed: Vec<(String, Entry)> = expired
            .into_iter()
            .filter_map(|key| table.remove(&key).map(|entry| (key, entry)))
            .collect();

        if let Err(err) = self.persist(&table) {
            table.extend(removed);
            return Err(err);
        }

        info!(removed = removed.len(), "Purged expired entries");
        Ok(removed.len())
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.table.read().map_err(handle_poison)?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.table.read().map_err(handle_poison)?.is_empty())
    }

    /// Whether the key is present, regardless of expiry
    pub fn contains_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.table.read().map_err(handle_poison)?.contains_key(key))
    }

    /// Get storage statistics
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let table = self.table.read().map_err(handle_poison)?;
        let now = self.clock.now_secs();
        let live_entries = table.values().filter(|entry| entry.is_live(now)).count();

        Ok(StoreStats {
            entries: table.len(),
            live_entries,
            expired_entries: table.len() - live_entries,
            file_size_bytes: self.data_file.size_on_disk()?,
        })
    }

    fn ensure_live(&self, key: &str, entry: &Entry) -> StoreResult<()> {
        if entry.is_live(self.clock.now_secs()) {
            return Ok(());
        }
        let expired_at = entry.expires_at().unwrap_or_default();
        warn!(key, expired_at, "Access to expired entry");
        Err(StoreError::Expired {
            key: key.to_string(),
            expired_at,
        })
    }

    /// Rewrite the backing file. Callers must hold the table write guard.
    fn persist(&self, table: &EntryTable) -> StoreResult<()> {
        let bytes = self.data_file.write(table)?;
        record_gauge(metrics::ENTRIES, table.len() as f64);
        record_gauge(metrics::SIZE_BYTES, bytes as f64);
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n: i64| Value::from(n)),
            any::<f64>()
                .prop_filter_map("finite floats only", serde_json::Number::from_f64)
                .prop_map(Value::Number),
            "[a-zA-Z0-9 ]{1,40}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Property: whatever is created reads back unchanged, before and after reopen
        #[test]
        fn prop_create_read_round_trip(
            key in "[a-zA-Z0-9_]{1,32}",
            value in json_value(),
            ttl in prop::option::of(1u64..10_000),
        ) {
            let dir = tempdir().unwrap();
            let config = StoreConfig::in_directory(dir.path());

            let store = LocalStore::open(config.clone()).unwrap();
            store.create(&key, value.clone(), ttl).unwrap();
            prop_assert_eq!(store.read(&key).unwrap(), value.clone());
            drop(store);

            let reopened = LocalStore::open(config).unwrap();
            prop_assert_eq!(reopened.read(&key).unwrap(), value);
        }

        // Property: keys over the limit are always rejected
        #[test]
        fn prop_long_keys_rejected(key in "[a-z]{33,64}", value in json_value()) {
            let dir = tempdir().unwrap();
            let store = LocalStore::open(StoreConfig::in_directory(dir.path())).unwrap();

            prop_assert!(matches!(
                store.create(&key, value, None),
                Err(StoreError::InvalidKey(_))
            ));
            prop_assert!(matches!(store.read(&key), Err(StoreError::InvalidKey(_))));
            prop_assert!(matches!(store.delete(&key), Err(StoreError::InvalidKey(_))));
        }
    }
}
