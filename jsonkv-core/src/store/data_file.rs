/*
    data_file.rs - Backing file for the entry table

    The whole table lives in one JSON object, rewritten in full on every
    mutation. There is no journal: the file on disk is always exactly the
    last table that was persisted.

    Features:
    - Atomic rewrite (write to temp, fsync, rename, then fsync the
      directory on unix so the rename itself is durable)
    - Size limit enforced on load and before every write
    - Corrupt files are moved aside under a name no earlier quarantine
      holds, so no corrupt payload is ever overwritten
*/

use crate::metrics::{Timer, PERSIST_DURATION_MS};
use crate::store::entry::EntryTable;
use crate::store::errors::{StoreError, StoreResult};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Handle to the backing JSON file
#[derive(Debug, Clone)]
pub struct DataFile {
    path: PathBuf,
    max_size_bytes: u64,
}

impl DataFile {
    pub fn new(path: PathBuf, max_size_bytes: u64) -> Self {
        DataFile {
            path,
            max_size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Read and decode the table.
    ///
    /// Returns `Ok(None)` if the file does not exist, `StoreTooLarge` if it
    /// exceeds the size limit, and `Deserialization` if it is not a valid
    /// encoded table.
    pub fn load(&self) -> StoreResult<Option<EntryTable>> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if size > self.max_size_bytes {
            return Err(StoreError::StoreTooLarge {
                size,
                limit: self.max_size_bytes,
            });
        }

        let data = fs::read(&self.path)?;
        let table: EntryTable = serde_json::from_slice(&data)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

        debug!(
            path = %self.path.display(),
            entries = table.len(),
            bytes = size,
            "Loaded data file"
        );
        Ok(Some(table))
    }

    /// Move an unreadable file aside so a fresh one can be written in its
    /// place.
    ///
    /// The first quarantine goes to `<name>.corrupt`; later ones to
    /// `<name>.corrupt.1`, `<name>.corrupt.2` and so on.
    pub fn quarantine(&self) -> StoreResult<PathBuf> {
        let target = self.free_quarantine_path();
        fs::rename(&self.path, &target)?;
        warn!(
            from = %self.path.display(),
            to = %target.display(),
            "Moved unreadable data file aside"
        );
        Ok(target)
    }

    fn free_quarantine_path(&self) -> PathBuf {
        let first = self.sibling("corrupt");
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| self.sibling(&format!("corrupt.{}", n)))
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }

    /// Encode the table exactly as it will be written
    pub fn encode(table: &EntryTable) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(table).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Replace the file contents with the given table.
    ///
    /// Fails with `StoreTooLarge` without touching the file if the encoding
    /// exceeds the limit. Returns the number of bytes written.
    pub fn write(&self, table: &EntryTable) -> StoreResult<u64> {
        let timer = Timer::new(PERSIST_DURATION_MS);

        let data = Self::encode(table)?;
        let size = data.len() as u64;
        if size > self.max_size_bytes {
            return Err(StoreError::StoreTooLarge {
                size,
                limit: self.max_size_bytes,
            });
        }

        // Write to temporary file first
        let temp_path = self.sibling("tmp");
        let mut file = File::create(&temp_path)?;
        let written = file.write_all(&data).and_then(|()| file.sync_all());
        drop(file);

        // Atomically rename to final name
        if let Err(err) = written.and_then(|()| fs::rename(&temp_path, &self.path)) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Failed to remove temp file"
                );
            }
            return Err(err.into());
        }

        self.sync_directory();

        timer.stop();
        debug!(
            path = %self.path.display(),
            entries = table.len(),
            bytes = size,
            "Persisted data file"
        );
        Ok(size)
    }

    /// Flush the rename to disk. The new contents are already in place, so
    /// a failure here is logged and not reported to the caller.
    #[cfg(unix)]
    fn sync_directory(&self) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Err(err) = File::open(parent).and_then(|dir| dir.sync_all()) {
            warn!(
                dir = %parent.display(),
                error = %err,
                "Failed to sync data directory"
            );
        }
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) {}

    /// Current size of the file on disk, 0 if it does not exist
    pub fn size_on_disk(&self) -> StoreResult<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entry::Entry;
    use serde_json::json;
    use tempfile::tempdir;

    fn data_file(dir: &Path) -> DataFile {
        DataFile::new(dir.join("database.json"), 1_000_000_000)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(data_file(dir.path()).load().unwrap().is_none());
    }

    #[test]
    fn test_write_and_load() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());

        let mut table = EntryTable::new();
        table.insert("a".to_string(), Entry::new(json!("hello"), Some(99)));
        table.insert("b".to_string(), Entry::new(json!({ "x": [1, 2] }), None));

        let written = file.write(&table).unwrap();
        assert_eq!(written, file.size_on_disk().unwrap());

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_empty_table_is_valid_json_object() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());

        file.write(&EntryTable::new()).unwrap();

        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "{}");
        assert!(file.load().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());
        file.write(&EntryTable::new()).unwrap();

        assert_eq!(file_names(dir.path()), vec!["database.json".to_string()]);
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());

        // A non-empty directory where the data file should be makes the rename fail
        std::fs::create_dir(file.path()).unwrap();
        std::fs::write(file.path().join("occupant"), b"x").unwrap();

        let err = file.write(&EntryTable::new()).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(!dir.path().join("database.json.tmp").exists());
        assert_eq!(file_names(dir.path()), vec!["database.json".to_string()]);
    }

    #[test]
    fn test_unwritable_temp_path_fails_with_storage_error() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());
        file.write(&EntryTable::new()).unwrap();
        std::fs::create_dir(dir.path().join("database.json.tmp")).unwrap();

        let mut table = EntryTable::new();
        table.insert("a".to_string(), Entry::new(json!(1), None));

        assert!(matches!(file.write(&table), Err(StoreError::Storage(_))));
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "{}");
    }

    #[test]
    fn test_corrupt_file_fails_to_load() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());
        std::fs::write(file.path(), b"").unwrap();

        assert!(matches!(file.load(), Err(StoreError::Deserialization(_))));
    }

    #[test]
    fn test_wrong_shape_fails_to_load() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());
        std::fs::write(file.path(), br#"{"a": 5}"#).unwrap();

        assert!(matches!(file.load(), Err(StoreError::Deserialization(_))));
    }

    #[test]
    fn test_oversized_file_refused_on_load() {
        let dir = tempdir().unwrap();
        let file = DataFile::new(dir.path().join("database.json"), 4);
        std::fs::write(file.path(), br#"{"a":{"value":1,"ttl":null}}"#).unwrap();

        assert!(matches!(
            file.load(),
            Err(StoreError::StoreTooLarge { limit: 4, .. })
        ));
    }

    #[test]
    fn test_oversized_write_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let file = DataFile::new(dir.path().join("database.json"), 16);
        file.write(&EntryTable::new()).unwrap();

        let mut table = EntryTable::new();
        table.insert(
            "key".to_string(),
            Entry::new(json!("a long enough value"), None),
        );

        assert!(matches!(
            file.write(&table),
            Err(StoreError::StoreTooLarge { .. })
        ));
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "{}");
    }

    #[test]
    fn test_quarantine() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());
        std::fs::write(file.path(), b"garbage").unwrap();

        let moved = file.quarantine().unwrap();
        assert_eq!(moved, dir.path().join("database.json.corrupt"));
        assert_eq!(std::fs::read(&moved).unwrap(), b"garbage");
        assert!(!file.path().exists());
    }

    #[test]
    fn test_repeated_quarantine_keeps_every_payload() {
        let dir = tempdir().unwrap();
        let file = data_file(dir.path());

        std::fs::write(file.path(), b"first").unwrap();
        let first = file.quarantine().unwrap();
        std::fs::write(file.path(), b"second").unwrap();
        let second = file.quarantine().unwrap();
        std::fs::write(file.path(), b"third").unwrap();
        let third = file.quarantine().unwrap();

        assert_eq!(first, dir.path().join("database.json.corrupt"));
        assert_eq!(second, dir.path().join("database.json.corrupt.1"));
        assert_eq!(third, dir.path().join("database.json.corrupt.2"));
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
        assert_eq!(std::fs::read(&third).unwrap(), b"third");
    }
}
