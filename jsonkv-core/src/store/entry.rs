/*
    entry.rs - Stored entries and the in-memory entry table
*/

use crate::store::ttl;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The authoritative in-memory state: key -> entry
pub type EntryTable = HashMap<String, Entry>;

/// A stored value plus its optional absolute expiry.
///
/// On disk this is `{ "value": <json>, "ttl": <epoch seconds> | null }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    value: Value,

    #[serde(rename = "ttl", default)]
    expires_at: Option<u64>,
}

impl Entry {
    pub fn new(value: Value, expires_at: Option<u64>) -> Self {
        Entry { value, expires_at }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Absolute expiry in UNIX seconds, `None` if the entry never expires
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    pub fn is_live(&self, now: u64) -> bool {
        ttl::is_live(self.expires_at, now)
    }
}
