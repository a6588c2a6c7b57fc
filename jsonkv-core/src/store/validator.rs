/*
    validator.rs - Key and value validation

    Runs before any lock is taken or any state is touched.
    Ensures:
    - Keys are non-empty and within the character limit
    - Values fit the byte limit, measured on the persisted JSON encoding
*/

use crate::config::StoreConfig;
use crate::store::errors::{StoreError, StoreResult};
use serde_json::Value;

/// Validation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    /// Maximum key length, in characters
    pub max_key_length: usize,

    /// Maximum value size, in bytes of compact JSON
    pub max_value_size_bytes: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        ValidationRules {
            max_key_length: 32,
            max_value_size_bytes: 16_000,
        }
    }
}

impl From<&StoreConfig> for ValidationRules {
    fn from(config: &StoreConfig) -> Self {
        ValidationRules {
            max_key_length: config.max_key_length,
            max_value_size_bytes: config.max_value_size_bytes,
        }
    }
}

/// Validates keys and values against a fixed set of rules
#[derive(Debug, Clone)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Validator { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Fails with `InvalidKey` if the key is empty or too long.
    ///
    /// Length is counted in characters, not bytes.
    pub fn validate_key(&self, key: &str) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("key must not be empty".to_string()));
        }

        let len = key.chars().count();
        if len > self.rules.max_key_length {
            return Err(StoreError::InvalidKey(format!(
                "key is {} characters, limit is {}",
                len, self.rules.max_key_length
            )));
        }

        Ok(())
    }

    /// Fails with `ValueTooLarge` if the encoded value exceeds the limit.
    /// Returns the encoded size on success.
    pub fn validate_value(&self, value: &Value) -> StoreResult<usize> {
        let size = encoded_len(value)?;
        if size > self.rules.max_value_size_bytes {
            return Err(StoreError::ValueTooLarge {
                size,
                limit: self.rules.max_value_size_bytes,
            });
        }
        Ok(size)
    }
}

/// An empty string value is stored as `null`.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        other => other,
    }
}

/// Byte length of the compact JSON encoding
pub fn encoded_len(value: &Value) -> StoreResult<usize> {
    Ok(serde_json::to_vec(value)?.len())
}
