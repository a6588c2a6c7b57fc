/*
    errors.rs - Error types for the store subsystem

    Every failure a caller can branch on has its own variant:
    - Key/value validation
    - Uniqueness and lookup
    - TTL expiry
    - Size limits on the backing file
    - I/O and encoding failures underneath persistence
*/

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key is empty or longer than the configured maximum
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Serialized value exceeds the configured maximum
    #[error("Value too large: {size} bytes exceeds limit of {limit} bytes")]
    ValueTooLarge { size: usize, limit: usize },

    /// Key already present in the table
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Key not present in the table
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Entry exists but its TTL has lapsed
    #[error("Key expired: {key} (expired at {expired_at})")]
    Expired { key: String, expired_at: u64 },

    /// Backing file is (or would become) larger than allowed
    #[error("Store too large: {size} bytes exceeds limit of {limit} bytes")]
    StoreTooLarge { size: u64, limit: u64 },

    /// Listing requested on a table with no entries
    #[error("Store is empty")]
    EmptyStore,

    /// Storage I/O error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid store configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A thread panicked while holding the store lock
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Fieldless discriminant of [`StoreError`], for callers that only care
/// about the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidKey,
    ValueTooLarge,
    DuplicateKey,
    KeyNotFound,
    Expired,
    StoreTooLarge,
    EmptyStore,
    Storage,
    Serialization,
    Deserialization,
    InvalidConfig,
    LockPoisoned,
}

impl ErrorKind {
    /// Stable snake_case name, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::ValueTooLarge => "value_too_large",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::Expired => "expired",
            ErrorKind::StoreTooLarge => "store_too_large",
            ErrorKind::EmptyStore => "empty_store",
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Deserialization => "deserialization",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::LockPoisoned => "lock_poisoned",
        }
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidKey(_) => ErrorKind::InvalidKey,
            StoreError::ValueTooLarge { .. } => ErrorKind::ValueTooLarge,
            StoreError::DuplicateKey(_) => ErrorKind::DuplicateKey,
            StoreError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            StoreError::Expired { .. } => ErrorKind::Expired,
            StoreError::StoreTooLarge { .. } => ErrorKind::StoreTooLarge,
            StoreError::EmptyStore => ErrorKind::EmptyStore,
            StoreError::Storage(_) => ErrorKind::Storage,
            StoreError::Serialization(_) => ErrorKind::Serialization,
            StoreError::Deserialization(_) => ErrorKind::Deserialization,
            StoreError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            StoreError::LockPoisoned(_) => ErrorKind::LockPoisoned,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            StoreError::Storage(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            StoreError::Deserialization(err.to_string())
        } else {
            StoreError::Serialization(err.to_string())
        }
    }
}
