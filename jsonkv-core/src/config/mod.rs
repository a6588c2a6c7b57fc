//! Configuration management for jsonkv
//!
//! Defaults, environment overrides, and TOML files, all funnelled through
//! one `validate` step before a store is opened.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod error;

pub use error::ConfigError;

/// Name of the backing file inside the store directory
pub const DEFAULT_FILE_NAME: &str = "database.json";

/// 1 GB
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1_000_000_000;

/// 16 KB
pub const DEFAULT_MAX_VALUE_SIZE_BYTES: usize = 16_000;

pub const DEFAULT_MAX_KEY_LENGTH: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the backing file
    pub directory: PathBuf,

    /// Backing file name
    pub file_name: String,

    /// Largest backing file the store will open or write
    pub max_file_size_bytes: u64,

    /// Largest value accepted, measured on its JSON encoding
    pub max_value_size_bytes: usize,

    /// Longest key accepted, in characters
    pub max_key_length: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_name: DEFAULT_FILE_NAME.to_string(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_value_size_bytes: DEFAULT_MAX_VALUE_SIZE_BYTES,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl StoreConfig {
    /// Default limits, rooted at `directory`
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Full path of the backing file
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "file_name must not be empty".to_string(),
            ));
        }

        if Path::new(&self.file_name).components().count() != 1 {
            return Err(ConfigError::ValidationFailed(format!(
                "file_name must be a bare file name: {}",
                self.file_name
            )));
        }

        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_file_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.max_value_size_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_value_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.max_key_length == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_key_length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: JSONKV_<SECTION>_<KEY>
    /// Example: JSONKV_STORE_DIRECTORY=/var/lib/jsonkv
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay any JSONKV_* variables that are set onto this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Store config
        if let Ok(dir) = env::var("JSONKV_STORE_DIRECTORY") {
            self.store.directory = PathBuf::from(dir);
        }
        if let Ok(name) = env::var("JSONKV_STORE_FILE_NAME") {
            self.store.file_name = name;
        }
        if let Some(size) = parse_env("JSONKV_STORE_MAX_FILE_SIZE")? {
            self.store.max_file_size_bytes = size;
        }
        if let Some(size) = parse_env("JSONKV_STORE_MAX_VALUE_SIZE")? {
            self.store.max_value_size_bytes = size;
        }
        if let Some(len) = parse_env("JSONKV_STORE_MAX_KEY_LENGTH")? {
            self.store.max_key_length = len;
        }

        // Logging config
        if let Ok(level) = env::var("JSONKV_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("JSONKV_LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

fn parse_env<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidEnv {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
