//! Core error types for screentime-core.
//!
//! Errors are split by concern: storage failures, configuration problems and
//! rejected arguments. Normal accounting edge cases (draining below zero,
//! reconciling with no elapsed time) are valid states and never show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for screentime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The durable store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An argument was rejected before any state was touched.
    #[error("Invalid argument: {0}")]
    Validation(#[from] ValidationError),

    /// The engine lock was poisoned by a panicking holder.
    #[error("Credit engine lock poisoned")]
    LockPoisoned,
}

/// State store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store refused the operation.
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// A persisted value could not be decoded.
    #[error("Corrupt value for '{key}': {value:?}")]
    Corrupt { key: String, value: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be determined or created.
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Timestamps are epoch milliseconds and must not be negative.
    #[error("Negative timestamp: {0} ms")]
    NegativeTimestamp(i64),

    /// A numeric argument fell outside its accepted range.
    #[error("Value {value} for '{field}' is out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::Unavailable(err.to_string())
                }
            }
            _ => StorageError::Unavailable(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CoreError::LockPoisoned
    }
}

impl CoreError {
    /// True when the failure came from the state store.
    pub fn is_storage(&self) -> bool {
        matches!(self, CoreError::Storage(_))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
