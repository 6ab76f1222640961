//! Core error types for pomotick-core.
//!
//! The timer engine itself never fails. Everything here belongs to the
//! collaborators around it: settings validation at the boundary, the TOML
//! config file, and the SQLite focus history.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomotick-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Input rejected at a collaborator boundary before it reaches the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Payload had the wrong overall shape
    #[error("Invalid {what} payload: {message}")]
    InvalidPayload { what: String, message: String },

    /// Settings key outside the recognized set
    #[error("Unknown settings key: {0}")]
    UnknownSettingsKey(String),

    /// Invalid value
    #[error("Invalid {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Mode name outside focus/shortBreak/longBreak
    #[error("Invalid timer mode: {0}")]
    InvalidMode(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
