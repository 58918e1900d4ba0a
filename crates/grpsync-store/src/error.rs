//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Core type error (payload decode, hash parse).
    #[error(transparent)]
    Core(#[from] grpsync_core::CoreError),

    /// Record not found.
    #[error("record not found: {schema}#{id}")]
    NotFound { schema: String, id: i64 },

    /// Attempt to update a record that was never inserted.
    #[error("record of {0} has no id; insert it first")]
    Unsaved(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
