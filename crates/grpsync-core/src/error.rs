//! Error types for core primitives.

use thiserror::Error;

/// Errors that can occur while working with core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A remote identity string could not be parsed.
    #[error("invalid remote id: {0}")]
    InvalidRemoteId(String),

    /// A column was read before its value was loaded.
    #[error("field {field} of {schema} is not loaded")]
    FieldNotLoaded { schema: String, field: String },

    /// A column held a value of an unexpected type.
    #[error("field {field}: expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    /// Extension payload could not be decoded.
    #[error("extension payload decode: {0}")]
    PayloadDecode(#[from] serde_json::Error),

    /// A content hash string was not valid hex.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
