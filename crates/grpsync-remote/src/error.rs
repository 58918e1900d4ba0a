//! Error types for the remote store boundary.

use grpsync_core::RemoteId;
use thiserror::Error;

/// Errors raised by a remote store.
///
/// `NotFound` and `AccessDenied` are distinguishable on purpose: callers
/// catch them and treat the item as a skip or tombstone; everything else is
/// rethrown.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The item no longer exists on the remote side.
    #[error("remote item not found: {0}")]
    NotFound(RemoteId),

    /// The session's credentials cannot read or write the item.
    #[error("access denied to remote item: {0}")]
    AccessDenied(RemoteId),

    /// A folder named in the session scope does not exist.
    #[error("remote folder not found: {0}")]
    FolderNotFound(String),

    /// Transient connectivity failure; recoverable per session.
    #[error("remote transport failure: {0}")]
    Transport(String),

    /// A filter used a property outside the bounded searchable set.
    #[error("invalid remote query: {0}")]
    InvalidQuery(String),
}

impl RemoteError {
    /// Whether this error is recoverable for a single item: the caller
    /// skips or tombstones the item and continues with the next candidate.
    pub fn is_recoverable_per_item(&self) -> bool {
        matches!(self, RemoteError::NotFound(_) | RemoteError::AccessDenied(_))
    }

    /// Whether this error is recoverable at the session level: recorded in
    /// session error state without aborting other sessions.
    pub fn is_recoverable_per_session(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
