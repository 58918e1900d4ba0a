//! Error types for the synchronization engine.
//!
//! Three tiers: recoverable per item (handled inside the driver loop),
//! recoverable per session (recorded in session error state), and fatal
//! (rethrown to the caller).

use grpsync_remote::RemoteError;
use grpsync_store::StoreError;
use thiserror::Error;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote boundary failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Core type failure (payload decode, bad remote id).
    #[error(transparent)]
    Core(#[from] grpsync_core::CoreError),

    /// Too many consecutive remote failures; the session is suspended.
    #[error("session suspended after {consecutive_failures} consecutive remote failures")]
    SessionSuspended { consecutive_failures: u32 },

    /// An aggregate violated an engine invariant.
    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),
}

impl EngineError {
    /// Tier 1: skip or tombstone the item and continue with the next one.
    pub fn is_recoverable_per_item(&self) -> bool {
        matches!(self, EngineError::Remote(e) if e.is_recoverable_per_item())
    }

    /// Tier 2: record session error state; other sessions are unaffected.
    pub fn is_recoverable_per_session(&self) -> bool {
        matches!(self, EngineError::Remote(e) if e.is_recoverable_per_session())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
