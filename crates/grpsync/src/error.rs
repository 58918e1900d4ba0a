//! Error types for the synchronizer facade.

use grpsync_engine::EngineError;
use grpsync_store::StoreError;
use thiserror::Error;

/// Errors that can occur while driving synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Engine failure during a pass.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Storage failure outside a pass (lock release, settings load).
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for synchronizer operations.
pub type Result<T> = std::result::Result<T, SyncError>;
