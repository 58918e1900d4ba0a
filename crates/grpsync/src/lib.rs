//! # grpsync
//!
//! Bidirectional synchronization between a CRM-style relational store and a
//! groupware server, one account and mailbox at a time.
//!
//! ## Overview
//!
//! grpsync keeps three kinds of data converged across the two sides:
//!
//! - **Appointments**: calendar entries, including recurring series that the
//!   remote models as one master and the local store as dated instances
//! - **Contacts**: people with slot-bounded email, phone, and address sets
//! - **Messages**: mail headers imported for reference, exported on demand
//!
//! ## Key Concepts
//!
//! - **Watermark**: the highest remote version a successful pass has seen;
//!   the next pass enumerates only what changed since.
//! - **Metadata linkage**: a durable row pairing a local record with a remote
//!   identity, scoped by (user, remote store, schema).
//! - **Conflict resolution**: last-writer-wins on version timestamps, with
//!   optional content-hash suppression of cosmetic remote edits.
//! - **Locks**: a shared table keyed by (identity, domain) keeps concurrent
//!   sessions off the same item; a held lock is a skip, never an error.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grpsync::{RemoteStoreId, SessionSettings, Synchronizer, UserId};
//! use grpsync::remote::MemoryRemoteStore;
//! use grpsync::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("sync.db").unwrap();
//!     let remote = MemoryRemoteStore::with_default_folders();
//!
//!     let mut sync = Synchronizer::new(
//!         store,
//!         remote,
//!         SessionSettings::default(),
//!         UserId(1),
//!         RemoteStoreId::new("mailbox-a"),
//!     );
//!
//!     let report = sync.sync_all().await.unwrap();
//!     println!("imported {}, exported {}", report.imported, report.exported);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `grpsync::core` - Core types (records, items, filters, settings)
//! - `grpsync::store` - Local store, metadata linkage, and lock table
//! - `grpsync::remote` - Remote boundary and in-memory test double
//! - `grpsync::engine` - Drivers, mappers, and conflict resolution

pub mod error;
pub mod synchronizer;

// Re-export component crates
pub use grpsync_core as core;
pub use grpsync_engine as engine;
pub use grpsync_remote as remote;
pub use grpsync_store as store;

// Re-export main types for convenience
pub use error::{Result, SyncError};
pub use synchronizer::Synchronizer;

// Re-export commonly used component types
pub use grpsync_core::{
    ExportScope, Filter, LocalId, LocalRecord, RemoteId, RemoteItem, RemoteStoreId,
    SessionSettings, SyncKind, UserId,
};
pub use grpsync_engine::{LocalChange, SyncReport, SyncSession};
