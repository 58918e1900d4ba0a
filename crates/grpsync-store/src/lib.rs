//! Storage for grpsync: the local relational store, the durable metadata
//! linkage, and the cross-session lock table.
//!
//! Three traits define the boundary ([`LocalStore`], [`MetadataStore`],
//! [`LockStore`]); [`SqliteStore`] implements all of them against one
//! database file and [`MemoryStore`] mirrors the semantics for tests.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{LocalStore, LockStore, MetadataRecord, MetadataStore, SyncScope};
