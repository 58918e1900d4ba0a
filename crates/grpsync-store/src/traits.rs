//! Store traits: the abstract interfaces for local records, metadata
//! linkage, and the cross-session lock table.
//!
//! These traits keep the engine storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests). All methods are async; the
//! SQLite backend serializes access behind a mutex internally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use grpsync_core::{
    ExtensionPayload, Filter, LocalId, LocalRecord, RemoteId, RemoteStoreId, SyncState, UserId,
};

use crate::error::Result;

/// Scope of metadata and watermarks: one (user, remote store, schema).
///
/// The same local record may link to multiple remote stores without
/// collision; every metadata lookup is bounded by this scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncScope {
    pub owner: UserId,
    pub remote_store: RemoteStoreId,
    pub schema: String,
}

impl SyncScope {
    pub fn new(owner: UserId, remote_store: RemoteStoreId, schema: impl Into<String>) -> Self {
        Self {
            owner,
            remote_store,
            schema: schema.into(),
        }
    }
}

/// Durable row linking a local record to a remote identity.
///
/// Created on the first successful create in either direction, updated every
/// pass either side changes, soft-deleted when removed on either side. The
/// only durable cross-session state the engine keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub local_id: LocalId,
    pub remote_id: RemoteId,
    pub schema: String,
    /// Version watermark of the item at the last successful pass.
    pub version: DateTime<Utc>,
    pub local_state: SyncState,
    pub remote_state: SyncState,
    pub owner_user_id: UserId,
    pub remote_store_id: RemoteStoreId,
    /// Typed extension payload, persisted as the ExtraParameters JSON column.
    pub extra: ExtensionPayload,
    pub deleted: bool,
}

impl MetadataRecord {
    /// A fresh linkage row for a just-created pairing.
    pub fn link(
        scope: &SyncScope,
        local_id: LocalId,
        remote_id: RemoteId,
        version: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id,
            remote_id,
            schema: scope.schema.clone(),
            version,
            local_state: SyncState::Unchanged,
            remote_state: SyncState::Unchanged,
            owner_user_id: scope.owner,
            remote_store_id: scope.remote_store.clone(),
            extra: ExtensionPayload::new(),
            deleted: false,
        }
    }
}

/// The local relational store boundary.
///
/// # Design Notes
///
/// - **Attribute filters**: `query` evaluates the same [`Filter`] tree the
///   remote contract uses; SQL generation is outside this boundary.
/// - **Default initialization**: `insert` applies schema defaults to fields
///   the caller left unset.
/// - **Soft deletes**: `delete` sets the `deleted` flag; rows stay
///   addressable by id.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Query records of a schema by attribute filter. Soft-deleted records
    /// are excluded.
    async fn query(&self, schema: &str, filter: &Filter) -> Result<Vec<LocalRecord>>;

    /// Fetch one record by identity, including soft-deleted ones.
    async fn fetch(&self, schema: &str, id: LocalId) -> Result<Option<LocalRecord>>;

    /// Insert a record, applying default-value initialization, and return
    /// its new identity.
    async fn insert(&self, record: LocalRecord) -> Result<LocalId>;

    /// Update an existing record. Bumps `updated_at`.
    async fn update(&self, record: &LocalRecord) -> Result<()>;

    /// Soft-delete a record.
    async fn delete(&self, schema: &str, id: LocalId) -> Result<()>;
}

/// The metadata-linkage store boundary.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Find the linkage row for a local record within a scope.
    async fn find_by_local(
        &self,
        scope: &SyncScope,
        local_id: LocalId,
    ) -> Result<Option<MetadataRecord>>;

    /// Find the linkage row for a remote identity within a scope.
    async fn find_by_remote(
        &self,
        scope: &SyncScope,
        remote_id: &RemoteId,
    ) -> Result<Option<MetadataRecord>>;

    /// Insert or update a linkage row. The row is keyed by
    /// `(local_id, schema, remote_store_id, owner_user_id)`.
    async fn upsert(&self, record: &MetadataRecord) -> Result<()>;

    /// Soft-delete the linkage row for a local record within a scope.
    async fn soft_delete(&self, scope: &SyncScope, local_id: LocalId) -> Result<()>;

    /// All live linkage rows within a scope.
    async fn list_for_scope(&self, scope: &SyncScope) -> Result<Vec<MetadataRecord>>;

    /// Local ids that already have a live linkage row within a scope.
    ///
    /// Used to find export candidates: local records NOT in this set.
    async fn linked_local_ids(&self, scope: &SyncScope) -> Result<Vec<LocalId>>;

    /// Last committed watermark for a scope.
    async fn watermark(&self, scope: &SyncScope) -> Result<Option<DateTime<Utc>>>;

    /// Commit a new watermark for a scope.
    async fn commit_watermark(&self, scope: &SyncScope, version: DateTime<Utc>) -> Result<()>;
}

/// The shared cross-session lock table.
///
/// Keyed by `(identity, lock domain)`; distinct domains never contend.
/// Locking conflicts are never errors: callers observing a held lock set
/// the item's action to `None` and move on.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Acquire a lock. Returns `false` when another owner holds it.
    /// Re-acquiring one's own lock succeeds.
    async fn try_lock(&self, identity: &str, domain: &str, owner: &str) -> Result<bool>;

    /// Whether a lock is held by any owner other than `exclude_owner`.
    async fn is_locked(&self, identity: &str, domain: &str, exclude_owner: &str) -> Result<bool>;

    /// Release one lock held by `owner`. Releasing an unheld lock is a no-op.
    async fn release(&self, identity: &str, domain: &str, owner: &str) -> Result<()>;

    /// Release every lock held by `owner`. The lock-expiry analog: a locked
    /// aggregate becomes eligible again once its owning session finishes.
    async fn release_session(&self, owner: &str) -> Result<()>;
}
