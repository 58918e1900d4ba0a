//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use grpsync_core::{Filter, LocalId, LocalRecord, RemoteId};

use crate::error::{Result, StoreError};
use crate::traits::{LocalStore, LockStore, MetadataRecord, MetadataStore, SyncScope};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Records indexed by id; schemas share one id sequence like SQLite's
    /// rowid does.
    records: BTreeMap<i64, LocalRecord>,
    next_id: i64,

    /// Metadata rows keyed by (local_id, schema, remote_store, owner).
    metadata: HashMap<(i64, String, String, i64), MetadataRecord>,

    /// Lock table: (identity, domain) -> owner.
    locks: HashMap<(String, String), String>,

    /// Watermarks keyed by (owner, remote_store, schema).
    watermarks: HashMap<(i64, String, String), DateTime<Utc>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                records: BTreeMap::new(),
                next_id: 1,
                metadata: HashMap::new(),
                locks: HashMap::new(),
                watermarks: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_key(record: &MetadataRecord) -> (i64, String, String, i64) {
    (
        record.local_id.0,
        record.schema.clone(),
        record.remote_store_id.0.clone(),
        record.owner_user_id.0,
    )
}

fn scope_key(scope: &SyncScope, local_id: LocalId) -> (i64, String, String, i64) {
    (
        local_id.0,
        scope.schema.clone(),
        scope.remote_store.0.clone(),
        scope.owner.0,
    )
}

fn in_scope(record: &MetadataRecord, scope: &SyncScope) -> bool {
    record.schema == scope.schema
        && record.remote_store_id == scope.remote_store
        && record.owner_user_id == scope.owner
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn query(&self, schema: &str, filter: &Filter) -> Result<Vec<LocalRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .records
            .values()
            .filter(|r| r.schema == schema && !r.is_deleted())
            .filter(|r| {
                let lookup = |name: &str| r.get(name).cloned();
                filter.matches(&lookup)
            })
            .cloned()
            .collect())
    }

    async fn fetch(&self, schema: &str, id: LocalId) -> Result<Option<LocalRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .records
            .get(&id.0)
            .filter(|r| r.schema == schema)
            .cloned())
    }

    async fn insert(&self, mut record: LocalRecord) -> Result<LocalId> {
        let mut inner = self.inner.write().unwrap();
        let id = LocalId(inner.next_id);
        inner.next_id += 1;
        record.apply_insert_defaults(Utc::now());
        record.id = Some(id);
        inner.records.insert(id.0, record);
        Ok(id)
    }

    async fn update(&self, record: &LocalRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| StoreError::Unsaved(record.schema.clone()))?;
        let mut inner = self.inner.write().unwrap();
        if !inner.records.contains_key(&id.0) {
            return Err(StoreError::NotFound {
                schema: record.schema.clone(),
                id: id.0,
            });
        }
        let mut updated = record.clone();
        updated.set("updated_at", Utc::now());
        inner.records.insert(id.0, updated);
        Ok(())
    }

    async fn delete(&self, schema: &str, id: LocalId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.records.get_mut(&id.0) {
            Some(record) if record.schema == schema => {
                record.set("deleted", true);
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                schema: schema.into(),
                id: id.0,
            }),
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn find_by_local(
        &self,
        scope: &SyncScope,
        local_id: LocalId,
    ) -> Result<Option<MetadataRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.metadata.get(&scope_key(scope, local_id)).cloned())
    }

    async fn find_by_remote(
        &self,
        scope: &SyncScope,
        remote_id: &RemoteId,
    ) -> Result<Option<MetadataRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .metadata
            .values()
            .find(|m| in_scope(m, scope) && &m.remote_id == remote_id)
            .cloned())
    }

    async fn upsert(&self, record: &MetadataRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.metadata.insert(metadata_key(record), record.clone());
        Ok(())
    }

    async fn soft_delete(&self, scope: &SyncScope, local_id: LocalId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(record) = inner.metadata.get_mut(&scope_key(scope, local_id)) {
            record.deleted = true;
            record.local_state = grpsync_core::SyncState::Deleted;
        }
        Ok(())
    }

    async fn list_for_scope(&self, scope: &SyncScope) -> Result<Vec<MetadataRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .metadata
            .values()
            .filter(|m| in_scope(m, scope) && !m.deleted)
            .cloned()
            .collect())
    }

    async fn linked_local_ids(&self, scope: &SyncScope) -> Result<Vec<LocalId>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .metadata
            .values()
            .filter(|m| in_scope(m, scope) && !m.deleted)
            .map(|m| m.local_id)
            .collect())
    }

    async fn watermark(&self, scope: &SyncScope) -> Result<Option<DateTime<Utc>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .watermarks
            .get(&(scope.owner.0, scope.remote_store.0.clone(), scope.schema.clone()))
            .copied())
    }

    async fn commit_watermark(&self, scope: &SyncScope, version: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.watermarks.insert(
            (scope.owner.0, scope.remote_store.0.clone(), scope.schema.clone()),
            version,
        );
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn try_lock(&self, identity: &str, domain: &str, owner: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let key = (identity.to_owned(), domain.to_owned());
        match inner.locks.get(&key) {
            Some(holder) => Ok(holder == owner),
            None => {
                inner.locks.insert(key, owner.to_owned());
                Ok(true)
            }
        }
    }

    async fn is_locked(&self, identity: &str, domain: &str, exclude_owner: &str) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        let key = (identity.to_owned(), domain.to_owned());
        Ok(matches!(inner.locks.get(&key), Some(h) if h != exclude_owner))
    }

    async fn release(&self, identity: &str, domain: &str, owner: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (identity.to_owned(), domain.to_owned());
        if inner.locks.get(&key).is_some_and(|h| h == owner) {
            inner.locks.remove(&key);
        }
        Ok(())
    }

    async fn release_session(&self, owner: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.locks.retain(|_, holder| holder != owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpsync_core::{RemoteStoreId, UserId};

    fn scope() -> SyncScope {
        SyncScope::new(UserId(1), RemoteStoreId::new("box"), "crm.contact")
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.insert(LocalRecord::new("crm.contact")).await.unwrap();
        let b = store.insert(LocalRecord::new("crm.message")).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_soft_delete_excluded_from_query() {
        let store = MemoryStore::new();
        let id = store.insert(LocalRecord::new("crm.contact")).await.unwrap();
        store.delete("crm.contact", id).await.unwrap();

        assert!(store.query("crm.contact", &Filter::All).await.unwrap().is_empty());
        // Still addressable by id.
        assert!(store.fetch("crm.contact", id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_by_remote_honors_scope() {
        let store = MemoryStore::new();
        let scope_a = scope();
        let record =
            MetadataRecord::link(&scope_a, LocalId(1), RemoteId::new("r1"), Utc::now());
        store.upsert(&record).await.unwrap();

        let other = SyncScope::new(UserId(2), RemoteStoreId::new("box"), "crm.contact");
        assert!(store
            .find_by_remote(&other, &RemoteId::new("r1"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_remote(&scope_a, &RemoteId::new("r1"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_release_only_own_lock() {
        let store = MemoryStore::new();
        assert!(store.try_lock("x", "d", "a").await.unwrap());
        store.release("x", "d", "b").await.unwrap();
        // Still held by a.
        assert!(store.is_locked("x", "d", "b").await.unwrap());
    }
}
