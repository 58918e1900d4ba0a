//! In-memory fake of the remote store.
//!
//! Backs the engine's tests: deterministic pagination, error injection for
//! the failure-isolation paths, and a log of notification-suppression flags
//! so tests can assert the per-kind toggle reached the boundary.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use grpsync_core::{Filter, FolderId, RemoteId, RemoteItem, SyncKind};

use crate::error::{RemoteError, Result};
use crate::folder::{descendants, Folder, FolderKind};
use crate::page::{Page, PageRequest};
use crate::traits::RemoteStore;

/// One recorded mutation, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationLogEntry {
    pub op: &'static str,
    pub remote_id: String,
    pub suppressed_notifications: bool,
}

struct Inner {
    folders: Vec<Folder>,
    /// Items keyed by base remote id, each placed in one folder.
    items: BTreeMap<String, (FolderId, RemoteItem)>,
    next_id: u64,
    /// Base ids that raise AccessDenied on bind.
    denied: HashSet<String>,
    /// Base ids whose mutations raise Transport errors.
    failing: HashSet<String>,
    /// Everything raises Transport errors while set.
    offline: bool,
    mutation_log: Vec<MutationLogEntry>,
}

/// In-memory remote store.
pub struct MemoryRemoteStore {
    inner: RwLock<Inner>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                folders: Vec::new(),
                items: BTreeMap::new(),
                next_id: 1,
                denied: HashSet::new(),
                failing: HashSet::new(),
                offline: false,
                mutation_log: Vec::new(),
            }),
        }
    }

    /// A store pre-seeded with one default folder per kind.
    pub fn with_default_folders() -> Self {
        let store = Self::new();
        store.add_folder(Folder::root("calendar", "Calendar", FolderKind::Calendar));
        store.add_folder(Folder::root("contacts", "Contacts", FolderKind::Contacts));
        store.add_folder(Folder::root("inbox", "Inbox", FolderKind::Mail));
        store
    }

    pub fn add_folder(&self, folder: Folder) {
        self.inner.write().unwrap().folders.push(folder);
    }

    /// Seed an item, assigning it a fresh identity.
    pub fn add_item(&self, folder: &FolderId, mut item: RemoteItem) -> RemoteId {
        let mut inner = self.inner.write().unwrap();
        let id = RemoteId::new(format!("item-{}", inner.next_id));
        inner.next_id += 1;
        item.remote_id = id.clone();
        inner.items.insert(id.id.clone(), (folder.clone(), item));
        id
    }

    pub fn get(&self, remote_id: &RemoteId) -> Option<RemoteItem> {
        self.inner
            .read()
            .unwrap()
            .items
            .get(&remote_id.id)
            .map(|(_, item)| item.clone())
    }

    pub fn remove(&self, remote_id: &RemoteId) {
        self.inner.write().unwrap().items.remove(&remote_id.id);
    }

    /// Make bind of this id raise AccessDenied.
    pub fn deny(&self, remote_id: &RemoteId) {
        self.inner.write().unwrap().denied.insert(remote_id.id.clone());
    }

    /// Make mutations of this id raise Transport errors.
    pub fn fail_mutations_of(&self, remote_id: &RemoteId) {
        self.inner.write().unwrap().failing.insert(remote_id.id.clone());
    }

    /// Toggle total connectivity failure.
    pub fn set_offline(&self, offline: bool) {
        self.inner.write().unwrap().offline = offline;
    }

    pub fn mutation_log(&self) -> Vec<MutationLogEntry> {
        self.inner.read().unwrap().mutation_log.clone()
    }

    pub fn item_count(&self) -> usize {
        self.inner.read().unwrap().items.len()
    }

    fn check_online(inner: &Inner) -> Result<()> {
        if inner.offline {
            return Err(RemoteError::Transport("store offline".into()));
        }
        Ok(())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn bind(&self, remote_id: &RemoteId) -> Result<RemoteItem> {
        let inner = self.inner.read().unwrap();
        Self::check_online(&inner)?;
        if inner.denied.contains(&remote_id.id) {
            return Err(RemoteError::AccessDenied(remote_id.clone()));
        }
        match inner.items.get(&remote_id.id) {
            Some((_, item)) => {
                // An instance id binds to the series item under the
                // requested composite identity.
                let mut item = item.clone();
                item.remote_id = remote_id.clone();
                Ok(item)
            }
            None => Err(RemoteError::NotFound(remote_id.clone())),
        }
    }

    async fn search(
        &self,
        folder: &FolderId,
        filter: &Filter,
        page: PageRequest,
    ) -> Result<Page<RemoteItem>> {
        let inner = self.inner.read().unwrap();
        Self::check_online(&inner)?;
        if !inner.folders.iter().any(|f| &f.id == folder) {
            return Err(RemoteError::FolderNotFound(folder.to_string()));
        }
        // BTreeMap iteration gives a stable order across pages.
        let matching: Vec<RemoteItem> = inner
            .items
            .values()
            .filter(|(f, _)| f == folder)
            .map(|(_, item)| item)
            .filter(|item| {
                let lookup = |name: &str| item.property(name);
                filter.matches(&lookup)
            })
            .cloned()
            .collect();
        Ok(Page::slice(matching, page))
    }

    async fn folders(&self, filter: Option<&Filter>, recursive: bool) -> Result<Vec<Folder>> {
        let inner = self.inner.read().unwrap();
        Self::check_online(&inner)?;

        let matches_filter = |folder: &Folder| match filter {
            None => true,
            Some(f) => {
                let lookup = |name: &str| match name {
                    "name" => Some(grpsync_core::Value::Text(folder.name.clone())),
                    "id" => Some(grpsync_core::Value::Text(folder.id.to_string())),
                    _ => None,
                };
                f.matches(&lookup)
            }
        };

        if !recursive {
            return Ok(inner.folders.iter().filter(|f| matches_filter(f)).cloned().collect());
        }

        let roots: Vec<FolderId> = inner
            .folders
            .iter()
            .filter(|f| f.parent.is_none() && matches_filter(f))
            .map(|f| f.id.clone())
            .collect();
        Ok(descendants(&inner.folders, &roots).into_iter().cloned().collect())
    }

    async fn create(
        &self,
        folder: &FolderId,
        item: &RemoteItem,
        suppress_notifications: bool,
    ) -> Result<RemoteId> {
        let mut inner = self.inner.write().unwrap();
        Self::check_online(&inner)?;
        let id = RemoteId::new(format!("item-{}", inner.next_id));
        inner.next_id += 1;

        let mut stored = item.clone();
        stored.remote_id = id.clone();
        stored.version = Utc::now();
        inner.items.insert(id.id.clone(), (folder.clone(), stored));
        inner.mutation_log.push(MutationLogEntry {
            op: "create",
            remote_id: id.to_string(),
            suppressed_notifications: suppress_notifications,
        });
        Ok(id)
    }

    async fn update(&self, item: &RemoteItem, suppress_notifications: bool) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        Self::check_online(&inner)?;
        if inner.failing.contains(&item.remote_id.id) {
            return Err(RemoteError::Transport(format!(
                "injected failure updating {}",
                item.remote_id
            )));
        }
        let Some((_, stored)) = inner.items.get_mut(&item.remote_id.id) else {
            return Err(RemoteError::NotFound(item.remote_id.clone()));
        };
        let folder_kept = stored.clone();
        *stored = item.clone();
        stored.version = Utc::now();
        // The link property survives unless the caller set a new one.
        if stored.local_link.is_none() {
            stored.local_link = folder_kept.local_link;
        }
        inner.mutation_log.push(MutationLogEntry {
            op: "update",
            remote_id: item.remote_id.to_string(),
            suppressed_notifications: suppress_notifications,
        });
        Ok(())
    }

    async fn delete(&self, remote_id: &RemoteId, suppress_notifications: bool) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        Self::check_online(&inner)?;
        if inner.failing.contains(&remote_id.id) {
            return Err(RemoteError::Transport(format!(
                "injected failure deleting {remote_id}"
            )));
        }
        if inner.items.remove(&remote_id.id).is_none() {
            return Err(RemoteError::NotFound(remote_id.clone()));
        }
        inner.mutation_log.push(MutationLogEntry {
            op: "delete",
            remote_id: remote_id.to_string(),
            suppressed_notifications: suppress_notifications,
        });
        Ok(())
    }

    async fn default_folder(&self, kind: SyncKind) -> Result<FolderId> {
        let inner = self.inner.read().unwrap();
        Self::check_online(&inner)?;
        let wanted = FolderKind::for_sync_kind(kind);
        inner
            .folders
            .iter()
            .find(|f| f.kind == wanted && f.parent.is_none())
            .map(|f| f.id.clone())
            .ok_or_else(|| RemoteError::FolderNotFound(format!("default for {kind}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpsync_core::{RemotePayload, SyncKind};

    fn contact_item(first: &str) -> RemoteItem {
        let mut item = RemoteItem::blank(SyncKind::Contact);
        if let RemotePayload::Contact(c) = &mut item.payload {
            c.first_name = first.into();
        }
        item
    }

    #[tokio::test]
    async fn test_pagination_no_duplicates_no_drops() {
        let store = MemoryRemoteStore::with_default_folders();
        let folder = store.default_folder(SyncKind::Contact).await.unwrap();
        for i in 0..7 {
            store.add_item(&folder, contact_item(&format!("c{i}")));
        }

        let mut request = PageRequest::first(3);
        let mut seen = Vec::new();
        loop {
            let page = store.search(&folder, &Filter::All, request).await.unwrap();
            assert!(page.items.len() <= 3);
            seen.extend(page.items.into_iter().map(|i| i.remote_id));
            match page.next_offset {
                Some(next) => request = request.continue_at(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 7);
        let distinct: std::collections::HashSet<_> = seen.iter().collect();
        assert_eq!(distinct.len(), 7);
    }

    #[tokio::test]
    async fn test_bind_distinguishes_errors() {
        let store = MemoryRemoteStore::with_default_folders();
        let folder = store.default_folder(SyncKind::Contact).await.unwrap();
        let id = store.add_item(&folder, contact_item("x"));

        assert!(store.bind(&id).await.is_ok());
        assert!(matches!(
            store.bind(&RemoteId::new("ghost")).await,
            Err(RemoteError::NotFound(_))
        ));

        store.deny(&id);
        assert!(matches!(store.bind(&id).await, Err(RemoteError::AccessDenied(_))));

        store.set_offline(true);
        assert!(matches!(store.bind(&id).await, Err(RemoteError::Transport(_))));
    }

    #[tokio::test]
    async fn test_mutation_log_records_suppression() {
        let store = MemoryRemoteStore::with_default_folders();
        let folder = store.default_folder(SyncKind::Contact).await.unwrap();
        let id = store.create(&folder, &contact_item("y"), true).await.unwrap();
        store.delete(&id, false).await.unwrap();

        let log = store.mutation_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].suppressed_notifications);
        assert!(!log[1].suppressed_notifications);
    }
}
