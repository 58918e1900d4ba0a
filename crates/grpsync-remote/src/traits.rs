//! The remote store trait: the abstract interface to the groupware side.
//!
//! Connection setup, credentials, and the wire protocol live outside this
//! boundary; the engine only sees bind/search/folder/apply operations.

use async_trait::async_trait;

use grpsync_core::{Filter, FolderId, RemoteId, RemoteItem, SyncKind};

use crate::error::Result;
use crate::folder::Folder;
use crate::page::{Page, PageRequest};

/// The remote groupware store boundary.
///
/// # Design Notes
///
/// - **Distinguishable failures**: `bind` raises `NotFound`/`AccessDenied`
///   for the per-item tier and `Transport` for the session tier; callers
///   decide which to swallow.
/// - **Pagination**: `search` never returns more than the requested page;
///   the continuation offset must be followed until exhausted.
/// - **Notification suppression**: every mutation takes an explicit toggle;
///   whether to suppress is per-kind session policy, not store policy.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rehydrate one item by previously stored identity.
    async fn bind(&self, remote_id: &RemoteId) -> Result<RemoteItem>;

    /// Paginated search within one folder against a filter tree.
    async fn search(
        &self,
        folder: &FolderId,
        filter: &Filter,
        page: PageRequest,
    ) -> Result<Page<RemoteItem>>;

    /// Folder discovery: flat list, or a filtered recursive walk from the
    /// store's roots when `recursive` is set.
    async fn folders(&self, filter: Option<&Filter>, recursive: bool) -> Result<Vec<Folder>>;

    /// Create an item; returns the identity the store assigned.
    async fn create(&self, folder: &FolderId, item: &RemoteItem, suppress_notifications: bool)
        -> Result<RemoteId>;

    /// Update an item in place.
    async fn update(&self, item: &RemoteItem, suppress_notifications: bool) -> Result<()>;

    /// Delete an item by identity.
    async fn delete(&self, remote_id: &RemoteId, suppress_notifications: bool) -> Result<()>;

    /// Default folder for a kind (where exported creates land).
    async fn default_folder(&self, kind: SyncKind) -> Result<FolderId>;
}
