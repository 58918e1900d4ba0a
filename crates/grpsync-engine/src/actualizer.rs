//! Event-driven metadata backfill outside sync sessions.
//!
//! Child records carry no linkage rows of their own; when one changes while
//! no session is running, the owning header's linkage row must still reflect
//! it so the next pass pushes the aggregate. Callers feed local change
//! events here from whatever change-notification channel the host offers.

use tracing::debug;

use grpsync_core::{LocalId, RemoteStoreId, SyncKind, SyncState, UserId};
use grpsync_store::SyncScope;

use crate::error::Result;
use crate::mapper::{mapper_for, SyncStore, PARENT_FIELD};

/// A local record change observed outside any sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalChange {
    Created,
    Updated,
    Deleted,
}

/// Kind owning `schema`, and whether `schema` is its header schema.
fn owning_kind(schema: &str) -> Option<(SyncKind, bool)> {
    for kind in SyncKind::ALL {
        if schema == kind.schema_name() {
            return Some((kind, true));
        }
        if mapper_for(kind)
            .child_specs()
            .iter()
            .any(|spec| spec.schema == schema)
        {
            return Some((kind, false));
        }
    }
    None
}

/// Reflect one local change event into the linkage row of its aggregate.
///
/// Child events roll up to the owning header. Returns whether a row was
/// touched; events for unmanaged schemas or unlinked records are no-ops, so
/// the caller can feed every change through without filtering first.
pub async fn actualize<S: SyncStore + ?Sized>(
    store: &S,
    owner: UserId,
    remote_store_id: &RemoteStoreId,
    schema: &str,
    local_id: LocalId,
    change: LocalChange,
) -> Result<bool> {
    let Some((kind, is_header)) = owning_kind(schema) else {
        return Ok(false);
    };
    let scope = SyncScope::new(owner, remote_store_id.clone(), kind.schema_name());

    let header_id = if is_header {
        local_id
    } else {
        let Some(child) = store.fetch(schema, local_id).await? else {
            return Ok(false);
        };
        let Some(parent) = child.int(PARENT_FIELD) else {
            return Ok(false);
        };
        LocalId(parent)
    };

    let Some(mut meta) = store.find_by_local(&scope, header_id).await? else {
        return Ok(false);
    };
    if meta.deleted {
        return Ok(false);
    }

    meta.local_state = if is_header && change == LocalChange::Deleted {
        SyncState::Deleted
    } else {
        SyncState::Modified
    };
    store.upsert(&meta).await?;
    debug!(
        schema,
        local_id = header_id.0,
        state = ?meta.local_state,
        "linkage row actualized"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use grpsync_core::{LocalRecord, RemoteId};
    use grpsync_store::{LocalStore, MemoryStore, MetadataRecord, MetadataStore};

    const OWNER: UserId = UserId(4);

    fn scope() -> SyncScope {
        SyncScope::new(OWNER, RemoteStoreId::new("box-a"), "crm.contact")
    }

    async fn linked_contact(store: &MemoryStore) -> LocalId {
        let mut record = LocalRecord::new("crm.contact");
        record.set("first_name", "Ada");
        let id = store.insert(record).await.unwrap();
        let meta = MetadataRecord::link(&scope(), id, RemoteId::new("r1"), Utc::now());
        store.upsert(&meta).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_header_update_marks_modified() {
        let store = MemoryStore::new();
        let id = linked_contact(&store).await;

        let touched = actualize(
            &store,
            OWNER,
            &RemoteStoreId::new("box-a"),
            "crm.contact",
            id,
            LocalChange::Updated,
        )
        .await
        .unwrap();
        assert!(touched);

        let meta = store.find_by_local(&scope(), id).await.unwrap().unwrap();
        assert_eq!(meta.local_state, SyncState::Modified);
    }

    #[tokio::test]
    async fn test_header_delete_marks_deleted() {
        let store = MemoryStore::new();
        let id = linked_contact(&store).await;

        actualize(
            &store,
            OWNER,
            &RemoteStoreId::new("box-a"),
            "crm.contact",
            id,
            LocalChange::Deleted,
        )
        .await
        .unwrap();

        let meta = store.find_by_local(&scope(), id).await.unwrap().unwrap();
        assert_eq!(meta.local_state, SyncState::Deleted);
    }

    #[tokio::test]
    async fn test_child_change_rolls_up_to_header() {
        let store = MemoryStore::new();
        let parent = linked_contact(&store).await;

        let mut email = LocalRecord::new("crm.contact.email");
        email.set(PARENT_FIELD, parent.0);
        email.set("email", "ada@x.io");
        let child_id = store.insert(email).await.unwrap();

        let touched = actualize(
            &store,
            OWNER,
            &RemoteStoreId::new("box-a"),
            "crm.contact.email",
            child_id,
            LocalChange::Created,
        )
        .await
        .unwrap();
        assert!(touched);

        let meta = store.find_by_local(&scope(), parent).await.unwrap().unwrap();
        assert_eq!(meta.local_state, SyncState::Modified);
    }

    #[tokio::test]
    async fn test_unlinked_and_unmanaged_records_are_noops() {
        let store = MemoryStore::new();
        let id = store.insert(LocalRecord::new("crm.contact")).await.unwrap();

        let unlinked = actualize(
            &store,
            OWNER,
            &RemoteStoreId::new("box-a"),
            "crm.contact",
            id,
            LocalChange::Updated,
        )
        .await
        .unwrap();
        assert!(!unlinked);

        let unmanaged = actualize(
            &store,
            OWNER,
            &RemoteStoreId::new("box-a"),
            "crm.invoice",
            id,
            LocalChange::Updated,
        )
        .await
        .unwrap();
        assert!(!unmanaged);
    }
}
