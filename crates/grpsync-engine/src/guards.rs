//! Pre-write validators.
//!
//! Each guard inspects one precondition and yields a skip reason instead of
//! an error; a skipped item is counted and logged, never failed. Guards run
//! before any write in either direction.

use grpsync_core::{Filter, FolderId, RemoteItem, RemotePayload, Value};
use grpsync_remote::{PageRequest, RemoteStore};

use crate::error::Result;
use crate::session::SyncSession;

/// Why a candidate was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The remote identity is empty; the item cannot be linked.
    UnstableIdentity,
    /// Another session holds the lock for this identity and domain.
    Locked,
    /// The local aggregate is soft-deleted and delete propagation is off.
    LocallyDeleted,
    /// The appointment is organized by another account that syncs itself.
    ForeignOrganizer,
    /// A content-equal unlinked item already exists remotely.
    DuplicateRemote,
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Skip::UnstableIdentity => "unstable remote identity",
            Skip::Locked => "locked by another session",
            Skip::LocallyDeleted => "locally deleted",
            Skip::ForeignOrganizer => "organized by a self-syncing account",
            Skip::DuplicateRemote => "content-equal remote item exists",
        })
    }
}

/// Items without a stable external identity cannot be linked.
pub fn stable_identity(item: &RemoteItem) -> Option<Skip> {
    (!item.remote_id.is_stable()).then_some(Skip::UnstableIdentity)
}

/// Lock identity for a remote-linked aggregate, or for a local-only one.
pub fn lock_identity(remote_base_id: Option<&str>, local_id: Option<i64>) -> String {
    match (remote_base_id, local_id) {
        (Some(base), _) => base.to_owned(),
        (None, Some(id)) => format!("local:{id}"),
        (None, None) => String::new(),
    }
}

/// An appointment organized by another account that runs its own sync session
/// is skipped; that session owns the item.
pub fn organizer_guard(session: &SyncSession, item: &RemoteItem) -> Option<Skip> {
    let appt = item.appointment()?;
    let organizer = appt.organizer.as_deref()?;
    if Some(organizer) == session.own_account() {
        return None;
    }
    session
        .cache
        .has_active_sync(organizer)
        .then_some(Skip::ForeignOrganizer)
}

/// Content-equality predicate used by duplicate suppression.
///
/// Compares the discriminating fields of a kind; `crm_link IS NULL` restricts
/// the match to items that never originated from a local record.
pub fn duplicate_filter(item: &RemoteItem) -> Filter {
    let mut parts = vec![Filter::is_null("crm_link")];
    match &item.payload {
        RemotePayload::Appointment(a) => {
            parts.push(Filter::eq("subject", a.subject.as_str()));
            match &a.location {
                Some(loc) => parts.push(Filter::eq("location", loc.as_str())),
                None => parts.push(Filter::is_null("location")),
            }
            if let Some(start) = a.start {
                parts.push(Filter::eq("start", start));
            }
            if let Some(end) = a.end {
                parts.push(Filter::eq("end", end));
            }
            parts.push(Filter::eq("priority", Value::Int(a.priority)));
        }
        RemotePayload::Contact(c) => {
            parts.push(Filter::eq("first_name", c.first_name.as_str()));
            parts.push(Filter::eq("last_name", c.last_name.as_str()));
        }
        RemotePayload::Message(m) => {
            parts.push(Filter::eq("subject", m.subject.as_str()));
            if let Some(sent) = m.sent_at {
                parts.push(Filter::eq("sent_at", sent));
            }
        }
    }
    Filter::and(parts)
}

/// Import-direction twin predicate over local header fields.
///
/// Matches the discriminating fields of a kind against the column names the
/// mappers write, so an incoming item can adopt a content-equal local record
/// that never synced instead of duplicating it.
pub fn local_twin_filter(item: &RemoteItem) -> Filter {
    let mut parts = Vec::new();
    match &item.payload {
        RemotePayload::Appointment(a) => {
            parts.push(Filter::eq("title", a.subject.as_str()));
            match &a.location {
                Some(loc) => parts.push(Filter::eq("location", loc.as_str())),
                None => parts.push(Filter::is_null("location")),
            }
            if let Some(start) = a.start {
                parts.push(Filter::eq("start_at", start));
            }
            if let Some(end) = a.end {
                parts.push(Filter::eq("end_at", end));
            }
            parts.push(Filter::eq("priority", Value::Int(a.priority)));
        }
        RemotePayload::Contact(c) => {
            parts.push(Filter::eq("first_name", c.first_name.as_str()));
            parts.push(Filter::eq("last_name", c.last_name.as_str()));
        }
        RemotePayload::Message(m) => {
            parts.push(Filter::eq("subject", m.subject.as_str()));
            if let Some(sent) = m.sent_at {
                parts.push(Filter::eq("sent_at", sent));
            }
        }
    }
    Filter::and(parts)
}

/// Whether a content-equal, unlinked item already exists in `folder`.
///
/// Runs before every remote create so a pass that died between create and
/// metadata commit never produces a second copy.
pub async fn duplicate_guard<R: RemoteStore + ?Sized>(
    remote: &R,
    folder: &FolderId,
    candidate: &RemoteItem,
    page_size: usize,
) -> Result<Option<Skip>> {
    let filter = duplicate_filter(candidate);
    let page = remote
        .search(folder, &filter, PageRequest::first(page_size))
        .await?;
    Ok((!page.items.is_empty()).then_some(Skip::DuplicateRemote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpsync_core::{RemoteId, RemoteStoreId, SessionSettings, SyncKind, UserId};
    use grpsync_remote::MemoryRemoteStore;

    fn session() -> SyncSession {
        SyncSession::new(
            SessionSettings::default(),
            UserId(1),
            RemoteStoreId::new("box-a"),
        )
    }

    fn appointment(subject: &str, organizer: Option<&str>) -> RemoteItem {
        let mut item = RemoteItem::blank(SyncKind::Appointment);
        item.remote_id = RemoteId::new("r1");
        if let Some(a) = item.appointment_mut() {
            a.subject = subject.into();
            a.organizer = organizer.map(str::to_owned);
        }
        item
    }

    #[test]
    fn test_unstable_identity_skipped() {
        let mut item = appointment("x", None);
        item.remote_id = RemoteId::new("");
        assert_eq!(stable_identity(&item), Some(Skip::UnstableIdentity));
        assert_eq!(stable_identity(&appointment("x", None)), None);
    }

    #[test]
    fn test_lock_identity_prefers_remote_base() {
        assert_eq!(lock_identity(Some("abc"), Some(3)), "abc");
        assert_eq!(lock_identity(None, Some(3)), "local:3");
    }

    #[test]
    fn test_organizer_guard() {
        let mut session = session();
        session.cache.account_name(UserId(1), || "me@corp".into());
        session.cache.mark_active_sync_account("other@corp");

        // Own appointments and unknown organizers pass.
        assert_eq!(organizer_guard(&session, &appointment("x", Some("me@corp"))), None);
        assert_eq!(organizer_guard(&session, &appointment("x", Some("guest@ext"))), None);
        assert_eq!(organizer_guard(&session, &appointment("x", None)), None);

        // A self-syncing foreign organizer owns the item.
        assert_eq!(
            organizer_guard(&session, &appointment("x", Some("other@corp"))),
            Some(Skip::ForeignOrganizer)
        );
    }

    #[tokio::test]
    async fn test_local_twin_filter_matches_header_columns() {
        use grpsync_core::LocalRecord;
        use grpsync_store::{LocalStore, MemoryStore};

        let store = MemoryStore::new();
        let mut record = LocalRecord::new("crm.appointment");
        record.set("title", "Review");
        record.set("priority", 0i64);
        store.insert(record).await.unwrap();

        let hits = store
            .query("crm.appointment", &local_twin_filter(&appointment("Review", None)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .query("crm.appointment", &local_twin_filter(&appointment("Other", None)))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_guard_matches_unlinked_equal_content() {
        let store = MemoryRemoteStore::with_default_folders();
        let folder = store.default_folder(SyncKind::Appointment).await.unwrap();
        store.add_item(&folder, appointment("Review", None));

        let skip = duplicate_guard(&store, &folder, &appointment("Review", None), 50)
            .await
            .unwrap();
        assert_eq!(skip, Some(Skip::DuplicateRemote));

        let other = duplicate_guard(&store, &folder, &appointment("Other", None), 50)
            .await
            .unwrap();
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn test_duplicate_guard_ignores_linked_items() {
        let store = MemoryRemoteStore::with_default_folders();
        let folder = store.default_folder(SyncKind::Appointment).await.unwrap();
        let mut linked = appointment("Review", None);
        linked.local_link = Some("42".into());
        store.add_item(&folder, linked);

        let skip = duplicate_guard(&store, &folder, &appointment("Review", None), 50)
            .await
            .unwrap();
        assert_eq!(skip, None);
    }
}
