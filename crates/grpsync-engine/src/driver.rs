//! The per-kind sync driver.
//!
//! One `run_pass` call imports remote changes since the committed watermark,
//! exports unlinked local aggregates, and commits the new watermark. Failures
//! are tiered: per-item errors are isolated inside the loops, transport
//! errors end the pass and count toward session suspension, everything else
//! is rethrown.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use grpsync_core::{
    Filter, FolderId, LocalId, RemoteId, RemoteItem, SyncAction, SyncKind, SyncState,
};
use grpsync_remote::{FolderKind, RemoteError, RemoteStore};
use grpsync_store::MetadataRecord;

use crate::conflict::{resolve, ConflictInput, Resolution};
use crate::enumerate::ChangeEnumerator;
use crate::error::{EngineError, Result};
use crate::guards::{
    duplicate_guard, local_twin_filter, lock_identity, organizer_guard, stable_identity, Skip,
};
use crate::mapper::{load_aggregate, mapper_for, new_aggregate, save_aggregate, SyncStore};
use crate::recurrence::supersede_single_instance;
use crate::report::SyncReport;
use crate::session::SyncSession;

/// What one processed candidate amounted to.
enum Outcome {
    Imported,
    Exported,
    UpdatedLocal,
    UpdatedRemote,
    Deleted,
    Skipped(Skip),
    Noop,
}

/// Drives synchronization passes for one (store, remote) pairing.
pub struct SyncDriver<'a, S: ?Sized, R: ?Sized> {
    store: &'a S,
    remote: &'a R,
}

impl<'a, S, R> SyncDriver<'a, S, R>
where
    S: SyncStore + ?Sized,
    R: RemoteStore + ?Sized,
{
    pub fn new(store: &'a S, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Run one full pass for a kind.
    ///
    /// Returns `Ok` with `report.success == false` when a transport failure
    /// ended the pass early; the watermark is not committed in that case, so
    /// the next pass re-enumerates the same changes.
    pub async fn run_pass(&self, session: &mut SyncSession, kind: SyncKind) -> Result<SyncReport> {
        if session.is_suspended() {
            return Err(EngineError::SessionSuspended {
                consecutive_failures: session.consecutive_failures(),
            });
        }

        let mut report = SyncReport::default();
        let mut watermark = None;

        if session.settings.import_enabled {
            match self.import_pass(session, kind, &mut report).await {
                Ok(wm) => watermark = wm,
                Err(err) if err.is_recoverable_per_session() => {
                    warn!(kind = %kind, error = %err, "import pass aborted");
                    session.record_failure();
                    report.record_error(kind, &err);
                    return Ok(report);
                }
                Err(err) => return Err(err),
            }
        }

        if session.settings.exports(kind) {
            match self.export_pass(session, kind, &mut report).await {
                Ok(()) => {}
                Err(err) if err.is_recoverable_per_session() => {
                    warn!(kind = %kind, error = %err, "export pass aborted");
                    session.record_failure();
                    report.record_error(kind, &err);
                    return Ok(report);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(wm) = watermark {
            self.store.commit_watermark(&session.scope(kind), wm).await?;
        }
        session.clear_failures();
        report.success = true;
        Ok(report)
    }

    async fn import_pass(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        report: &mut SyncReport,
    ) -> Result<Option<DateTime<Utc>>> {
        let scope = session.scope(kind);
        let watermark = self.store.watermark(&scope).await?;
        let folders = self.import_folders(session, kind).await?;
        let mut high = watermark;
        let mut seen: HashSet<String> = HashSet::new();

        for folder in folders {
            let mut changes =
                ChangeEnumerator::new(self.remote, folder, watermark, &session.settings);
            loop {
                let Some(item) = changes.next().await? else { break };
                seen.insert(item.remote_id.id.clone());
                match self.import_item(session, kind, item).await {
                    Ok(outcome) => tally(report, outcome),
                    Err(err) if err.is_recoverable_per_item() => {
                        warn!(kind = %kind, error = %err, "item skipped after failure");
                        report.record_error(kind, &err);
                    }
                    Err(err) => return Err(err),
                }
            }
            if let Some(wm) = changes.high_watermark() {
                high = Some(high.map_or(wm, |h| h.max(wm)));
            }
        }
        self.sweep_departed(session, kind, &seen, report).await?;
        Ok(high)
    }

    /// Find linked items the enumeration no longer returns and check whether
    /// they still exist remotely. Rebinding the stored identity tells
    /// "unchanged since the watermark" apart from "gone"; a per-item
    /// recoverable bind failure becomes a tombstone fed through the normal
    /// import flow.
    async fn sweep_departed(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        seen: &HashSet<String>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let scope = session.scope(kind);
        for meta in self.store.list_for_scope(&scope).await? {
            if meta.deleted || seen.contains(&meta.remote_id.id) {
                continue;
            }
            // Instances share the base identity; the master is what exists.
            let base = RemoteId::new(meta.remote_id.id.clone());
            match self.remote.bind(&base).await {
                Ok(_) => continue,
                Err(err) if err.is_recoverable_per_item() => {
                    let tombstone = RemoteItem::tombstone(meta.remote_id.clone(), kind);
                    match self.import_item(session, kind, tombstone).await {
                        Ok(outcome) => tally(report, outcome),
                        Err(err) if err.is_recoverable_per_item() => {
                            warn!(kind = %kind, error = %err, "tombstone apply skipped");
                            report.record_error(kind, &err);
                        }
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// A content-equal local record that never synced adopts the incoming
    /// identity instead of being duplicated.
    async fn find_unsynced_twin(
        &self,
        scope: &grpsync_store::SyncScope,
        kind: SyncKind,
        item: &RemoteItem,
    ) -> Result<Option<LocalId>> {
        let candidates = self
            .store
            .query(kind.schema_name(), &local_twin_filter(item))
            .await?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let linked: HashSet<i64> = self
            .store
            .linked_local_ids(scope)
            .await?
            .into_iter()
            .map(|id| id.0)
            .collect();
        Ok(candidates
            .into_iter()
            .filter(|r| !r.is_deleted())
            .filter_map(|r| r.id)
            .find(|id| !linked.contains(&id.0)))
    }

    async fn import_folders(
        &self,
        session: &SyncSession,
        kind: SyncKind,
    ) -> Result<Vec<FolderId>> {
        if !session.settings.import_all_folders {
            return Ok(session.settings.selected_folder_ids.clone());
        }
        let wanted = FolderKind::for_sync_kind(kind);
        let folders = self.remote.folders(None, true).await?;
        Ok(folders
            .into_iter()
            .filter(|f| f.kind == wanted)
            .map(|f| f.id)
            .collect())
    }

    async fn import_item(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        mut item: RemoteItem,
    ) -> Result<Outcome> {
        if let Some(skip) = stable_identity(&item) {
            return Ok(Outcome::Skipped(skip));
        }
        if let Some(skip) = organizer_guard(session, &item) {
            return Ok(Outcome::Skipped(skip));
        }
        let scope = session.scope(kind);

        // First occurrence of a series that used to be a single item: retire
        // the old representation exactly once, then materialize instances.
        if item.remote_id.is_instance() {
            let base = RemoteId::new(item.remote_id.id.clone());
            if let Some(base_meta) = self.store.find_by_remote(&scope, &base).await? {
                if !base_meta.deleted {
                    self.retire_aggregate(session, kind, &base_meta).await?;
                    item.action = SyncAction::CreateRecurringMaster;
                }
            }
        }

        let identity = item.remote_id.id.clone();
        if !self
            .store
            .try_lock(&identity, kind.lock_domain(), &session.session_id)
            .await?
        {
            return Ok(Outcome::Skipped(Skip::Locked));
        }

        let metadata = self
            .store
            .find_by_remote(&scope, &item.remote_id)
            .await?
            .filter(|m| !m.deleted);

        if item.is_tombstone() {
            let Some(meta) = metadata else {
                return Ok(Outcome::Noop);
            };
            self.retire_aggregate(session, kind, &meta).await?;
            return Ok(Outcome::Deleted);
        }

        let mapper = mapper_for(kind);
        let hash = mapper.content_hash(&item);

        let mut local = match &metadata {
            Some(meta) => load_aggregate(self.store, kind, meta.local_id)
                .await?
                .unwrap_or_else(|| new_aggregate(kind)),
            None => match self.find_unsynced_twin(&scope, kind, &item).await? {
                Some(twin) => load_aggregate(self.store, kind, twin)
                    .await?
                    .unwrap_or_else(|| new_aggregate(kind)),
                None => new_aggregate(kind),
            },
        };
        if metadata.is_some() && local.header.record.is_deleted() {
            return Ok(Outcome::Skipped(Skip::LocallyDeleted));
        }
        let local_modified = local.header.record.datetime("updated_at");

        let resolution = resolve(&ConflictInput {
            remote: &item,
            metadata: metadata.as_ref(),
            local_modified,
            remote_hash: Some(&hash),
            hash_suppression: session.settings.hash_suppression_enabled(kind),
        });

        match resolution {
            Resolution::ApplyToLocal => {
                let was_linked = metadata.is_some();
                mapper.pull(&item, &mut local);
                let wrote = local.entities().any(|e| e.action.is_write());
                let local_id = save_aggregate(self.store, &mut local).await?;
                self.link(&scope, local_id, metadata, &item, kind).await?;
                Ok(if !was_linked {
                    Outcome::Imported
                } else if wrote {
                    Outcome::UpdatedLocal
                } else {
                    Outcome::Noop
                })
            }
            Resolution::ApplyToRemote => {
                let mut out = item.clone();
                mapper.push(&mut local, &mut out);
                if mapper.content_hash(&out) == hash {
                    // Both sides already hold the same content.
                    if let Some(local_id) = local.header.record.id {
                        self.link(&scope, local_id, metadata, &item, kind).await?;
                    }
                    return Ok(Outcome::Noop);
                }
                self.remote
                    .update(&out, session.settings.suppresses_notifications(kind))
                    .await?;
                // Persist the slot markers `push` may have assigned.
                let local_id = save_aggregate(self.store, &mut local).await?;
                out.version = item.version;
                self.link(&scope, local_id, metadata, &out, kind).await?;
                Ok(Outcome::UpdatedRemote)
            }
        }
    }

    /// Upsert the linkage row with the denormalized payload for this pass.
    async fn link(
        &self,
        scope: &grpsync_store::SyncScope,
        local_id: LocalId,
        metadata: Option<MetadataRecord>,
        item: &RemoteItem,
        kind: SyncKind,
    ) -> Result<()> {
        let mapper = mapper_for(kind);
        let mut meta = metadata.unwrap_or_else(|| {
            MetadataRecord::link(scope, local_id, item.remote_id.clone(), item.version)
        });
        meta.local_id = local_id;
        meta.remote_id = item.remote_id.clone();
        meta.version = item.version;
        meta.local_state = SyncState::Unchanged;
        meta.remote_state = SyncState::Unchanged;
        meta.extra.content_hash = Some(mapper.content_hash(item));
        meta.extra.remote_id = Some(item.remote_id.to_string());
        meta.extra.title = mapper.title_of(item);
        meta.extra.is_private = item.appointment().map_or(false, |a| a.is_private);
        self.store.upsert(&meta).await?;
        Ok(())
    }

    /// Soft-delete an aggregate's records and its linkage row.
    async fn retire_aggregate(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        meta: &MetadataRecord,
    ) -> Result<()> {
        let scope = session.scope(kind);
        if let Some(mut old) = load_aggregate(self.store, kind, meta.local_id).await? {
            supersede_single_instance(&mut old);
            save_aggregate(self.store, &mut old).await?;
        }
        self.store.soft_delete(&scope, meta.local_id).await?;
        Ok(())
    }

    async fn export_pass(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        report: &mut SyncReport,
    ) -> Result<()> {
        let scope = session.scope(kind);
        let linked: HashSet<i64> = self
            .store
            .linked_local_ids(&scope)
            .await?
            .into_iter()
            .map(|id| id.0)
            .collect();
        let folder = self.remote.default_folder(kind).await?;
        let candidates = self.store.query(kind.schema_name(), &Filter::All).await?;

        for record in candidates {
            let Some(id) = record.id else { continue };
            if linked.contains(&id.0) {
                continue;
            }
            match self.export_item(session, kind, &folder, id).await {
                Ok(outcome) => tally(report, outcome),
                Err(err) if err.is_recoverable_per_item() => {
                    warn!(kind = %kind, local_id = id.0, error = %err, "export skipped");
                    report.record_error(kind, &err);
                }
                Err(err) => return Err(err),
            }
        }

        if session.settings.propagate_deletes {
            self.propagate_deletes(session, kind, report).await?;
        }
        Ok(())
    }

    async fn export_item(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        folder: &FolderId,
        id: LocalId,
    ) -> Result<Outcome> {
        let Some(mut local) = load_aggregate(self.store, kind, id).await? else {
            return Ok(Outcome::Noop);
        };
        if local.header.record.is_deleted() {
            return Ok(Outcome::Skipped(Skip::LocallyDeleted));
        }

        let mut out = RemoteItem::blank(kind);
        let mapper = mapper_for(kind);
        mapper.push(&mut local, &mut out);

        if let Some(skip) = organizer_guard(session, &out) {
            return Ok(Outcome::Skipped(skip));
        }
        let identity = lock_identity(None, Some(id.0));
        if !self
            .store
            .try_lock(&identity, kind.lock_domain(), &session.session_id)
            .await?
        {
            return Ok(Outcome::Skipped(Skip::Locked));
        }
        if let Some(skip) =
            duplicate_guard(self.remote, folder, &out, session.settings.page_size).await?
        {
            return Ok(Outcome::Skipped(skip));
        }

        let remote_id = self
            .remote
            .create(folder, &out, session.settings.suppresses_notifications(kind))
            .await?;
        save_aggregate(self.store, &mut local).await?;

        out.remote_id = remote_id.clone();
        out.version = match self.remote.bind(&remote_id).await {
            Ok(created) => created.version,
            Err(err) if err.is_recoverable_per_item() => Utc::now(),
            Err(err) => return Err(err.into()),
        };
        let scope = session.scope(kind);
        self.link(&scope, id, None, &out, kind).await?;
        Ok(Outcome::Exported)
    }

    async fn propagate_deletes(
        &self,
        session: &SyncSession,
        kind: SyncKind,
        report: &mut SyncReport,
    ) -> Result<()> {
        let scope = session.scope(kind);
        let suppress = session.settings.suppresses_notifications(kind);

        for meta in self.store.list_for_scope(&scope).await? {
            let Some(header) = self.store.fetch(kind.schema_name(), meta.local_id).await? else {
                continue;
            };
            if !header.is_deleted() {
                continue;
            }
            if !self
                .store
                .try_lock(&meta.remote_id.id, kind.lock_domain(), &session.session_id)
                .await?
            {
                report.skipped += 1;
                continue;
            }
            match self.remote.delete(&meta.remote_id, suppress).await {
                Ok(()) | Err(RemoteError::NotFound(_)) => {}
                Err(err) => {
                    let err = EngineError::from(err);
                    if err.is_recoverable_per_item() {
                        warn!(kind = %kind, error = %err, "delete propagation skipped");
                        report.record_error(kind, &err);
                        continue;
                    }
                    return Err(err);
                }
            }
            self.store.soft_delete(&scope, meta.local_id).await?;
            report.deleted += 1;
        }
        Ok(())
    }
}

fn tally(report: &mut SyncReport, outcome: Outcome) {
    match outcome {
        Outcome::Imported => report.imported += 1,
        Outcome::Exported => report.exported += 1,
        Outcome::UpdatedLocal => report.updated_local += 1,
        Outcome::UpdatedRemote => report.updated_remote += 1,
        Outcome::Deleted => report.deleted += 1,
        Outcome::Skipped(reason) => {
            debug!(%reason, "candidate skipped");
            report.skipped += 1;
        }
        Outcome::Noop => report.skipped += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use grpsync_core::{
        Freq, LocalRecord, RecurrenceRule, RemoteStoreId, SessionSettings, UserId, EMAIL_SLOTS,
    };
    use grpsync_remote::MemoryRemoteStore;
    use grpsync_store::{LocalStore, LockStore, MemoryStore, MetadataStore};

    fn session() -> SyncSession {
        let settings = SessionSettings {
            sync_window_start: "2024-01-01T00:00:00Z".parse().unwrap(),
            sync_window_period: Duration::days(5),
            page_size: 2,
            ..Default::default()
        };
        SyncSession::new(settings, UserId(1), RemoteStoreId::new("box-a"))
    }

    fn remote_contact(first: &str, email: &str) -> RemoteItem {
        let mut item = RemoteItem::blank(SyncKind::Contact);
        item.version = Utc::now();
        if let Some(c) = item.contact_mut() {
            c.first_name = first.into();
            c.last_name = "Lovelace".into();
            c.emails.insert(EMAIL_SLOTS[0], email.into());
        }
        item
    }

    fn local_contact(first: &str) -> LocalRecord {
        let mut record = LocalRecord::new("crm.contact");
        record.set("first_name", first);
        record.set("last_name", "Lovelace");
        record.set("updated_at", Utc::now());
        record
    }

    #[tokio::test]
    async fn test_import_creates_linked_aggregate() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();
        let id = remote.add_item(&folder, remote_contact("Ada", "ada@x.io"));

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();

        assert!(report.success);
        assert_eq!(report.imported, 1);
        let locals = store.query("crm.contact", &Filter::All).await.unwrap();
        assert_eq!(locals.len(), 1);
        assert_eq!(locals[0].text("first_name"), Some("Ada"));

        let emails = store.query("crm.contact.email", &Filter::All).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].text("email"), Some("ada@x.io"));

        let scope = session.scope(SyncKind::Contact);
        let meta = store.find_by_remote(&scope, &id).await.unwrap().unwrap();
        assert_eq!(Some(meta.local_id), locals[0].id);
        assert!(meta.extra.content_hash.is_some());
        assert_eq!(meta.extra.title.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_repeated_pass_changes_nothing() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();
        remote.add_item(&folder, remote_contact("Ada", "ada@x.io"));

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        let second = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();

        assert!(second.success);
        assert_eq!(second.imported, 0);
        assert_eq!(second.exported, 0);
        assert_eq!(second.updated_local, 0);
        assert_eq!(second.updated_remote, 0);
        assert_eq!(store.query("crm.contact", &Filter::All).await.unwrap().len(), 1);
        assert_eq!(remote.item_count(), 1);
    }

    #[tokio::test]
    async fn test_export_creates_and_links() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let id = store.insert(local_contact("Grace")).await.unwrap();

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();

        assert_eq!(report.exported, 1);
        assert_eq!(remote.item_count(), 1);

        let scope = session.scope(SyncKind::Contact);
        let meta = store.find_by_local(&scope, id).await.unwrap().unwrap();
        let created = remote.get(&meta.remote_id).unwrap();
        assert_eq!(created.local_link.as_deref(), Some(id.to_string().as_str()));

        // Notifications are suppressed for contacts by default.
        assert!(remote.mutation_log()[0].suppressed_notifications);

        let second = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(second.exported, 0);
        assert_eq!(remote.item_count(), 1);
    }

    #[tokio::test]
    async fn test_export_suppresses_duplicates() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();

        let mut twin = RemoteItem::blank(SyncKind::Contact);
        if let Some(c) = twin.contact_mut() {
            c.first_name = "Grace".into();
            c.last_name = "Lovelace".into();
        }
        remote.add_item(&folder, twin);
        store.insert(local_contact("Grace")).await.unwrap();

        let mut session = session();
        session.settings.import_enabled = false;
        let driver = SyncDriver::new(&store, &remote);
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();

        assert_eq!(report.exported, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(remote.item_count(), 1);
        assert!(remote.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn test_locked_item_skipped_until_released() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();
        let id = remote.add_item(&folder, remote_contact("Ada", "ada@x.io"));

        store
            .try_lock(&id.id, SyncKind::Contact.lock_domain(), "session-other")
            .await
            .unwrap();

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 1);
        assert!(store.query("crm.contact", &Filter::All).await.unwrap().is_empty());

        store.release_session("session-other").await.unwrap();
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(report.imported, 1);
    }

    #[tokio::test]
    async fn test_transport_failures_suspend_session() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        remote.set_offline(true);

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        for _ in 0..crate::session::MAX_CONSECUTIVE_FAILURES {
            let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
            assert!(!report.success);
        }
        assert!(session.is_suspended());
        assert!(matches!(
            driver.run_pass(&mut session, SyncKind::Contact).await,
            Err(EngineError::SessionSuspended { .. })
        ));

        // A successful pass clears the suspension on a fresh session.
        remote.set_offline(false);
        session.clear_failures();
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn test_single_item_becomes_series_exactly_once() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Appointment).await.unwrap();

        let mut single = RemoteItem::blank(SyncKind::Appointment);
        single.version = Utc::now();
        if let Some(a) = single.appointment_mut() {
            a.subject = "Planning".into();
            a.start = Some("2024-01-02T10:00:00Z".parse().unwrap());
            a.end = Some("2024-01-02T11:00:00Z".parse().unwrap());
        }
        let base_id = remote.add_item(&folder, single);

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        let first = driver.run_pass(&mut session, SyncKind::Appointment).await.unwrap();
        assert_eq!(first.imported, 1);
        let old_local = store.query("crm.appointment", &Filter::All).await.unwrap()[0]
            .id
            .unwrap();

        // The item becomes a repeating series.
        let mut master = remote.get(&base_id).unwrap();
        if let Some(a) = master.appointment_mut() {
            a.is_master = true;
            a.recurrence = Some(RecurrenceRule::new(Freq::Daily, 1));
        }
        remote.update(&master, true).await.unwrap();

        let second = driver.run_pass(&mut session, SyncKind::Appointment).await.unwrap();
        // Window [2024-01-01, 2024-01-06), series starts 2024-01-02.
        assert_eq!(second.imported, 4);

        let live = store.query("crm.appointment", &Filter::All).await.unwrap();
        assert_eq!(live.len(), 4);
        let old = store.fetch("crm.appointment", old_local).await.unwrap().unwrap();
        assert!(old.is_deleted());

        let scope = session.scope(SyncKind::Appointment);
        let base_meta = store.find_by_remote(&scope, &base_id).await.unwrap().unwrap();
        assert!(base_meta.deleted);

        // A third pass neither duplicates instances nor retires again.
        let third = driver.run_pass(&mut session, SyncKind::Appointment).await.unwrap();
        assert_eq!(third.imported, 0);
        assert_eq!(
            store.query("crm.appointment", &Filter::All).await.unwrap().len(),
            4
        );
    }

    #[tokio::test]
    async fn test_remote_removal_tombstones_local() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();
        let id = remote.add_item(&folder, remote_contact("Ada", "ada@x.io"));

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        remote.remove(&id);

        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.query("crm.contact", &Filter::All).await.unwrap().is_empty());
        let scope = session.scope(SyncKind::Contact);
        let meta = store.find_by_remote(&scope, &id).await.unwrap().unwrap();
        assert!(meta.deleted);

        // The retired row stays retired on later passes.
        let third = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(third.deleted, 0);
    }

    #[tokio::test]
    async fn test_import_adopts_unsynced_twin() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();
        let id = remote.add_item(&folder, remote_contact("Ada", "ada@x.io"));
        let twin = store.insert(local_contact("Ada")).await.unwrap();

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();

        // The incoming item links the existing record; nothing is duplicated
        // locally and nothing is pushed back out.
        assert_eq!(report.imported, 1);
        assert_eq!(report.exported, 0);
        assert_eq!(store.query("crm.contact", &Filter::All).await.unwrap().len(), 1);
        assert_eq!(remote.item_count(), 1);

        let scope = session.scope(SyncKind::Contact);
        let meta = store.find_by_remote(&scope, &id).await.unwrap().unwrap();
        assert_eq!(meta.local_id, twin);
    }

    #[tokio::test]
    async fn test_import_skips_locally_deleted_aggregate() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Contact).await.unwrap();
        let id = remote.add_item(&folder, remote_contact("Ada", "ada@x.io"));

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        let local_id = store.query("crm.contact", &Filter::All).await.unwrap()[0]
            .id
            .unwrap();
        store.delete("crm.contact", local_id).await.unwrap();

        let mut edited = remote.get(&id).unwrap();
        if let Some(c) = edited.contact_mut() {
            c.first_name = "Augusta".into();
        }
        remote.update(&edited, true).await.unwrap();

        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(report.updated_local, 0);
        assert!(report.skipped >= 1);
        let gone = store.fetch("crm.contact", local_id).await.unwrap().unwrap();
        assert!(gone.is_deleted());
        assert_eq!(gone.text("first_name"), Some("Ada"));
    }

    #[tokio::test]
    async fn test_import_skips_foreign_organizer() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let folder = remote.default_folder(SyncKind::Appointment).await.unwrap();

        let mut appt = RemoteItem::blank(SyncKind::Appointment);
        appt.version = Utc::now();
        if let Some(a) = appt.appointment_mut() {
            a.subject = "Board meeting".into();
            a.organizer = Some("other@corp".into());
        }
        remote.add_item(&folder, appt);

        let mut session = session();
        session.cache.mark_active_sync_account("other@corp");
        let driver = SyncDriver::new(&store, &remote);
        let report = driver.run_pass(&mut session, SyncKind::Appointment).await.unwrap();

        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 1);
        assert!(store
            .query("crm.appointment", &Filter::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_propagate_deletes_honors_setting() {
        let store = MemoryStore::new();
        let remote = MemoryRemoteStore::with_default_folders();
        let id = store.insert(local_contact("Grace")).await.unwrap();

        let mut session = session();
        let driver = SyncDriver::new(&store, &remote);
        driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(remote.item_count(), 1);

        store.delete("crm.contact", id).await.unwrap();

        // Off by default: the local delete is a no-op remotely.
        driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(remote.item_count(), 1);

        session.settings.propagate_deletes = true;
        let report = driver.run_pass(&mut session, SyncKind::Contact).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(remote.item_count(), 0);
    }
}
