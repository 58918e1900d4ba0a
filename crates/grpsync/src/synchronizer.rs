//! The Synchronizer: unified API for grpsync.
//!
//! The Synchronizer brings together the local store, the remote boundary,
//! and a session into a cohesive interface for running sync passes.

use tracing::info;

use grpsync_core::{LocalId, RemoteStoreId, SessionSettings, SyncKind, UserId};
use grpsync_engine::{actualize, LocalChange, SyncDriver, SyncReport, SyncSession, SyncStore};
use grpsync_remote::RemoteStore;

use crate::error::Result;

/// The main Synchronizer struct.
///
/// Owns one store, one remote boundary, and one session, and provides:
/// - Per-kind sync passes
/// - A combined pass over every kind
/// - Lock cleanup after each pass
pub struct Synchronizer<S, R> {
    store: S,
    remote: R,
    session: SyncSession,
}

impl<S: SyncStore, R: RemoteStore> Synchronizer<S, R> {
    /// Create a synchronizer for one (user, remote store) pairing.
    pub fn new(
        store: S,
        remote: R,
        settings: SessionSettings,
        owner: UserId,
        remote_store_id: RemoteStoreId,
    ) -> Self {
        Self {
            store,
            remote,
            session: SyncSession::new(settings, owner, remote_store_id),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the remote reference.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Get the session state.
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Mutable session access, for seeding caches before the first pass.
    pub fn session_mut(&mut self) -> &mut SyncSession {
        &mut self.session
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one pass for a kind, then release every lock the session holds.
    ///
    /// A report with `success == false` means a transport failure ended the
    /// pass early; the watermark was not committed and the next pass
    /// re-enumerates the same changes.
    pub async fn sync(&mut self, kind: SyncKind) -> Result<SyncReport> {
        let driver = SyncDriver::new(&self.store, &self.remote);
        let outcome = driver.run_pass(&mut self.session, kind).await;

        // Locks are session-scoped; a finished or failed pass holds none.
        let released = self
            .store
            .release_session(&self.session.session_id)
            .await;

        let report = outcome?;
        released?;
        info!(
            kind = %kind,
            imported = report.imported,
            exported = report.exported,
            updated_local = report.updated_local,
            updated_remote = report.updated_remote,
            deleted = report.deleted,
            skipped = report.skipped,
            success = report.success,
            "sync pass finished"
        );
        Ok(report)
    }

    /// Sync calendar appointments.
    pub async fn sync_appointments(&mut self) -> Result<SyncReport> {
        self.sync(SyncKind::Appointment).await
    }

    /// Sync contacts.
    pub async fn sync_contacts(&mut self) -> Result<SyncReport> {
        self.sync(SyncKind::Contact).await
    }

    /// Sync mail messages.
    pub async fn sync_messages(&mut self) -> Result<SyncReport> {
        self.sync(SyncKind::Message).await
    }

    /// Feed one local change event observed outside a pass into the linkage
    /// rows, so the next pass still finds correct linkage.
    pub async fn record_local_change(
        &self,
        schema: &str,
        local_id: LocalId,
        change: LocalChange,
    ) -> Result<bool> {
        Ok(actualize(
            &self.store,
            self.session.owner,
            &self.session.remote_store_id,
            schema,
            local_id,
            change,
        )
        .await?)
    }

    /// Run one pass per kind and fold the reports together.
    pub async fn sync_all(&mut self) -> Result<SyncReport> {
        let mut merged = SyncReport {
            success: true,
            ..SyncReport::default()
        };
        for kind in SyncKind::ALL {
            merged.merge(self.sync(kind).await?);
        }
        Ok(merged)
    }
}
