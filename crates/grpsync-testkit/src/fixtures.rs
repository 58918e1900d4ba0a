//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a seeded store pair with a
//! fixed sync window, plus builders for both sides' records.

use chrono::{DateTime, Duration, Utc};

use grpsync::Synchronizer;
use grpsync_core::{
    Freq, LocalRecord, RecurrenceRule, RemoteItem, RemoteStoreId, SessionSettings, SyncKind,
    UserId, EMAIL_SLOTS, PHONE_SLOTS,
};
use grpsync_engine::SyncSession;
use grpsync_remote::MemoryRemoteStore;
use grpsync_store::MemoryStore;

/// Start of the fixture sync window. Every builder dates its records
/// relative to this so windowed assertions stay deterministic.
pub fn window_start() -> DateTime<Utc> {
    "2024-01-01T00:00:00Z".parse().expect("valid literal")
}

/// A test fixture with an in-memory store pair and fixed settings.
pub struct SyncFixture {
    pub store: MemoryStore,
    pub remote: MemoryRemoteStore,
    pub settings: SessionSettings,
    pub owner: UserId,
    pub remote_store_id: RemoteStoreId,
}

impl SyncFixture {
    /// A fixture with default folders, a 30-day window, and one owner.
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            remote: MemoryRemoteStore::with_default_folders(),
            settings: SessionSettings {
                sync_window_start: window_start(),
                sync_window_period: Duration::days(30),
                ..Default::default()
            },
            owner: UserId(1),
            remote_store_id: RemoteStoreId::new("fixture-box"),
        }
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// A fresh session over this fixture's settings and identity.
    pub fn session(&self) -> SyncSession {
        SyncSession::new(
            self.settings.clone(),
            self.owner,
            self.remote_store_id.clone(),
        )
    }

    /// Consume the fixture into a ready-to-run synchronizer.
    pub fn into_synchronizer(self) -> Synchronizer<MemoryStore, MemoryRemoteStore> {
        Synchronizer::new(
            self.store,
            self.remote,
            self.settings,
            self.owner,
            self.remote_store_id,
        )
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A remote contact with one email filled in.
pub fn remote_contact(first: &str, last: &str) -> RemoteItem {
    let mut item = RemoteItem::blank(SyncKind::Contact);
    item.version = Utc::now();
    if let Some(c) = item.contact_mut() {
        c.first_name = first.into();
        c.last_name = last.into();
        c.emails.insert(EMAIL_SLOTS[0], format!("{first}@example.com"));
        c.phones.insert(PHONE_SLOTS[0], "+1 555 0100".into());
    }
    item
}

/// A remote single-instance appointment starting inside the fixture window.
pub fn remote_appointment(subject: &str, start: DateTime<Utc>, minutes: i64) -> RemoteItem {
    let mut item = RemoteItem::blank(SyncKind::Appointment);
    item.version = Utc::now();
    if let Some(a) = item.appointment_mut() {
        a.subject = subject.into();
        a.start = Some(start);
        a.end = Some(start + Duration::minutes(minutes));
    }
    item
}

/// A remote series master.
pub fn recurring_master(
    subject: &str,
    start: DateTime<Utc>,
    freq: Freq,
    interval: u32,
) -> RemoteItem {
    let mut item = remote_appointment(subject, start, 30);
    if let Some(a) = item.appointment_mut() {
        a.is_master = true;
        a.recurrence = Some(RecurrenceRule::new(freq, interval));
    }
    item
}

/// A remote mail message sent at the fixture window start.
pub fn remote_message(subject: &str, sender: &str) -> RemoteItem {
    let mut item = RemoteItem::blank(SyncKind::Message);
    item.version = Utc::now();
    if let Some(m) = item.message_mut() {
        m.subject = subject.into();
        m.from = Some(sender.into());
        m.sent_at = Some(window_start());
    }
    item
}

/// An unsaved local contact header record.
pub fn local_contact(first: &str, last: &str) -> LocalRecord {
    let mut record = LocalRecord::new(SyncKind::Contact.schema_name());
    record.set("first_name", first);
    record.set("last_name", last);
    record.set("updated_at", Utc::now());
    record
}

/// An unsaved local appointment header record.
pub fn local_appointment(title: &str, start: DateTime<Utc>, minutes: i64) -> LocalRecord {
    let mut record = LocalRecord::new(SyncKind::Appointment.schema_name());
    record.set("title", title);
    record.set("start_at", start);
    record.set("end_at", start + Duration::minutes(minutes));
    record.set("updated_at", Utc::now());
    record
}

/// An unsaved local message header record.
pub fn local_message(subject: &str) -> LocalRecord {
    let mut record = LocalRecord::new(SyncKind::Message.schema_name());
    record.set("subject", subject);
    record.set("updated_at", Utc::now());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpsync_core::Filter;
    use grpsync_remote::RemoteStore;
    use grpsync_store::LocalStore;

    #[test]
    fn test_fixture_sessions_share_identity() {
        let fixture = SyncFixture::new();
        let a = fixture.session();
        let b = fixture.session();
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.scope(SyncKind::Contact), b.scope(SyncKind::Contact));
    }

    #[tokio::test]
    async fn test_fixture_runs_end_to_end() {
        let fixture = SyncFixture::new();
        let folder = fixture
            .remote
            .default_folder(SyncKind::Contact)
            .await
            .unwrap();
        fixture.remote.add_item(&folder, remote_contact("Ada", "Lovelace"));
        fixture.store.insert(local_contact("Alan", "Turing")).await.unwrap();

        let mut sync = fixture.into_synchronizer();
        let report = sync.sync_contacts().await.unwrap();
        assert!(report.success);
        assert_eq!(report.imported, 1);
        assert_eq!(report.exported, 1);

        let locals = sync.store().query("crm.contact", &Filter::All).await.unwrap();
        assert_eq!(locals.len(), 2);
    }

    #[test]
    fn test_recurring_master_is_master() {
        let master = recurring_master("Standup", window_start(), Freq::Daily, 1);
        assert!(master.is_recurring_master());
        let single = remote_appointment("Lunch", window_start(), 60);
        assert!(!single.is_recurring_master());
    }
}
