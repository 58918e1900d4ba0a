//! Immutable per-session configuration snapshot.
//!
//! Settings are resolved once at session start and threaded through the
//! engine by value; no component queries feature flags ad hoc.

use chrono::{DateTime, Duration, Utc};

use crate::types::{FolderId, SyncKind};

/// Which kinds are exported to the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportScope {
    pub appointments: bool,
    pub contacts: bool,
    pub messages: bool,
}

impl ExportScope {
    pub const ALL: Self = Self {
        appointments: true,
        contacts: true,
        messages: true,
    };

    pub const NONE: Self = Self {
        appointments: false,
        contacts: false,
        messages: false,
    };

    pub fn contains(&self, kind: SyncKind) -> bool {
        match kind {
            SyncKind::Appointment => self.appointments,
            SyncKind::Contact => self.contacts,
            SyncKind::Message => self.messages,
        }
    }
}

/// Immutable settings snapshot for one sync session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Import remote changes into the local store.
    pub import_enabled: bool,
    /// Scan every discoverable folder instead of `selected_folder_ids`.
    pub import_all_folders: bool,
    /// Export unlinked local aggregates to the remote side.
    pub export_enabled: bool,
    pub export_scope: ExportScope,
    /// Start of the occurrence/enumeration window.
    pub sync_window_start: DateTime<Utc>,
    /// Length of the window; the window is `[start, start + period)`.
    pub sync_window_period: Duration,
    /// Folders in scope when `import_all_folders` is off.
    pub selected_folder_ids: Vec<FolderId>,
    /// Propagate local deletes to the remote side. Off by default: an
    /// ignored delete action is a no-op, not an error.
    pub propagate_deletes: bool,
    /// Suppress remote-side notifications on create/update/delete, per kind.
    pub suppress_notifications: ExportScope,
    /// Enable content-hash conflict suppression, per kind. An optimization
    /// over last-writer-wins, not a correctness mechanism.
    pub hash_suppression: ExportScope,
    /// Remote page size for enumeration.
    pub page_size: usize,
}

impl SessionSettings {
    /// Exclusive end of the sync window.
    pub fn window_end(&self) -> DateTime<Utc> {
        self.sync_window_start + self.sync_window_period
    }

    pub fn exports(&self, kind: SyncKind) -> bool {
        self.export_enabled && self.export_scope.contains(kind)
    }

    pub fn suppresses_notifications(&self, kind: SyncKind) -> bool {
        self.suppress_notifications.contains(kind)
    }

    pub fn hash_suppression_enabled(&self, kind: SyncKind) -> bool {
        self.hash_suppression.contains(kind)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            import_enabled: true,
            import_all_folders: true,
            export_enabled: true,
            export_scope: ExportScope::ALL,
            sync_window_start: Utc::now() - Duration::days(30),
            sync_window_period: Duration::days(90),
            selected_folder_ids: Vec::new(),
            propagate_deletes: false,
            suppress_notifications: ExportScope::ALL,
            // Hash suppression ships enabled for appointments only; other
            // kinds fall straight through to last-writer-wins.
            hash_suppression: ExportScope {
                appointments: true,
                contacts: false,
                messages: false,
            },
            page_size: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        let settings = SessionSettings {
            sync_window_start: "2024-01-01T00:00:00Z".parse().unwrap(),
            sync_window_period: Duration::days(10),
            ..Default::default()
        };
        assert_eq!(
            settings.window_end(),
            "2024-01-11T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_export_requires_both_flags() {
        let mut settings = SessionSettings {
            export_enabled: false,
            ..Default::default()
        };
        assert!(!settings.exports(SyncKind::Contact));

        settings.export_enabled = true;
        settings.export_scope = ExportScope {
            contacts: false,
            ..ExportScope::ALL
        };
        assert!(!settings.exports(SyncKind::Contact));
        assert!(settings.exports(SyncKind::Appointment));
    }
}
