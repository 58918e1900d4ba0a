//! Result of a sync pass.

use grpsync_core::SyncKind;

/// Counters for one synchronization pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Aggregates created locally from remote items.
    pub imported: usize,
    /// Aggregates created remotely from local records.
    pub exported: usize,
    /// Local-side updates applied.
    pub updated_local: usize,
    /// Remote-side updates applied.
    pub updated_remote: usize,
    /// Deletes applied, either side.
    pub deleted: usize,
    /// Candidates that resolved to no action (locks, hash matches, guards).
    pub skipped: usize,
    /// Per-item failures that were isolated and logged.
    pub errors: Vec<String>,
    /// Whether the pass ran to completion and committed its watermark.
    pub success: bool,
}

impl SyncReport {
    pub fn record_error(&mut self, kind: SyncKind, err: impl std::fmt::Display) {
        self.errors.push(format!("{kind}: {err}"));
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.imported += other.imported;
        self.exported += other.exported;
        self.updated_local += other.updated_local;
        self.updated_remote += other.updated_remote;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
        self.success = self.success && other.success;
    }
}
