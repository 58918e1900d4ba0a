//! Per-session state: the settings snapshot, scope, caches, and transient
//! error tracking.
//!
//! One session runs single-threaded per (user, mailbox). Lookup caches are
//! an explicit struct built lazily and passed by reference, never hidden
//! instance state on the synchronizer objects.

use std::collections::{HashMap, HashSet};

use chrono::{FixedOffset, Offset, Utc};

use grpsync_core::{RemoteStoreId, SessionSettings, SyncKind, UserId};
use grpsync_store::SyncScope;

/// Remote failures tolerated before the session suspends itself.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Session-scoped lookup caches.
///
/// Built lazily: entries are inserted the first time the surrounding code
/// resolves a name, and reused for the rest of the session.
#[derive(Debug, Default)]
pub struct SessionCache {
    role_ids: HashMap<String, i64>,
    account_names: HashMap<UserId, String>,
    /// Accounts that run a sync session of their own. Used by the organizer
    /// permission guard.
    active_sync_accounts: HashSet<String>,
}

impl SessionCache {
    pub fn role_id(&mut self, name: &str, load: impl FnOnce() -> i64) -> i64 {
        *self.role_ids.entry(name.to_owned()).or_insert_with(load)
    }

    pub fn account_name(&mut self, user: UserId, load: impl FnOnce() -> String) -> &str {
        self.account_names.entry(user).or_insert_with(load)
    }

    pub fn cached_account_name(&self, user: UserId) -> Option<&str> {
        self.account_names.get(&user).map(String::as_str)
    }

    pub fn mark_active_sync_account(&mut self, account: impl Into<String>) {
        self.active_sync_accounts.insert(account.into());
    }

    pub fn has_active_sync(&self, account: &str) -> bool {
        self.active_sync_accounts.contains(account)
    }
}

/// One synchronization session for a (user, mailbox) pair.
pub struct SyncSession {
    /// Immutable settings snapshot, resolved once at session start.
    pub settings: SessionSettings,
    pub owner: UserId,
    pub remote_store_id: RemoteStoreId,
    /// Lock-owner token; every lock this session takes carries it.
    pub session_id: String,
    /// Time zone remote versions are converted from; comparisons happen in
    /// UTC, display-bound fields keep this offset.
    pub time_zone: FixedOffset,
    pub cache: SessionCache,
    consecutive_failures: u32,
}

impl SyncSession {
    pub fn new(settings: SessionSettings, owner: UserId, remote_store_id: RemoteStoreId) -> Self {
        let session_id = format!("session-{}-{}", owner.0, remote_store_id.as_str());
        Self {
            settings,
            owner,
            remote_store_id,
            session_id,
            time_zone: Utc.fix(),
            cache: SessionCache::default(),
            consecutive_failures: 0,
        }
    }

    pub fn with_time_zone(mut self, tz: FixedOffset) -> Self {
        self.time_zone = tz;
        self
    }

    /// Metadata/watermark scope for a kind.
    pub fn scope(&self, kind: SyncKind) -> SyncScope {
        SyncScope::new(
            self.owner,
            self.remote_store_id.clone(),
            kind.schema_name(),
        )
    }

    /// Account name of this session's owner, if already resolved.
    pub fn own_account(&self) -> Option<&str> {
        self.cache.cached_account_name(self.owner)
    }

    /// Record a session-tier remote failure.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Clear transient error state after a successful commit.
    pub fn clear_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether repeated failures have suspended this session.
    pub fn is_suspended(&self) -> bool {
        self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES
    }
}
