//! Strong type definitions for grpsync.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Identity of a record in the local relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub i64);

impl LocalId {
    /// Sentinel for records that have not been persisted yet.
    pub const UNSAVED: Self = Self(0);

    pub fn is_saved(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the user owning a sync session and its metadata rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a remote store (one mailbox/account on the groupware side).
///
/// The same local record may be linked to several remote stores; metadata
/// uniqueness is always scoped by this id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteStoreId(pub String);

impl RemoteStoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteStoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a folder on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FolderId(pub String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite identity of an item on the remote side.
///
/// For single items this is the bare store id. For one occurrence of a
/// repeating series it is the series id plus the occurrence date, so two
/// occurrences of the same master never collide in metadata.
///
/// Canonical string form: `"<id>"` or `"<id>@<yyyy-mm-dd>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteId {
    /// The base item identity assigned by the remote store.
    pub id: String,
    /// Occurrence date for one instance of a repeating series.
    pub instance_date: Option<NaiveDate>,
}

impl RemoteId {
    /// A plain, non-recurring remote identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance_date: None,
        }
    }

    /// Identity of one occurrence of a repeating series.
    pub fn instance(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            instance_date: Some(date),
        }
    }

    /// Whether this identity names a series occurrence.
    pub fn is_instance(&self) -> bool {
        self.instance_date.is_some()
    }

    /// Whether the base identity is non-empty.
    ///
    /// Items without a stable external identity cannot be linked and must be
    /// skipped by the validators.
    pub fn is_stable(&self) -> bool {
        !self.id.is_empty()
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance_date {
            Some(date) => write!(f, "{}@{}", self.id, date),
            None => write!(f, "{}", self.id),
        }
    }
}

impl FromStr for RemoteId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CoreError::InvalidRemoteId(s.into()));
        }
        match s.rsplit_once('@') {
            Some((id, date)) if !id.is_empty() => {
                let date = date
                    .parse::<NaiveDate>()
                    .map_err(|_| CoreError::InvalidRemoteId(s.into()))?;
                Ok(Self::instance(id, date))
            }
            _ => Ok(Self::new(s)),
        }
    }
}

/// The kinds of entities this engine synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncKind {
    Appointment,
    Contact,
    Message,
}

impl SyncKind {
    /// Schema name used in metadata rows and local-store queries.
    pub fn schema_name(&self) -> &'static str {
        match self {
            SyncKind::Appointment => "crm.appointment",
            SyncKind::Contact => "crm.contact",
            SyncKind::Message => "crm.message",
        }
    }

    /// Lock-domain name for cross-session mutual exclusion.
    ///
    /// Distinct domains never contend with each other.
    pub fn lock_domain(&self) -> &'static str {
        match self {
            SyncKind::Appointment => "calendar-sync",
            SyncKind::Contact => "contact-sync",
            SyncKind::Message => "mail-sync",
        }
    }

    pub const ALL: [SyncKind; 3] = [SyncKind::Appointment, SyncKind::Contact, SyncKind::Message];
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

/// What is already true about one side of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    New,
    Modified,
    Deleted,
    #[default]
    Unchanged,
}

/// The write that has been decided for an item.
///
/// State reflects what is already true; Action decides the downstream write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncAction {
    Create,
    Update,
    Delete,
    #[default]
    None,
    /// One occurrence of a repeating series, keyed by instance date.
    Repeat,
    /// Supersede a prior single-instance representation with a series master.
    CreateRecurringMaster,
}

impl SyncAction {
    /// Whether this action results in a write on the receiving side.
    pub fn is_write(&self) -> bool {
        !matches!(self, SyncAction::None)
    }
}

/// A fixed, keyed field position in the remote model.
///
/// Remote APIs expose bounded sets of these (email-1/2/3, home/business
/// address, required/optional attendees) where the local store keeps an
/// unbounded child table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey(pub &'static str);

impl SlotKey {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
