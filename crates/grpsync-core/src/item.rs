//! Sync entities, aggregates, and remote items.
//!
//! A [`SyncEntity`] wraps one local record with its observed state and the
//! decided action. A [`LocalItem`] is the aggregate: one header entity plus
//! child collections, synchronized as a single unit. A [`RemoteItem`] is the
//! remote-side counterpart with a typed per-kind payload, a tagged union
//! instead of a class hierarchy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::payload::ExtensionPayload;
use crate::types::{RemoteId, SlotKey, SyncAction, SyncKind, SyncState};
use crate::value::{LocalRecord, Value};

// Slot keys exposed by the remote model, per kind.
pub const EMAIL_SLOTS: [SlotKey; 3] = [SlotKey("email-1"), SlotKey("email-2"), SlotKey("email-3")];
pub const PHONE_SLOTS: [SlotKey; 3] = [
    SlotKey("phone-business"),
    SlotKey("phone-home"),
    SlotKey("phone-mobile"),
];
pub const ADDRESS_SLOTS: [SlotKey; 2] = [SlotKey("address-business"), SlotKey("address-home")];
pub const ATTENDEE_SLOTS: [SlotKey; 2] = [
    SlotKey("attendee-required"),
    SlotKey("attendee-optional"),
];

/// A bounded slot map: slot key to non-empty value.
pub type SlotMap = BTreeMap<SlotKey, String>;

/// One local record wrapped with change-tracking state.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEntity {
    pub record: LocalRecord,
    pub state: SyncState,
    pub action: SyncAction,
    /// Per-record extension payload (hash, slot marker, denormalized fields).
    pub payload: ExtensionPayload,
}

impl SyncEntity {
    pub fn new(record: LocalRecord) -> Self {
        Self {
            record,
            state: SyncState::Unchanged,
            action: SyncAction::None,
            payload: ExtensionPayload::new(),
        }
    }

    pub fn with_state(record: LocalRecord, state: SyncState) -> Self {
        Self {
            state,
            ..Self::new(record)
        }
    }

    /// Slot marker carried in the extension payload, if any.
    pub fn slot(&self) -> Option<&str> {
        self.payload.slot.as_deref()
    }
}

/// A named bundle of related local records synchronized as one unit.
///
/// Invariant: exactly one aggregate exists per remote identity per pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalItem {
    /// Aggregate name (usually the kind's schema name).
    pub name: String,
    pub header: SyncEntity,
    /// Child collections keyed by child schema name.
    children: BTreeMap<String, Vec<SyncEntity>>,
}

impl LocalItem {
    pub fn new(name: impl Into<String>, header: SyncEntity) -> Self {
        Self {
            name: name.into(),
            header,
            children: BTreeMap::new(),
        }
    }

    pub fn children(&self, schema: &str) -> &[SyncEntity] {
        self.children.get(schema).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children_mut(&mut self, schema: &str) -> &mut Vec<SyncEntity> {
        self.children.entry(schema.into()).or_default()
    }

    pub fn child_schemas(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// All entities of the aggregate, header first.
    pub fn entities(&self) -> impl Iterator<Item = &SyncEntity> {
        std::iter::once(&self.header).chain(self.children.values().flatten())
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut SyncEntity> {
        std::iter::once(&mut self.header).chain(self.children.values_mut().flatten())
    }

    /// Decided action of the aggregate as a whole.
    pub fn action(&self) -> SyncAction {
        self.header.action
    }

    pub fn set_action(&mut self, action: SyncAction) {
        self.header.action = action;
    }
}

/// Recurrence frequency of a repeating series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Freq {
    Daily,
    Weekly,
    Monthly,
}

/// Recurrence rule attached to a series master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: Freq,
    /// Every Nth day/week/month; 0 is normalized to 1.
    pub interval: u32,
    /// Last date (inclusive) the series produces occurrences, if bounded.
    pub until: Option<NaiveDate>,
}

impl RecurrenceRule {
    pub fn new(freq: Freq, interval: u32) -> Self {
        Self {
            freq,
            interval: interval.max(1),
            until: None,
        }
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.until = Some(date);
        self
    }
}

/// Appointment fields as the remote calendar store models them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAppointment {
    pub subject: String,
    pub location: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub priority: i64,
    pub is_private: bool,
    /// Account name of the organizer.
    pub organizer: Option<String>,
    /// Attendees keyed by role slot.
    pub attendees: SlotMap,
    /// Present on series masters.
    pub recurrence: Option<RecurrenceRule>,
    /// Remote item-type flag distinguishing masters from single items.
    pub is_master: bool,
}

/// Contact fields as the remote contact store models them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteContact {
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub emails: SlotMap,
    pub phones: SlotMap,
    pub addresses: SlotMap,
}

/// Message fields as the remote mail store models them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteMessage {
    pub subject: String,
    pub body_preview: Option<String>,
    pub from: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_read: bool,
}

/// Per-kind remote payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RemotePayload {
    Appointment(RemoteAppointment),
    Contact(RemoteContact),
    Message(RemoteMessage),
}

impl RemotePayload {
    pub fn kind(&self) -> SyncKind {
        match self {
            RemotePayload::Appointment(_) => SyncKind::Appointment,
            RemotePayload::Contact(_) => SyncKind::Contact,
            RemotePayload::Message(_) => SyncKind::Message,
        }
    }

    fn blank(kind: SyncKind) -> Self {
        match kind {
            SyncKind::Appointment => RemotePayload::Appointment(RemoteAppointment::default()),
            SyncKind::Contact => RemotePayload::Contact(RemoteContact::default()),
            SyncKind::Message => RemotePayload::Message(RemoteMessage::default()),
        }
    }
}

/// One item on the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub remote_id: RemoteId,
    /// Remote last-modified version, normalized to UTC at enumeration.
    pub version: DateTime<Utc>,
    pub state: SyncState,
    pub action: SyncAction,
    /// Link property set on items created from a local record. Items lacking
    /// it are export candidates that originated on the remote side.
    pub local_link: Option<String>,
    pub payload: RemotePayload,
}

impl RemoteItem {
    /// Blank item for the create flow.
    pub fn blank(kind: SyncKind) -> Self {
        Self {
            remote_id: RemoteId::new(""),
            version: DateTime::<Utc>::MIN_UTC,
            state: SyncState::New,
            action: SyncAction::Create,
            local_link: None,
            payload: RemotePayload::blank(kind),
        }
    }

    /// Tombstone returned when the remote item no longer exists.
    pub fn tombstone(remote_id: RemoteId, kind: SyncKind) -> Self {
        Self {
            remote_id,
            version: DateTime::<Utc>::MIN_UTC,
            state: SyncState::Deleted,
            action: SyncAction::Delete,
            local_link: None,
            payload: RemotePayload::blank(kind),
        }
    }

    pub fn kind(&self) -> SyncKind {
        self.payload.kind()
    }

    pub fn is_tombstone(&self) -> bool {
        self.state == SyncState::Deleted
    }

    /// Whether this item is a repeating-series master.
    pub fn is_recurring_master(&self) -> bool {
        match &self.payload {
            RemotePayload::Appointment(a) => a.is_master && a.recurrence.is_some(),
            _ => false,
        }
    }

    pub fn appointment(&self) -> Option<&RemoteAppointment> {
        match &self.payload {
            RemotePayload::Appointment(a) => Some(a),
            _ => None,
        }
    }

    pub fn appointment_mut(&mut self) -> Option<&mut RemoteAppointment> {
        match &mut self.payload {
            RemotePayload::Appointment(a) => Some(a),
            _ => None,
        }
    }

    pub fn contact(&self) -> Option<&RemoteContact> {
        match &self.payload {
            RemotePayload::Contact(c) => Some(c),
            _ => None,
        }
    }

    pub fn contact_mut(&mut self) -> Option<&mut RemoteContact> {
        match &mut self.payload {
            RemotePayload::Contact(c) => Some(c),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&RemoteMessage> {
        match &self.payload {
            RemotePayload::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn message_mut(&mut self) -> Option<&mut RemoteMessage> {
        match &mut self.payload {
            RemotePayload::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Property projection for filter evaluation.
    ///
    /// The bounded property set of the remote search contract maps here;
    /// unknown names yield `None`.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "last_modified" => return Some(Value::DateTime(self.version)),
            "crm_link" => {
                return Some(match &self.local_link {
                    Some(link) => Value::Text(link.clone()),
                    None => Value::Null,
                })
            }
            "id" => return Some(Value::Text(self.remote_id.to_string())),
            _ => {}
        }
        match &self.payload {
            RemotePayload::Appointment(a) => match name {
                "subject" => Some(Value::Text(a.subject.clone())),
                "location" => Some(
                    a.location
                        .clone()
                        .map(Value::Text)
                        .unwrap_or(Value::Null),
                ),
                "start" => a.start.map(Value::DateTime),
                "end" => a.end.map(Value::DateTime),
                "priority" => Some(Value::Int(a.priority)),
                "is_private" => Some(Value::Bool(a.is_private)),
                "organizer" => a.organizer.clone().map(Value::Text),
                _ => None,
            },
            RemotePayload::Contact(c) => match name {
                "first_name" => Some(Value::Text(c.first_name.clone())),
                "last_name" => Some(Value::Text(c.last_name.clone())),
                "company" => c.company.clone().map(Value::Text),
                _ => None,
            },
            RemotePayload::Message(m) => match name {
                "subject" => Some(Value::Text(m.subject.clone())),
                "from" => m.from.clone().map(Value::Text),
                "sent_at" => m.sent_at.map(Value::DateTime),
                "is_read" => Some(Value::Bool(m.is_read)),
                _ => None,
            },
        }
    }
}
