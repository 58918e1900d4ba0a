//! Proptest generators for property-based testing.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use grpsync_core::{
    Freq, RecurrenceRule, RemoteItem, SyncKind, ADDRESS_SLOTS, EMAIL_SLOTS, PHONE_SLOTS,
};

use crate::fixtures::window_start;

/// Generate a sync kind.
pub fn sync_kind() -> impl Strategy<Value = SyncKind> {
    prop_oneof![
        Just(SyncKind::Appointment),
        Just(SyncKind::Contact),
        Just(SyncKind::Message),
    ]
}

/// Generate a recurrence frequency.
pub fn freq() -> impl Strategy<Value = Freq> {
    prop_oneof![Just(Freq::Daily), Just(Freq::Weekly), Just(Freq::Monthly)]
}

/// Generate a recurrence rule with a small interval.
pub fn recurrence_rule() -> impl Strategy<Value = RecurrenceRule> {
    (freq(), 1u32..=4).prop_map(|(f, interval)| RecurrenceRule::new(f, interval))
}

/// Generate a timestamp inside the fixture year.
pub fn version() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..365 * 24).prop_map(|hours| window_start() + Duration::hours(hours))
}

/// Generate a person name.
pub fn person_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,9}".prop_map(String::from)
}

/// Generate a short subject line.
pub fn subject() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 ]{0,23}".prop_map(String::from)
}

/// Generate an email address.
pub fn email() -> impl Strategy<Value = String> {
    "[a-z]{3,8}@[a-z]{3,8}\\.com".prop_map(String::from)
}

/// Parameters for generating a remote contact.
#[derive(Debug, Clone)]
pub struct ContactParams {
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    /// Values assigned to email slots in order; at most the slot count.
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
    pub version: DateTime<Utc>,
}

impl Arbitrary for ContactParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            person_name(),
            person_name(),
            proptest::option::of("[A-Z][a-z]{3,12}".prop_map(String::from)),
            proptest::collection::vec(email(), 0..=EMAIL_SLOTS.len()),
            proptest::collection::vec("\\+1 555 01[0-9]{2}".prop_map(String::from), 0..=PHONE_SLOTS.len()),
            proptest::collection::vec("[0-9]{1,4} [A-Z][a-z]{3,10} St".prop_map(String::from), 0..=ADDRESS_SLOTS.len()),
            version(),
        )
            .prop_map(
                |(first_name, last_name, company, emails, phones, addresses, version)| {
                    ContactParams {
                        first_name,
                        last_name,
                        company,
                        emails,
                        phones,
                        addresses,
                        version,
                    }
                },
            )
            .boxed()
    }
}

/// Build a remote contact item from parameters.
pub fn contact_from_params(params: &ContactParams) -> RemoteItem {
    let mut item = RemoteItem::blank(SyncKind::Contact);
    item.version = params.version;
    if let Some(c) = item.contact_mut() {
        c.first_name = params.first_name.clone();
        c.last_name = params.last_name.clone();
        c.company = params.company.clone();
        for (slot, value) in EMAIL_SLOTS.iter().zip(&params.emails) {
            c.emails.insert(*slot, value.clone());
        }
        for (slot, value) in PHONE_SLOTS.iter().zip(&params.phones) {
            c.phones.insert(*slot, value.clone());
        }
        for (slot, value) in ADDRESS_SLOTS.iter().zip(&params.addresses) {
            c.addresses.insert(*slot, value.clone());
        }
    }
    item
}

/// Parameters for generating a remote appointment.
#[derive(Debug, Clone)]
pub struct AppointmentParams {
    pub subject: String,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub minutes: i64,
    pub priority: i64,
    pub is_private: bool,
    pub recurrence: Option<RecurrenceRule>,
}

impl Arbitrary for AppointmentParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            subject(),
            proptest::option::of("[A-Z][a-z]{2,10}".prop_map(String::from)),
            version(),
            15i64..=480,
            0i64..=2,
            any::<bool>(),
            proptest::option::of(recurrence_rule()),
        )
            .prop_map(
                |(subject, location, start, minutes, priority, is_private, recurrence)| {
                    AppointmentParams {
                        subject,
                        location,
                        start,
                        minutes,
                        priority,
                        is_private,
                        recurrence,
                    }
                },
            )
            .boxed()
    }
}

/// Build a remote appointment item from parameters.
pub fn appointment_from_params(params: &AppointmentParams) -> RemoteItem {
    let mut item = RemoteItem::blank(SyncKind::Appointment);
    item.version = params.start;
    if let Some(a) = item.appointment_mut() {
        a.subject = params.subject.clone();
        a.location = params.location.clone();
        a.start = Some(params.start);
        a.end = Some(params.start + Duration::minutes(params.minutes));
        a.priority = params.priority;
        a.is_private = params.is_private;
        a.recurrence = params.recurrence.clone();
        a.is_master = params.recurrence.is_some();
    }
    item
}
