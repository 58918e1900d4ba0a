//! Appointment field translation.

use chrono::SecondsFormat;

use grpsync_core::{
    ContentHash, ContentHasher, LocalItem, RemoteItem, SyncKind, Value, ATTENDEE_SLOTS,
};

use super::{mark_modified, set_if_changed, ChildSpec, Mapper};
use crate::slots::{pull_slots, push_slots};

const ATTENDEE_SCHEMA: &str = "crm.appointment.attendee";

const CHILDREN: [ChildSpec; 1] = [ChildSpec {
    schema: ATTENDEE_SCHEMA,
    value_field: "attendee",
    slots: &ATTENDEE_SLOTS,
}];

fn rfc3339(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct AppointmentMapper;

impl Mapper for AppointmentMapper {
    fn kind(&self) -> SyncKind {
        SyncKind::Appointment
    }

    fn child_specs(&self) -> &'static [ChildSpec] {
        &CHILDREN
    }

    fn pull(&self, remote: &RemoteItem, local: &mut LocalItem) {
        let Some(appt) = remote.appointment() else {
            return;
        };
        let header = &mut local.header;
        let mut changed = false;
        changed |= set_if_changed(&mut header.record, "title", appt.subject.as_str());
        changed |= set_if_changed(
            &mut header.record,
            "location",
            appt.location.clone().map(Value::Text).unwrap_or(Value::Null),
        );
        changed |= set_if_changed(
            &mut header.record,
            "start_at",
            appt.start.map(Value::DateTime).unwrap_or(Value::Null),
        );
        changed |= set_if_changed(
            &mut header.record,
            "end_at",
            appt.end.map(Value::DateTime).unwrap_or(Value::Null),
        );
        changed |= set_if_changed(&mut header.record, "priority", appt.priority);
        changed |= set_if_changed(&mut header.record, "is_private", appt.is_private);
        changed |= set_if_changed(
            &mut header.record,
            "organizer",
            appt.organizer.clone().map(Value::Text).unwrap_or(Value::Null),
        );
        if changed {
            mark_modified(header);
        }

        pull_slots(
            local.children_mut(ATTENDEE_SCHEMA),
            &appt.attendees,
            &ATTENDEE_SLOTS,
            ATTENDEE_SCHEMA,
            "attendee",
        );
    }

    fn push(&self, local: &mut LocalItem, remote: &mut RemoteItem) {
        let attendees = push_slots(local.children_mut(ATTENDEE_SCHEMA), &ATTENDEE_SLOTS, "attendee");
        let header = &local.header.record;
        remote.local_link = header.id.map(|id| id.to_string());
        let Some(appt) = remote.appointment_mut() else {
            return;
        };
        appt.subject = header.text("title").unwrap_or_default().to_owned();
        appt.location = header.text("location").map(str::to_owned);
        appt.start = header.datetime("start_at");
        appt.end = header.datetime("end_at");
        appt.priority = header.int("priority").unwrap_or_default();
        appt.is_private = header.bool("is_private").unwrap_or_default();
        appt.organizer = header.text("organizer").map(str::to_owned);
        appt.attendees = attendees;
    }

    fn content_hash(&self, remote: &RemoteItem) -> ContentHash {
        let Some(appt) = remote.appointment() else {
            return ContentHasher::new().finish();
        };
        ContentHasher::new()
            .field("subject", &appt.subject)
            .opt_field("location", appt.location.as_deref())
            .opt_field("start", appt.start.map(rfc3339).as_deref())
            .opt_field("end", appt.end.map(rfc3339).as_deref())
            .field("priority", &appt.priority.to_string())
            .field("is_private", if appt.is_private { "1" } else { "0" })
            .finish()
    }

    fn title_of(&self, remote: &RemoteItem) -> Option<String> {
        remote.appointment().map(|a| a.subject.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpsync_core::{SyncAction, SyncState};
    use crate::mapper::new_aggregate;

    fn remote(subject: &str) -> RemoteItem {
        let mut item = RemoteItem::blank(SyncKind::Appointment);
        if let Some(a) = item.appointment_mut() {
            a.subject = subject.into();
            a.location = Some("Room 2".into());
            a.start = Some("2024-05-01T09:00:00Z".parse().unwrap());
            a.end = Some("2024-05-01T10:00:00Z".parse().unwrap());
            a.priority = 1;
            a.attendees.insert(ATTENDEE_SLOTS[0], "ada@x.io".into());
        }
        item
    }

    #[test]
    fn test_pull_then_push_preserves_fields() {
        let source = remote("Review");
        let mut local = new_aggregate(SyncKind::Appointment);
        AppointmentMapper.pull(&source, &mut local);

        assert_eq!(local.header.record.text("title"), Some("Review"));
        assert_eq!(local.children(ATTENDEE_SCHEMA).len(), 1);

        let mut out = RemoteItem::blank(SyncKind::Appointment);
        AppointmentMapper.push(&mut local, &mut out);
        let a = out.appointment().unwrap();
        assert_eq!(a.subject, "Review");
        assert_eq!(a.location.as_deref(), Some("Room 2"));
        assert_eq!(
            a.attendees.get(&ATTENDEE_SLOTS[0]).map(String::as_str),
            Some("ada@x.io")
        );
    }

    #[test]
    fn test_pull_unchanged_content_is_noop() {
        let source = remote("Review");
        let mut local = new_aggregate(SyncKind::Appointment);
        AppointmentMapper.pull(&source, &mut local);
        for entity in local.entities_mut() {
            entity.state = SyncState::Unchanged;
            entity.action = SyncAction::None;
        }

        AppointmentMapper.pull(&source, &mut local);
        assert!(local.entities().all(|e| e.action == SyncAction::None));
    }

    #[test]
    fn test_hash_tracks_content_not_metadata() {
        let a = remote("Review");
        let mut b = remote("Review");
        b.version = chrono::Utc::now();
        b.local_link = Some("9".into());
        assert_eq!(
            AppointmentMapper.content_hash(&a),
            AppointmentMapper.content_hash(&b)
        );

        let mut c = remote("Review");
        c.appointment_mut().unwrap().priority = 2;
        assert_ne!(
            AppointmentMapper.content_hash(&a),
            AppointmentMapper.content_hash(&c)
        );
    }
}
