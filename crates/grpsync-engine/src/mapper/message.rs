//! Message field translation. Messages have no child tables.

use chrono::SecondsFormat;

use grpsync_core::{ContentHash, ContentHasher, LocalItem, RemoteItem, SyncKind, Value};

use super::{mark_modified, set_if_changed, ChildSpec, Mapper};

pub struct MessageMapper;

impl Mapper for MessageMapper {
    fn kind(&self) -> SyncKind {
        SyncKind::Message
    }

    fn child_specs(&self) -> &'static [ChildSpec] {
        &[]
    }

    fn pull(&self, remote: &RemoteItem, local: &mut LocalItem) {
        let Some(msg) = remote.message() else {
            return;
        };
        let header = &mut local.header;
        let mut changed = false;
        changed |= set_if_changed(&mut header.record, "subject", msg.subject.as_str());
        changed |= set_if_changed(
            &mut header.record,
            "body_preview",
            msg.body_preview.clone().map(Value::Text).unwrap_or(Value::Null),
        );
        changed |= set_if_changed(
            &mut header.record,
            "sender",
            msg.from.clone().map(Value::Text).unwrap_or(Value::Null),
        );
        changed |= set_if_changed(
            &mut header.record,
            "sent_at",
            msg.sent_at.map(Value::DateTime).unwrap_or(Value::Null),
        );
        changed |= set_if_changed(&mut header.record, "is_read", msg.is_read);
        if changed {
            mark_modified(header);
        }
    }

    fn push(&self, local: &mut LocalItem, remote: &mut RemoteItem) {
        let header = &local.header.record;
        remote.local_link = header.id.map(|id| id.to_string());
        let Some(msg) = remote.message_mut() else {
            return;
        };
        msg.subject = header.text("subject").unwrap_or_default().to_owned();
        msg.body_preview = header.text("body_preview").map(str::to_owned);
        msg.from = header.text("sender").map(str::to_owned);
        msg.sent_at = header.datetime("sent_at");
        msg.is_read = header.bool("is_read").unwrap_or_default();
    }

    fn content_hash(&self, remote: &RemoteItem) -> ContentHash {
        let Some(msg) = remote.message() else {
            return ContentHasher::new().finish();
        };
        ContentHasher::new()
            .field("subject", &msg.subject)
            .opt_field("from", msg.from.as_deref())
            .opt_field(
                "sent_at",
                msg.sent_at
                    .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .as_deref(),
            )
            .field("is_read", if msg.is_read { "1" } else { "0" })
            .finish()
    }

    fn title_of(&self, remote: &RemoteItem) -> Option<String> {
        remote.message().map(|m| m.subject.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::new_aggregate;

    fn remote() -> RemoteItem {
        let mut item = RemoteItem::blank(SyncKind::Message);
        if let grpsync_core::RemotePayload::Message(m) = &mut item.payload {
            m.subject = "Q3 numbers".into();
            m.from = Some("cfo@corp".into());
            m.sent_at = Some("2024-06-01T08:00:00Z".parse().unwrap());
        }
        item
    }

    #[test]
    fn test_pull_then_push_roundtrips() {
        let mut local = new_aggregate(SyncKind::Message);
        MessageMapper.pull(&remote(), &mut local);

        assert_eq!(local.header.record.text("subject"), Some("Q3 numbers"));
        assert_eq!(local.header.record.bool("is_read"), Some(false));

        let mut out = RemoteItem::blank(SyncKind::Message);
        MessageMapper.push(&mut local, &mut out);
        assert_eq!(out.message().unwrap().subject, "Q3 numbers");
        assert_eq!(out.message().unwrap().from.as_deref(), Some("cfo@corp"));
    }

    #[test]
    fn test_read_flag_changes_hash() {
        let unread = remote();
        let mut read = remote();
        if let grpsync_core::RemotePayload::Message(m) = &mut read.payload {
            m.is_read = true;
        }
        assert_ne!(
            MessageMapper.content_hash(&unread),
            MessageMapper.content_hash(&read)
        );
    }
}
