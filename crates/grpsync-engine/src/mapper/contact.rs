//! Contact field translation.
//!
//! Three slot-reconciled child tables: emails, phones, and postal addresses,
//! each against its bounded remote slot set.

use grpsync_core::{
    ContentHash, ContentHasher, LocalItem, RemoteItem, SlotMap, SyncKind, Value, ADDRESS_SLOTS,
    EMAIL_SLOTS, PHONE_SLOTS,
};

use super::{mark_modified, set_if_changed, ChildSpec, Mapper};
use crate::slots::{pull_slots, push_slots};

const EMAIL_SCHEMA: &str = "crm.contact.email";
const PHONE_SCHEMA: &str = "crm.contact.phone";
const ADDRESS_SCHEMA: &str = "crm.contact.address";

const CHILDREN: [ChildSpec; 3] = [
    ChildSpec {
        schema: EMAIL_SCHEMA,
        value_field: "email",
        slots: &EMAIL_SLOTS,
    },
    ChildSpec {
        schema: PHONE_SCHEMA,
        value_field: "phone",
        slots: &PHONE_SLOTS,
    },
    ChildSpec {
        schema: ADDRESS_SCHEMA,
        value_field: "address",
        slots: &ADDRESS_SLOTS,
    },
];

fn hash_slots(mut hasher: ContentHasher, name: &str, slots: &SlotMap) -> ContentHasher {
    for (key, value) in slots {
        hasher = hasher.field(key.as_str(), value).field("~", name);
    }
    hasher
}

pub struct ContactMapper;

impl Mapper for ContactMapper {
    fn kind(&self) -> SyncKind {
        SyncKind::Contact
    }

    fn child_specs(&self) -> &'static [ChildSpec] {
        &CHILDREN
    }

    fn pull(&self, remote: &RemoteItem, local: &mut LocalItem) {
        let Some(contact) = remote.contact() else {
            return;
        };
        let header = &mut local.header;
        let mut changed = false;
        changed |= set_if_changed(&mut header.record, "first_name", contact.first_name.as_str());
        changed |= set_if_changed(&mut header.record, "last_name", contact.last_name.as_str());
        changed |= set_if_changed(
            &mut header.record,
            "company",
            contact.company.clone().map(Value::Text).unwrap_or(Value::Null),
        );
        if changed {
            mark_modified(header);
        }

        let slot_maps = [&contact.emails, &contact.phones, &contact.addresses];
        for (spec, remote_slots) in CHILDREN.iter().zip(slot_maps) {
            pull_slots(
                local.children_mut(spec.schema),
                remote_slots,
                spec.slots,
                spec.schema,
                spec.value_field,
            );
        }
    }

    fn push(&self, local: &mut LocalItem, remote: &mut RemoteItem) {
        let emails = push_slots(local.children_mut(EMAIL_SCHEMA), &EMAIL_SLOTS, "email");
        let phones = push_slots(local.children_mut(PHONE_SCHEMA), &PHONE_SLOTS, "phone");
        let addresses = push_slots(local.children_mut(ADDRESS_SCHEMA), &ADDRESS_SLOTS, "address");

        let header = &local.header.record;
        remote.local_link = header.id.map(|id| id.to_string());
        let Some(contact) = remote.contact_mut() else {
            return;
        };
        contact.first_name = header.text("first_name").unwrap_or_default().to_owned();
        contact.last_name = header.text("last_name").unwrap_or_default().to_owned();
        contact.company = header.text("company").map(str::to_owned);
        contact.emails = emails;
        contact.phones = phones;
        contact.addresses = addresses;
    }

    fn content_hash(&self, remote: &RemoteItem) -> ContentHash {
        let Some(contact) = remote.contact() else {
            return ContentHasher::new().finish();
        };
        let mut hasher = ContentHasher::new()
            .field("first_name", &contact.first_name)
            .field("last_name", &contact.last_name)
            .opt_field("company", contact.company.as_deref());
        hasher = hash_slots(hasher, "email", &contact.emails);
        hasher = hash_slots(hasher, "phone", &contact.phones);
        hasher = hash_slots(hasher, "address", &contact.addresses);
        hasher.finish()
    }

    fn title_of(&self, remote: &RemoteItem) -> Option<String> {
        let contact = remote.contact()?;
        let name = format!("{} {}", contact.first_name, contact.last_name);
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_owned())
    }
}
