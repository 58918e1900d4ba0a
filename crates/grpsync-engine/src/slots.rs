//! Reconciliation between bounded remote slots and unbounded local child
//! tables.
//!
//! The remote model exposes fixed keyed positions (email-1/2/3, business and
//! home address, required and optional attendees) where the local store keeps
//! an unbounded child table. Each reconciled child carries a slot marker in
//! its record and extension payload; the marker is the join key, so repeated
//! reconciliation never reshuffles assignments.

use std::collections::BTreeSet;

use grpsync_core::{
    ExtensionPayload, LocalRecord, SlotKey, SlotMap, SyncAction, SyncEntity, SyncState,
};

/// Marker field on slot-reconciled child records.
pub const SLOT_FIELD: &str = "slot";

/// Slot marker of a child, from the payload or the persisted field.
fn slot_of(entity: &SyncEntity) -> Option<&str> {
    entity.slot().or_else(|| entity.record.text(SLOT_FIELD))
}

fn is_live(entity: &SyncEntity) -> bool {
    entity.state != SyncState::Deleted && !entity.record.is_deleted()
}

fn claim(entity: &mut SyncEntity, slot: &str) {
    entity.record.set(SLOT_FIELD, slot);
    entity.payload.slot = Some(slot.to_owned());
    if entity.state == SyncState::Unchanged {
        entity.state = SyncState::Modified;
    }
}

/// Project local children onto the remote slot map.
///
/// Marked children keep their claimed slot. Unmarked children are assigned,
/// in creation order, to the first unclaimed slot and marked; children beyond
/// slot capacity stay unmarked and local-only. Deleted children contribute
/// nothing, so their slot comes back empty on the remote side.
pub fn push_slots(children: &mut [SyncEntity], slots: &[SlotKey], value_field: &str) -> SlotMap {
    let valid: BTreeSet<&str> = slots.iter().map(SlotKey::as_str).collect();
    let mut claimed: BTreeSet<String> = children
        .iter()
        .filter(|e| is_live(e))
        .filter_map(slot_of)
        .filter(|s| valid.contains(s))
        .map(str::to_owned)
        .collect();

    for entity in children.iter_mut() {
        if !is_live(entity) || slot_of(entity).is_some() {
            continue;
        }
        let Some(free) = slots.iter().find(|s| !claimed.contains(s.as_str())) else {
            break;
        };
        claim(entity, free.as_str());
        claimed.insert(free.as_str().to_owned());
    }

    let mut map = SlotMap::new();
    for entity in children.iter().filter(|e| is_live(e)) {
        let Some(slot) = slot_of(entity) else { continue };
        let Some(key) = slots.iter().find(|k| k.as_str() == slot) else {
            continue;
        };
        if let Some(value) = entity.record.text(value_field).filter(|v| !v.is_empty()) {
            map.insert(*key, value.to_owned());
        }
    }
    map
}

/// Apply the remote slot map to local children.
///
/// Per slot: an occupied slot updates the marked child (or creates one when
/// no child claims the slot), an empty slot deletes the marked child.
/// Unmarked children are never touched by an import.
pub fn pull_slots(
    children: &mut Vec<SyncEntity>,
    remote: &SlotMap,
    slots: &[SlotKey],
    child_schema: &str,
    value_field: &str,
) {
    for key in slots {
        let incoming = remote
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty());
        let pos = children
            .iter()
            .position(|e| is_live(e) && slot_of(e) == Some(key.as_str()));

        match (incoming, pos) {
            (Some(value), Some(i)) => {
                let entity = &mut children[i];
                if entity.record.text(value_field) != Some(value) {
                    entity.record.set(value_field, value);
                    entity.state = SyncState::Modified;
                    entity.action = SyncAction::Update;
                }
            }
            (Some(value), None) => {
                let mut record = LocalRecord::new(child_schema);
                record.set(value_field, value);
                record.set(SLOT_FIELD, key.as_str());
                let mut entity = SyncEntity::with_state(record, SyncState::New);
                entity.action = SyncAction::Create;
                entity.payload = ExtensionPayload::for_slot(key.as_str());
                children.push(entity);
            }
            (None, Some(i)) => {
                let entity = &mut children[i];
                entity.state = SyncState::Deleted;
                entity.action = SyncAction::Delete;
            }
            (None, None) => {}
        }
    }
}
