//! Per-kind mappers between remote payloads and local aggregates.
//!
//! A mapper owns the field translation for one kind: which header fields map
//! to which remote properties, which child tables reconcile against which
//! slot sets, and which fields feed the content hash. The driver is generic
//! over this trait; nothing outside this module knows kind-specific names.

mod appointment;
mod contact;
mod message;

pub use appointment::AppointmentMapper;
pub use contact::ContactMapper;
pub use message::MessageMapper;

use grpsync_core::{
    ContentHash, Filter, LocalId, LocalItem, LocalRecord, RemoteItem, SlotKey, SyncAction,
    SyncEntity, SyncKind, SyncState, Value,
};
use grpsync_store::{LocalStore, LockStore, MetadataStore};

use crate::error::Result;

/// Field on child records linking them to their aggregate header.
pub const PARENT_FIELD: &str = "parent_id";

/// Storage seen by the engine: local records, metadata linkage, and locks.
pub trait SyncStore: LocalStore + MetadataStore + LockStore {}

impl<T: LocalStore + MetadataStore + LockStore> SyncStore for T {}

/// One slot-reconciled child table of an aggregate.
pub struct ChildSpec {
    pub schema: &'static str,
    /// Field holding the reconciled value.
    pub value_field: &'static str,
    pub slots: &'static [SlotKey],
}

/// Field translation for one kind.
pub trait Mapper: Send + Sync {
    fn kind(&self) -> SyncKind;

    fn child_specs(&self) -> &'static [ChildSpec];

    /// Apply a remote item onto the aggregate. Touched entities get their
    /// state and action set; untouched ones stay `Unchanged`.
    fn pull(&self, remote: &RemoteItem, local: &mut LocalItem);

    /// Project the aggregate into a remote item, assigning slots to unmarked
    /// children as a side effect.
    fn push(&self, local: &mut LocalItem, remote: &mut RemoteItem);

    /// Hash of the discriminating content fields of a remote item.
    fn content_hash(&self, remote: &RemoteItem) -> ContentHash;

    /// Short human-readable label, denormalized into the metadata payload.
    fn title_of(&self, remote: &RemoteItem) -> Option<String>;
}

/// The mapper for a kind.
pub fn mapper_for(kind: SyncKind) -> &'static dyn Mapper {
    match kind {
        SyncKind::Appointment => &AppointmentMapper,
        SyncKind::Contact => &ContactMapper,
        SyncKind::Message => &MessageMapper,
    }
}

/// An empty aggregate for an import that has no local counterpart yet.
pub fn new_aggregate(kind: SyncKind) -> LocalItem {
    let mut header = SyncEntity::with_state(LocalRecord::new(kind.schema_name()), SyncState::New);
    header.action = SyncAction::Create;
    LocalItem::new(kind.schema_name(), header)
}

/// Load an aggregate by header identity, with its live children.
pub async fn load_aggregate<S: LocalStore + ?Sized>(
    store: &S,
    kind: SyncKind,
    id: LocalId,
) -> Result<Option<LocalItem>> {
    let Some(header) = store.fetch(kind.schema_name(), id).await? else {
        return Ok(None);
    };
    let mut item = LocalItem::new(kind.schema_name(), SyncEntity::new(header));
    for spec in mapper_for(kind).child_specs() {
        let filter = Filter::eq(PARENT_FIELD, Value::Int(id.0));
        let children = store.query(spec.schema, &filter).await?;
        item.children_mut(spec.schema)
            .extend(children.into_iter().map(SyncEntity::new));
    }
    Ok(Some(item))
}

/// Persist every decided write of an aggregate and return the header id.
///
/// Inserts wire `parent_id` on children; deletes are soft. Entities whose
/// action is `None` are left untouched.
pub async fn save_aggregate<S: LocalStore + ?Sized>(
    store: &S,
    item: &mut LocalItem,
) -> Result<LocalId> {
    let header_id = match (item.header.record.id, item.header.action) {
        (None, _) => {
            let id = store.insert(item.header.record.clone()).await?;
            item.header.record.id = Some(id);
            id
        }
        (Some(id), SyncAction::Delete) => {
            store.delete(&item.header.record.schema, id).await?;
            id
        }
        (Some(id), action) if action.is_write() => {
            store.update(&item.header.record).await?;
            id
        }
        (Some(id), _) => id,
    };

    let schemas: Vec<String> = item.child_schemas().map(str::to_owned).collect();
    for schema in schemas {
        for entity in item.children_mut(&schema) {
            match (entity.record.id, entity.action) {
                (None, action) if action.is_write() => {
                    entity.record.set(PARENT_FIELD, header_id.0);
                    let id = store.insert(entity.record.clone()).await?;
                    entity.record.id = Some(id);
                }
                (Some(id), SyncAction::Delete) => {
                    store.delete(&entity.record.schema, id).await?;
                }
                (Some(_), action) if action.is_write() => {
                    if !entity.record.is_loaded(PARENT_FIELD) {
                        entity.record.set(PARENT_FIELD, header_id.0);
                    }
                    store.update(&entity.record).await?;
                }
                _ => {}
            }
        }
    }
    Ok(header_id)
}

/// Set a field only when its value differs, reporting whether it did.
pub(crate) fn set_if_changed(
    record: &mut LocalRecord,
    field: &str,
    value: impl Into<Value>,
) -> bool {
    let value = value.into();
    if record.get(field) == Some(&value) || (record.get(field).is_none() && value.is_null()) {
        return false;
    }
    record.set(field, value);
    true
}

/// Mark a header entity modified after field changes.
pub(crate) fn mark_modified(entity: &mut SyncEntity) {
    if entity.state == SyncState::Unchanged {
        entity.state = SyncState::Modified;
    }
    if entity.action == SyncAction::None {
        entity.action = SyncAction::Update;
    }
}
