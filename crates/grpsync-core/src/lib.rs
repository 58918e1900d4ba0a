//! Core primitives for grpsync.
//!
//! This crate defines the vocabulary shared by every other grpsync crate:
//!
//! - **Identities**: [`LocalId`], [`RemoteId`], [`UserId`], [`RemoteStoreId`]
//! - **Records**: [`LocalRecord`] with typed columns and loaded-introspection
//! - **Aggregates**: [`LocalItem`] bundles of records synchronized as one unit
//! - **Remote items**: [`RemoteItem`] with per-kind payloads
//! - **Change tracking**: [`SyncState`], [`SyncAction`], [`ContentHash`]
//! - **Configuration**: the immutable per-session [`SessionSettings`] snapshot
//!
//! Nothing in this crate performs I/O; storage and remote boundaries live in
//! `grpsync-store` and `grpsync-remote`.

pub mod error;
pub mod filter;
pub mod hash;
pub mod item;
pub mod payload;
pub mod settings;
pub mod types;
pub mod value;

pub use error::{CoreError, Result};
pub use filter::{Cmp, Filter};
pub use hash::{ContentHash, ContentHasher};
pub use item::{
    Freq, LocalItem, RecurrenceRule, RemoteAppointment, RemoteContact, RemoteItem, RemoteMessage,
    RemotePayload, SlotMap, SyncEntity, ADDRESS_SLOTS, ATTENDEE_SLOTS, EMAIL_SLOTS, PHONE_SLOTS,
};
pub use payload::{ExtensionPayload, PAYLOAD_VERSION};
pub use settings::{ExportScope, SessionSettings};
pub use types::{
    FolderId, LocalId, RemoteId, RemoteStoreId, SlotKey, SyncAction, SyncKind, SyncState, UserId,
};
pub use value::{LocalRecord, Value};
