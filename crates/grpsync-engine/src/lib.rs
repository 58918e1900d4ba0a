//! The grpsync synchronization engine.
//!
//! Everything between the store boundaries lives here: watermark-bounded
//! change enumeration, per-kind field mappers, slot reconciliation against
//! bounded remote slot sets, conflict resolution, recurring-series fan-out,
//! pre-write guards, and the driver that runs one pass per kind over a
//! session.
//!
//! The engine is deterministic given its inputs; all I/O goes through the
//! [`grpsync_store`] and [`grpsync_remote`] traits, so every path here is
//! testable against the in-memory implementations.

pub mod actualizer;
pub mod conflict;
pub mod driver;
pub mod enumerate;
pub mod error;
pub mod guards;
pub mod mapper;
pub mod recurrence;
pub mod report;
pub mod session;
pub mod slots;

pub use actualizer::{actualize, LocalChange};
pub use conflict::{resolve, ConflictInput, Resolution};
pub use driver::SyncDriver;
pub use enumerate::{enumeration_filter, ChangeEnumerator};
pub use error::{EngineError, Result};
pub use guards::{
    duplicate_filter, duplicate_guard, lock_identity, organizer_guard, stable_identity, Skip,
};
pub use mapper::{
    load_aggregate, mapper_for, new_aggregate, save_aggregate, ChildSpec, Mapper, SyncStore,
    PARENT_FIELD,
};
pub use recurrence::{supersede_single_instance, Occurrences, SeriesExpansion};
pub use report::SyncReport;
pub use session::{SessionCache, SyncSession, MAX_CONSECUTIVE_FAILURES};
pub use slots::{pull_slots, push_slots, SLOT_FIELD};
