//! The remote groupware store boundary for grpsync.
//!
//! Defines what the engine may ask of the remote side: bind-by-identity,
//! paginated filter search, folder discovery, and mutations with a
//! notification-suppression toggle. The real directory-protocol client
//! implements [`RemoteStore`] elsewhere; [`MemoryRemoteStore`] implements it
//! here for tests.

pub mod error;
pub mod folder;
pub mod memory;
pub mod page;
pub mod traits;

pub use error::{RemoteError, Result};
pub use folder::{descendants, Folder, FolderKind};
pub use memory::{MemoryRemoteStore, MutationLogEntry};
pub use page::{Page, PageRequest};
pub use traits::RemoteStore;
