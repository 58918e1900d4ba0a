//! Remote folder model and discovery helpers.

use grpsync_core::{FolderId, SyncKind};
use serde::{Deserialize, Serialize};

/// What a remote folder contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderKind {
    Calendar,
    Contacts,
    Mail,
}

impl FolderKind {
    /// The sync kind whose items live in folders of this kind.
    pub fn sync_kind(&self) -> SyncKind {
        match self {
            FolderKind::Calendar => SyncKind::Appointment,
            FolderKind::Contacts => SyncKind::Contact,
            FolderKind::Mail => SyncKind::Message,
        }
    }

    pub fn for_sync_kind(kind: SyncKind) -> Self {
        match kind {
            SyncKind::Appointment => FolderKind::Calendar,
            SyncKind::Contact => FolderKind::Contacts,
            SyncKind::Message => FolderKind::Mail,
        }
    }
}

/// One folder on the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub parent: Option<FolderId>,
    pub kind: FolderKind,
}

impl Folder {
    pub fn root(id: impl Into<String>, name: impl Into<String>, kind: FolderKind) -> Self {
        Self {
            id: FolderId::new(id),
            name: name.into(),
            parent: None,
            kind,
        }
    }

    pub fn child(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: FolderId,
        kind: FolderKind,
    ) -> Self {
        Self {
            id: FolderId::new(id),
            name: name.into(),
            parent: Some(parent),
            kind,
        }
    }
}

/// Expand a flat folder list into the set reachable from `roots`.
///
/// Used by the recursive discovery walk: given every folder the store knows,
/// returns those under (and including) the roots, breadth-first.
pub fn descendants<'a>(all: &'a [Folder], roots: &[FolderId]) -> Vec<&'a Folder> {
    let mut out: Vec<&Folder> = Vec::new();
    let mut frontier: Vec<&FolderId> = roots.iter().collect();

    while let Some(current) = frontier.pop() {
        for folder in all {
            let reachable = folder.id == *current
                || folder.parent.as_ref() == Some(current);
            if reachable && !out.iter().any(|f| f.id == folder.id) {
                if folder.parent.as_ref() == Some(current) {
                    frontier.push(&folder.id);
                }
                out.push(folder);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_walk() {
        let cal = Folder::root("cal", "Calendar", FolderKind::Calendar);
        let team = Folder::child("team", "Team", cal.id.clone(), FolderKind::Calendar);
        let archive = Folder::child("arch", "Archive", team.id.clone(), FolderKind::Calendar);
        let other = Folder::root("inbox", "Inbox", FolderKind::Mail);

        let all = vec![cal.clone(), team, archive, other];
        let found = descendants(&all, &[cal.id.clone()]);
        let names: Vec<_> = found.iter().map(|f| f.name.as_str()).collect();

        assert!(names.contains(&"Calendar"));
        assert!(names.contains(&"Team"));
        assert!(names.contains(&"Archive"));
        assert!(!names.contains(&"Inbox"));
    }
}
