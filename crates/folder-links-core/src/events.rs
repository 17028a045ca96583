/// Whether a vault entry is a note/file or a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// A change reported by the vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VaultEvent {
    Create { path: String, kind: EntryKind },
    Rename { path: String, old_path: String, kind: EntryKind },
    Delete { path: String, kind: EntryKind },
}

impl VaultEvent {
    pub fn create_folder(path: impl Into<String>) -> Self {
        VaultEvent::Create {
            path: path.into(),
            kind: EntryKind::Folder,
        }
    }

    pub fn delete_folder(path: impl Into<String>) -> Self {
        VaultEvent::Delete {
            path: path.into(),
            kind: EntryKind::Folder,
        }
    }

    pub fn rename_folder(old_path: impl Into<String>, path: impl Into<String>) -> Self {
        VaultEvent::Rename {
            path: path.into(),
            old_path: old_path.into(),
            kind: EntryKind::Folder,
        }
    }

    /// Current path of the entry (the new path for renames).
    pub fn path(&self) -> &str {
        match self {
            VaultEvent::Create { path, .. }
            | VaultEvent::Rename { path, .. }
            | VaultEvent::Delete { path, .. } => path,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            VaultEvent::Create { kind, .. }
            | VaultEvent::Rename { kind, .. }
            | VaultEvent::Delete { kind, .. } => *kind,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == EntryKind::Folder
    }

    /// Folder rename carried by this event, if any.
    pub fn as_folder_rename(&self) -> Option<FolderRename> {
        match self {
            VaultEvent::Rename {
                path,
                old_path,
                kind: EntryKind::Folder,
            } => Some(FolderRename::new(old_path, path)),
            _ => None,
        }
    }
}

/// A folder moved from `old_path` to `new_path`. Paths carry no trailing separator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FolderRename {
    pub old_path: String,
    pub new_path: String,
}

impl FolderRename {
    pub fn new(old_path: impl AsRef<str>, new_path: impl AsRef<str>) -> Self {
        Self {
            old_path: old_path.as_ref().trim_matches('/').to_string(),
            new_path: new_path.as_ref().trim_matches('/').to_string(),
        }
    }
}
