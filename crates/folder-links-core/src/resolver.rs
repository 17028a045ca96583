use crate::error::Result;
use crate::host::{FileExplorer, Vault};
use crate::path::folder_path_from_link;
use crate::snapshot::{FolderEntry, FolderSnapshot};

pub const RESOLVED_LINK_CLASS: &str = "is-resolved";
pub const UNRESOLVED_LINK_CLASS: &str = "is-unresolved";
pub const FOLDER_LINK_CLASS: &str = "folder-link";

/// Outcome of resolving a folder link against a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(FolderEntry),
    Unresolved { path: String },
}

impl Resolution {
    pub fn state(&self) -> LinkState {
        match self {
            Resolution::Resolved(_) => LinkState::Resolved,
            Resolution::Unresolved { .. } => LinkState::Unresolved,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Resolution::Resolved(entry) => &entry.path,
            Resolution::Unresolved { path } => path,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkState {
    Resolved,
    Unresolved,
}

impl LinkState {
    pub fn class(self) -> &'static str {
        match self {
            LinkState::Resolved => RESOLVED_LINK_CLASS,
            LinkState::Unresolved => UNRESOLVED_LINK_CLASS,
        }
    }

    /// The class this state replaces.
    pub fn opposite_class(self) -> &'static str {
        match self {
            LinkState::Resolved => UNRESOLVED_LINK_CLASS,
            LinkState::Unresolved => RESOLVED_LINK_CLASS,
        }
    }
}

/// Resolve a folder link target (`"Projects/"`) against `snapshot`.
pub fn resolve(target: &str, snapshot: &FolderSnapshot) -> Resolution {
    resolve_path(&folder_path_from_link(target), snapshot)
}

/// Resolve an already-normalized folder path.
pub fn resolve_path(path: &str, snapshot: &FolderSnapshot) -> Resolution {
    match snapshot.find(path) {
        Some(entry) => Resolution::Resolved(entry.clone()),
        None => Resolution::Unresolved {
            path: path.to_string(),
        },
    }
}

/// What a click on a folder link did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkAction {
    Revealed(String),
    Created(String),
    /// The root link: there is nothing to reveal or create.
    Ignored,
}

/// Click handler shared by every surface: reveal a resolved folder, create a
/// missing one.
pub fn activate(
    target: &str,
    snapshot: &FolderSnapshot,
    explorer: &dyn FileExplorer,
    vault: &dyn Vault,
) -> Result<LinkAction> {
    activate_path(&folder_path_from_link(target), snapshot, explorer, vault)
}

pub fn activate_path(
    path: &str,
    snapshot: &FolderSnapshot,
    explorer: &dyn FileExplorer,
    vault: &dyn Vault,
) -> Result<LinkAction> {
    if path.is_empty() {
        tracing::debug!("Ignoring click on the root link");
        return Ok(LinkAction::Ignored);
    }
    match resolve_path(path, snapshot) {
        Resolution::Resolved(entry) => {
            tracing::debug!("Revealing folder {}", entry.path);
            explorer.reveal_in_folder(&entry);
            Ok(LinkAction::Revealed(entry.path))
        }
        Resolution::Unresolved { path } => {
            tracing::info!("Creating folder {}", path);
            vault.create_folder(&path)?;
            Ok(LinkAction::Created(path))
        }
    }
}
