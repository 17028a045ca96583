use crate::fs_vault::FsVault;
use folder_links_core::events::{EntryKind, VaultEvent};
use folder_links_core::FolderLinksPlugin;
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a filesystem event means for the plugin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchAction {
    Vault(VaultEvent),
    NoteModified(String),
}

/// Translate one notify event. `known_folder` answers whether a path that no
/// longer exists on disk was a folder.
pub fn map_event(
    vault: &FsVault,
    event: &Event,
    known_folder: impl Fn(&str) -> bool,
) -> Vec<WatchAction> {
    let visible = |path: &Path| {
        vault
            .relative(path)
            .filter(|rel| !FsVault::is_hidden(rel))
    };
    let kind_on_disk = |path: &Path| {
        if path.is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    };
    let kind_removed = |rel: &str| {
        if known_folder(rel) {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    };

    let mut actions = Vec::new();
    match &event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                let mapped = match (visible(from), visible(to)) {
                    (Some(old_path), Some(path)) => Some(VaultEvent::Rename {
                        kind: kind_on_disk(to),
                        path,
                        old_path,
                    }),
                    (None, Some(path)) => Some(VaultEvent::Create {
                        kind: kind_on_disk(to),
                        path,
                    }),
                    (Some(path), None) => Some(VaultEvent::Delete {
                        kind: kind_removed(&path),
                        path,
                    }),
                    (None, None) => None,
                };
                actions.extend(mapped.map(WatchAction::Vault));
            }
        }
        kind => {
            for path in &event.paths {
                let Some(rel) = visible(path) else {
                    continue;
                };
                let action = match kind {
                    EventKind::Create(_) => Some(VaultEvent::Create {
                        kind: kind_on_disk(path),
                        path: rel,
                    }),
                    EventKind::Remove(RemoveKind::Folder) => Some(VaultEvent::Delete {
                        kind: EntryKind::Folder,
                        path: rel,
                    }),
                    EventKind::Remove(RemoveKind::File) => Some(VaultEvent::Delete {
                        kind: EntryKind::File,
                        path: rel,
                    }),
                    EventKind::Remove(_) => Some(VaultEvent::Delete {
                        kind: kind_removed(&rel),
                        path: rel,
                    }),
                    // Half of a rename; the other half arrives separately.
                    EventKind::Modify(ModifyKind::Name(_)) => {
                        if path.exists() {
                            Some(VaultEvent::Create {
                                kind: kind_on_disk(path),
                                path: rel,
                            })
                        } else {
                            Some(VaultEvent::Delete {
                                kind: kind_removed(&rel),
                                path: rel,
                            })
                        }
                    }
                    EventKind::Modify(_) => {
                        if rel.ends_with(".md") && path.is_file() {
                            actions.push(WatchAction::NoteModified(rel));
                        }
                        None
                    }
                    _ => None,
                };
                actions.extend(action.map(WatchAction::Vault));
            }
        }
    }
    actions
}

/// Watch the vault directory and feed every change into `plugin`. The
/// returned watcher must be kept alive for events to keep flowing.
pub fn watch_vault(
    vault: Arc<FsVault>,
    plugin: Arc<FolderLinksPlugin>,
) -> notify::Result<(RecommendedWatcher, JoinHandle<()>)> {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // Receiver gone means we are shutting down.
        let _ = tx.send(res);
    })?;
    watcher.watch(vault.root(), RecursiveMode::Recursive)?;
    tracing::info!("Watching {}", vault.root().display());

    let handle = tokio::spawn(async move {
        while let Some(res) = rx.recv().await {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Watch error: {}", e);
                    continue;
                }
            };
            let folders = plugin.folders();
            for action in map_event(&vault, &event, |p| folders.contains(p)) {
                tracing::debug!(?action, "Filesystem change");
                let result = match action {
                    WatchAction::Vault(event) => plugin.on_vault_event(event),
                    WatchAction::NoteModified(file) => plugin.on_note_modified(&file),
                };
                if let Err(e) = result {
                    tracing::error!("{}", e.user_message());
                }
            }
        }
    });
    Ok((watcher, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange};
    use std::fs;
    use tempfile::TempDir;

    fn vault() -> (TempDir, FsVault) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("New")).unwrap();
        fs::create_dir_all(dir.path().join(".trash")).unwrap();
        fs::write(dir.path().join("note.md"), "[[New/]]").unwrap();
        let vault = FsVault::open(dir.path()).unwrap();
        (dir, vault)
    }

    fn no_folders(_: &str) -> bool {
        false
    }

    #[test]
    fn created_directory_is_a_folder_event() {
        let (_dir, vault) = vault();
        let event = Event::new(EventKind::Create(CreateKind::Any)).add_path(vault.root().join("New"));
        assert_eq!(
            map_event(&vault, &event, no_folders),
            vec![WatchAction::Vault(VaultEvent::create_folder("New"))]
        );
    }

    #[test]
    fn full_rename_carries_both_paths() {
        let (_dir, vault) = vault();
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(vault.root().join("Old"))
            .add_path(vault.root().join("New"));
        assert_eq!(
            map_event(&vault, &event, no_folders),
            vec![WatchAction::Vault(VaultEvent::rename_folder("Old", "New"))]
        );
    }

    #[test]
    fn moving_into_hidden_folder_is_a_delete() {
        let (_dir, vault) = vault();
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(vault.root().join("Gone"))
            .add_path(vault.root().join(".trash/Gone"));
        assert_eq!(
            map_event(&vault, &event, |p| p == "Gone"),
            vec![WatchAction::Vault(VaultEvent::delete_folder("Gone"))]
        );
    }

    #[test]
    fn removed_path_kind_comes_from_known_folders() {
        let (_dir, vault) = vault();
        let event = Event::new(EventKind::Remove(RemoveKind::Any))
            .add_path(vault.root().join("Archive"))
            .add_path(vault.root().join("old.md"));
        assert_eq!(
            map_event(&vault, &event, |p| p == "Archive"),
            vec![
                WatchAction::Vault(VaultEvent::delete_folder("Archive")),
                WatchAction::Vault(VaultEvent::Delete {
                    path: "old.md".into(),
                    kind: EntryKind::File
                }),
            ]
        );
    }

    #[test]
    fn content_change_reindexes_note() {
        let (_dir, vault) = vault();
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(vault.root().join("note.md"));
        assert_eq!(
            map_event(&vault, &event, no_folders),
            vec![WatchAction::NoteModified("note.md".into())]
        );
    }

    #[test]
    fn hidden_paths_are_ignored() {
        let (_dir, vault) = vault();
        let event = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(vault.root().join(".trash/x"));
        assert!(map_event(&vault, &event, no_folders).is_empty());
    }
}
