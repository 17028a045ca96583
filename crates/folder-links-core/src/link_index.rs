use crate::events::FolderRename;
use crate::link_parser::{count_folder_links, most_specific_rename};
use crate::path::{folder_link_from_path, folder_path_from_link, is_within, reparent};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};

/// Folder links per note: file path -> (link key -> count).
///
/// Folder links never resolve to a note, so this is the part of the host's
/// "unresolved links" cache the engine cares about. Keys are canonical
/// (`"Projects/"`).
#[derive(Default)]
pub struct LinkIndex {
    links: DashMap<String, HashMap<String, usize>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-index one note. Notes without folder links are dropped from the index.
    pub fn index_document(&self, file: &str, markdown: &str) {
        let counts = count_folder_links(markdown);
        if counts.is_empty() {
            self.links.remove(file);
        } else {
            tracing::debug!("Indexed {}: {} folder link target(s)", file, counts.len());
            self.links.insert(file.to_string(), counts);
        }
    }

    pub fn remove_document(&self, file: &str) {
        self.links.remove(file);
    }

    /// Move a note's entry to its new path.
    pub fn rename_document(&self, old_file: &str, new_file: &str) {
        if let Some((_, counts)) = self.links.remove(old_file) {
            self.links.insert(new_file.to_string(), counts);
        }
    }

    /// Move every note stored under a renamed folder to its new place. Each
    /// note follows the rename with the longest `old_path` containing it.
    /// Returns the number of notes moved.
    pub fn rehome_documents(&self, renames: &[FolderRename]) -> usize {
        let moved: Vec<(String, String)> = self
            .links
            .iter()
            .filter_map(|entry| {
                let rename = most_specific_rename(entry.key(), renames)?;
                let to = reparent(entry.key(), &rename.old_path, &rename.new_path)?;
                Some((entry.key().clone(), to))
            })
            .collect();
        for (from, to) in &moved {
            self.rename_document(from, to);
        }
        moved.len()
    }

    pub fn clear(&self) {
        self.links.clear();
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Files that link to `folder_path` or to a folder nested inside it, sorted.
    pub fn linked_files(&self, folder_path: &str) -> Vec<String> {
        let mut files: Vec<String> = self
            .links
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .keys()
                    .any(|key| is_within(&folder_path_from_link(key), folder_path))
            })
            .map(|entry| entry.key().clone())
            .collect();
        files.sort();
        files
    }

    /// Number of links in `file` that point at `folder_path` or inside it.
    pub fn link_count(&self, file: &str, folder_path: &str) -> usize {
        self.links
            .get(file)
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(key, _)| is_within(&folder_path_from_link(key), folder_path))
                    .map(|(_, n)| *n)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Number of links in `file` that point exactly at `folder_path`.
    pub fn exact_link_count(&self, file: &str, folder_path: &str) -> usize {
        let key = folder_link_from_path(folder_path);
        self.links
            .get(file)
            .and_then(|counts| counts.get(&key).copied())
            .unwrap_or(0)
    }

    pub fn link_count_in_files(&self, files: &[String], folder_path: &str) -> usize {
        files
            .iter()
            .map(|file| self.link_count(file, folder_path))
            .sum()
    }

    /// Number of distinct folder link targets in `file`.
    pub fn folder_links_in(&self, file: &str) -> usize {
        self.links.get(file).map(|counts| counts.len()).unwrap_or(0)
    }

    /// Every folder link key used anywhere in the vault, sorted.
    pub fn all_folder_links(&self) -> BTreeSet<String> {
        self.links
            .iter()
            .flat_map(|entry| entry.value().keys().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// `(file, link key, count)` triples, sorted by file then key.
    pub fn entries(&self) -> Vec<(String, String, usize)> {
        let mut out: Vec<(String, String, usize)> = self
            .links
            .iter()
            .flat_map(|entry| {
                let file = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|(k, n)| (file.clone(), k.clone(), *n))
                    .collect::<Vec<_>>()
            })
            .collect();
        out.sort();
        out
    }
}
