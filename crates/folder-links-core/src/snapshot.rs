use crate::path::basename;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A folder that exists in the vault.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FolderEntry {
    /// Vault-relative path without leading or trailing separator, e.g. "Projects/2024"
    pub path: String,
    /// Last path component, e.g. "2024"
    pub name: String,
}

impl FolderEntry {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = basename(&path).to_string();
        Self { path, name }
    }
}

/// Immutable view of every folder in the vault at one point in time.
///
/// Consumers hold it as `Arc<FolderSnapshot>`. A newer snapshot always has a
/// larger `generation`, which lets a consumer drop deliveries that arrive out
/// of order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderSnapshot {
    generation: u64,
    /// Keyed by path: sorted and de-duplicated.
    folders: BTreeMap<String, FolderEntry>,
}

impl FolderSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            folders: BTreeMap::new(),
        }
    }

    /// Build a snapshot from raw folder paths. Leading/trailing separators are
    /// stripped, duplicates collapse, and the vault root (empty path) is skipped.
    pub fn from_paths<I, S>(generation: u64, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let folders = paths
            .into_iter()
            .filter_map(|p| {
                let path = p.as_ref().trim_matches('/');
                if path.is_empty() {
                    None
                } else {
                    Some((path.to_string(), FolderEntry::new(path)))
                }
            })
            .collect();
        Self {
            generation,
            folders,
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains(&self, path: &str) -> bool {
        !path.is_empty() && self.folders.contains_key(path)
    }

    pub fn find(&self, path: &str) -> Option<&FolderEntry> {
        self.folders.get(path)
    }

    /// All folder paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FolderEntry> {
        self.folders.values()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Equality that ignores the generation.
    pub fn same_folders(&self, other: &FolderSnapshot) -> bool {
        self.folders.len() == other.folders.len()
            && self.folders.keys().eq(other.folders.keys())
    }
}

impl Default for FolderSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_and_sorts() {
        let snap = FolderSnapshot::from_paths(1, ["b", "a", "b", "a/c"]);
        assert_eq!(snap.paths().collect::<Vec<_>>(), vec!["a", "a/c", "b"]);
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn skips_vault_root() {
        let snap = FolderSnapshot::from_paths(1, ["/", "", "Notes"]);
        assert_eq!(snap.len(), 1);
        assert!(!snap.contains(""));
    }

    #[test]
    fn normalizes_separators() {
        let snap = FolderSnapshot::from_paths(1, ["/Notes/"]);
        assert!(snap.contains("Notes"));
    }

    #[test]
    fn find_returns_entry_with_name() {
        let snap = FolderSnapshot::from_paths(1, ["Projects/2024"]);
        let entry = snap.find("Projects/2024").expect("should find folder");
        assert_eq!(entry.name, "2024");
        assert!(snap.find("Projects").is_none());
    }

    #[test]
    fn same_folders_ignores_generation() {
        let a = FolderSnapshot::from_paths(1, ["x", "y"]);
        let b = FolderSnapshot::from_paths(7, ["y", "x"]);
        let c = FolderSnapshot::from_paths(7, ["y"]);
        assert!(a.same_folders(&b));
        assert!(!a.same_folders(&c));
        assert_ne!(a, b, "full equality still compares generation");
    }
}
