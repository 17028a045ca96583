use folder_links_core::host::{FolderSource, Vault};
use folder_links_core::{FolderLinksError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A vault backed by a directory on disk.
///
/// Folders are every directory below the root, notes every `*.md` file.
/// Hidden entries (`.git`, `.obsidian`, ...) and everything below them are
/// skipped.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FolderLinksError::FolderNotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a vault-relative path. Paths with root, prefix or
    /// `..` components would leave the vault and are refused.
    fn inside(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = relative.is_empty()
            || path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            tracing::warn!("Refusing path outside the vault: {}", relative);
            return Err(FolderLinksError::OutsideVault(relative.to_string()));
        }
        Ok(self.root.join(path))
    }

    /// Vault-relative path with `/` separators, or None outside the vault.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    /// True if any component of the vault-relative path is hidden.
    pub fn is_hidden(relative: &str) -> bool {
        relative.split('/').any(|part| part.starts_with('.'))
    }

    fn walk(&self) -> impl Iterator<Item = DirEntry> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
    }

    /// Every note in the vault, sorted.
    pub fn notes(&self) -> Vec<String> {
        self.walk()
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.relative(e.path()))
            .filter(|p| p.ends_with(".md"))
            .collect()
    }

    /// Move a folder on disk.
    pub fn rename_folder(&self, old: &str, new: &str) -> Result<()> {
        let from = self.inside(old)?;
        let to = self.inside(new)?;
        if !from.is_dir() {
            return Err(FolderLinksError::FolderNotFound(old.to_string()));
        }
        if to.exists() {
            return Err(FolderLinksError::FolderExists(new.to_string()));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| FolderLinksError::io(new, e))?;
        }
        fs::rename(&from, &to).map_err(|e| FolderLinksError::io(old, e))
    }
}

impl FolderSource for FsVault {
    fn list_folders(&self) -> Vec<String> {
        self.walk()
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| self.relative(e.path()))
            .collect()
    }
}

impl Vault for FsVault {
    fn create_folder(&self, path: &str) -> Result<()> {
        let dir = self.inside(path)?;
        if dir.is_dir() {
            return Err(FolderLinksError::FolderExists(path.to_string()));
        }
        fs::create_dir_all(&dir).map_err(|e| FolderLinksError::io(path, e))
    }

    fn read(&self, file: &str) -> Result<String> {
        fs::read_to_string(self.inside(file)?).map_err(|e| FolderLinksError::io(file, e))
    }

    fn write(&self, file: &str, contents: &str) -> Result<()> {
        fs::write(self.inside(file)?, contents).map_err(|e| FolderLinksError::io(file, e))
    }

    fn exists(&self, file: &str) -> bool {
        self.inside(file).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vault() -> (TempDir, FsVault) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Projects/2024")).unwrap();
        fs::create_dir_all(root.join(".obsidian/plugins")).unwrap();
        fs::write(root.join("index.md"), "[[Projects/]]").unwrap();
        fs::write(root.join("Projects/plan.md"), "").unwrap();
        fs::write(root.join("Projects/image.png"), "").unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "").unwrap();
        let vault = FsVault::open(root).unwrap();
        (dir, vault)
    }

    #[test]
    fn lists_folders_without_hidden_ones() {
        let (_dir, vault) = vault();
        assert_eq!(vault.list_folders(), vec!["Projects", "Projects/2024"]);
    }

    #[test]
    fn lists_markdown_notes() {
        let (_dir, vault) = vault();
        assert_eq!(vault.notes(), vec!["Projects/plan.md", "index.md"]);
    }

    #[test]
    fn create_folder_rejects_existing() {
        let (_dir, vault) = vault();
        vault.create_folder("Archive/2023").unwrap();
        assert!(vault.root().join("Archive/2023").is_dir());
        assert!(matches!(
            vault.create_folder("Projects"),
            Err(FolderLinksError::FolderExists(_))
        ));
    }

    #[test]
    fn read_write_roundtrip_and_missing_file() {
        let (_dir, vault) = vault();
        vault.write("new.md", "hello").unwrap();
        assert!(vault.exists("new.md"));
        assert_eq!(vault.read("new.md").unwrap(), "hello");
        assert!(matches!(vault.read("nope.md"), Err(FolderLinksError::Io { .. })));
    }

    #[test]
    fn rename_folder_moves_contents() {
        let (_dir, vault) = vault();
        vault.rename_folder("Projects", "Work/Projects").unwrap();
        assert!(vault.exists("Work/Projects/plan.md"));
        assert!(matches!(
            vault.rename_folder("Projects", "X"),
            Err(FolderLinksError::FolderNotFound(_))
        ));
    }

    #[test]
    fn relative_paths_and_hidden_detection() {
        let (_dir, vault) = vault();
        assert_eq!(
            vault.relative(&vault.root().join("Projects/plan.md")).as_deref(),
            Some("Projects/plan.md")
        );
        assert_eq!(vault.relative(vault.root()), None);
        assert!(FsVault::is_hidden(".obsidian/x.md"));
        assert!(!FsVault::is_hidden("Projects/x.md"));
    }

    #[test]
    fn paths_leaving_the_vault_are_refused() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("vault");
        fs::create_dir_all(&root).unwrap();
        let vault = FsVault::open(&root).unwrap();
        let absolute = dir.path().join("abs_escaped");

        for path in ["../escaped", absolute.to_str().unwrap(), "a/../../b"] {
            assert!(matches!(
                vault.create_folder(path),
                Err(FolderLinksError::OutsideVault(_))
            ));
            assert!(matches!(vault.write(path, "x"), Err(FolderLinksError::OutsideVault(_))));
            assert!(!vault.exists(path));
        }
        assert!(matches!(
            vault.rename_folder("../vault", "moved"),
            Err(FolderLinksError::OutsideVault(_))
        ));
        assert!(!dir.path().join("escaped").exists());
        assert!(!absolute.exists());
    }

    #[test]
    fn open_requires_directory() {
        assert!(FsVault::open("/definitely/not/here").is_err());
    }
}
