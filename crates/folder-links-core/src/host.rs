//! Contracts with the host application.
//!
//! The engine never touches the host's document model, DOM, dialogs or
//! settings storage directly; it goes through these traits instead.

use crate::error::Result;
use crate::settings::PluginSettings;
use crate::snapshot::FolderEntry;

/// Lists every folder in the vault.
pub trait FolderSource: Send + Sync {
    /// All folder paths, vault-relative. Order and duplicates don't matter.
    fn list_folders(&self) -> Vec<String>;
}

/// Read/write access to vault contents.
pub trait Vault: FolderSource {
    fn create_folder(&self, path: &str) -> Result<()>;
    fn read(&self, file: &str) -> Result<String>;
    fn write(&self, file: &str, contents: &str) -> Result<()>;
    fn exists(&self, file: &str) -> bool;
}

/// The host's file browser.
pub trait FileExplorer: Send + Sync {
    fn reveal_in_folder(&self, folder: &FolderEntry);
}

/// Localized string lookup with `{{name}}` placeholders.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str, placeholders: &[(&str, String)]) -> String;
}

/// Transient user-visible message.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

/// Answer to the "update links after folder rename?" question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameChoice {
    AlwaysUpdate,
    JustOnce,
    DoNotUpdate,
}

/// Everything a dialog needs to ask about a rename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamePromptRequest {
    pub title: String,
    pub body: Vec<String>,
    pub old_path: String,
    pub new_path: String,
    pub links: usize,
    pub files: usize,
}

pub trait RenamePrompt: Send + Sync {
    fn ask(&self, request: &RenamePromptRequest) -> RenameChoice;
}

/// Persists the plugin's settings.
pub trait SettingsStore: Send + Sync {
    fn save(&self, settings: &PluginSettings) -> Result<()>;
}
