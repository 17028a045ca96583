//! In-memory host doubles shared by the crate's tests.

use crate::error::{FolderLinksError, Result};
use crate::host::{
    FileExplorer, FolderSource, Notifier, RenameChoice, RenamePrompt, RenamePromptRequest,
    SettingsStore, Vault,
};
use crate::settings::PluginSettings;
use crate::snapshot::FolderEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// In-memory vault used across the crate's tests.
#[derive(Default)]
pub struct MemoryVault {
    pub folders: Mutex<BTreeSet<String>>,
    pub files: Mutex<BTreeMap<String, String>>,
    pub fail_writes: Mutex<bool>,
}

impl MemoryVault {
    pub fn with_folders(folders: &[&str]) -> Self {
        let vault = Self::default();
        vault
            .folders
            .lock()
            .unwrap()
            .extend(folders.iter().map(|f| f.to_string()));
        vault
    }

    pub fn add_file(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), contents.to_string());
    }

    pub fn file(&self, path: &str) -> String {
        self.files.lock().unwrap().get(path).cloned().unwrap_or_default()
    }
}

impl FolderSource for MemoryVault {
    fn list_folders(&self) -> Vec<String> {
        self.folders.lock().unwrap().iter().cloned().collect()
    }
}

impl Vault for MemoryVault {
    fn create_folder(&self, path: &str) -> Result<()> {
        if !self.folders.lock().unwrap().insert(path.to_string()) {
            return Err(FolderLinksError::FolderExists(path.to_string()));
        }
        Ok(())
    }

    fn read(&self, file: &str) -> Result<String> {
        self.files.lock().unwrap().get(file).cloned().ok_or_else(|| {
            FolderLinksError::io(
                file,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn write(&self, file: &str, contents: &str) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(FolderLinksError::io(
                file,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ));
        }
        self.add_file(file, contents);
        Ok(())
    }

    fn exists(&self, file: &str) -> bool {
        self.files.lock().unwrap().contains_key(file)
    }
}

#[derive(Default)]
pub struct RecordingExplorer {
    pub revealed: Mutex<Vec<String>>,
}

impl FileExplorer for RecordingExplorer {
    fn reveal_in_folder(&self, folder: &FolderEntry) {
        self.revealed.lock().unwrap().push(folder.path.clone());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

/// Answers every prompt with the same choice and keeps the requests.
pub struct ScriptedPrompt {
    pub choice: RenameChoice,
    pub asked: Mutex<Vec<RenamePromptRequest>>,
}

impl ScriptedPrompt {
    pub fn answering(choice: RenameChoice) -> Self {
        Self {
            choice,
            asked: Mutex::new(Vec::new()),
        }
    }
}

impl RenamePrompt for ScriptedPrompt {
    fn ask(&self, request: &RenamePromptRequest) -> RenameChoice {
        self.asked.lock().unwrap().push(request.clone());
        self.choice
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    pub saved: Mutex<Vec<PluginSettings>>,
}

impl SettingsStore for MemorySettingsStore {
    fn save(&self, settings: &PluginSettings) -> Result<()> {
        self.saved.lock().unwrap().push(*settings);
        Ok(())
    }
}
