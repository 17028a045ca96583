use crate::error::Result;
use crate::host::SettingsStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// The two persisted toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Show folder links in the outgoing links panel.
    pub show_in_outgoing_links: bool,
    /// Rewrite links after a folder rename without asking.
    pub always_update: bool,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            show_in_outgoing_links: true,
            always_update: false,
        }
    }
}

/// Shared settings handle. Writes go through the store.
pub struct SettingsService {
    settings: RwLock<PluginSettings>,
    store: Arc<dyn SettingsStore>,
}

impl SettingsService {
    pub fn new(settings: PluginSettings, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings: RwLock::new(settings),
            store,
        }
    }

    pub fn get(&self) -> PluginSettings {
        *self.settings.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_always_update(&self, value: bool) -> Result<()> {
        self.update(|s| s.always_update = value)
    }

    pub fn set_show_in_outgoing_links(&self, value: bool) -> Result<()> {
        self.update(|s| s.show_in_outgoing_links = value)
    }

    fn update(&self, f: impl FnOnce(&mut PluginSettings)) -> Result<()> {
        let snapshot = {
            let mut guard = self.settings.write().unwrap_or_else(|e| e.into_inner());
            f(&mut guard);
            *guard
        };
        tracing::debug!(?snapshot, "Saving settings");
        self.store.save(&snapshot)
    }
}
