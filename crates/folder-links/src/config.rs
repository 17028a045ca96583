use anyhow::{Context, Result};
use folder_links_core::host::SettingsStore;
use folder_links_core::settings::PluginSettings;
use folder_links_core::FolderLinksError;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".folder-links.toml";

pub fn config_path(vault: &Path) -> PathBuf {
    vault.join(CONFIG_FILE)
}

/// Load settings from the vault. A missing file means defaults.
pub fn load_settings(vault: &Path) -> Result<PluginSettings> {
    let path = config_path(vault);
    if !path.exists() {
        tracing::debug!("No {} found, using default settings", CONFIG_FILE);
        return Ok(PluginSettings::default());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let settings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!(?settings, "Loaded settings from {}", path.display());
    Ok(settings)
}

/// Writes settings back to `<vault>/.folder-links.toml`.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(vault: &Path) -> Self {
        Self {
            path: config_path(vault),
        }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn save(&self, settings: &PluginSettings) -> folder_links_core::Result<()> {
        let content =
            toml::to_string_pretty(settings).map_err(|e| FolderLinksError::Settings(e.to_string()))?;
        fs::write(&self.path, content)
            .map_err(|e| FolderLinksError::io(self.path.display().to_string(), e))?;
        tracing::info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_settings(dir.path()).unwrap(), PluginSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = TempDir::new().unwrap();
        let settings = PluginSettings {
            show_in_outgoing_links: false,
            always_update: true,
        };
        TomlSettingsStore::new(dir.path()).save(&settings).unwrap();
        assert_eq!(load_settings(dir.path()).unwrap(), settings);
    }

    #[test]
    fn partial_file_falls_back_per_key() {
        let dir = TempDir::new().unwrap();
        fs::write(config_path(dir.path()), "always_update = true\n").unwrap();
        let settings = load_settings(dir.path()).unwrap();
        assert!(settings.always_update);
        assert!(settings.show_in_outgoing_links);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(config_path(dir.path()), "always_update = maybe").unwrap();
        let err = load_settings(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
