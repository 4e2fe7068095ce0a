//! User preferences for ventoy-themer
//!
//! Stores user preferences in ~/.config/ventoy-themer/settings.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// User settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// Volume used when `--volume` is not given
    #[serde(default)]
    pub default_volume: String,

    /// Resolution used by `settings` when `--resolution` is not given
    #[serde(default)]
    pub default_resolution: String,

    /// Answer yes to overwrite/delete prompts
    #[serde(default)]
    pub assume_yes: bool,
}

impl Settings {
    /// Get the config directory path (~/.config/ventoy-themer)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ventoy-themer");

        Ok(config_dir)
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|p| Self::load_from(&p)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// The default volume, if one is configured
    pub fn volume(&self) -> Option<PathBuf> {
        let v = self.default_volume.trim();
        (!v.is_empty()).then(|| PathBuf::from(v))
    }

    /// The default resolution, if one is configured
    pub fn resolution(&self) -> Option<&str> {
        let r = self.default_resolution.trim();
        (!r.is_empty()).then_some(r)
    }
}
