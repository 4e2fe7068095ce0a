//! Read-only view of what a volume currently has installed.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

use crate::config::reconcile::entry_name;
use crate::config::{is_known_gfxmode, ConfigStore, DEFAULT_GFXMODE};
use crate::error::Result;
use crate::paths::Volume;

/// A `file` entry of `ventoy.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredTheme {
    pub name: String,
    pub entry: String,
    pub is_default: bool,
    /// Whether the referenced path exists on the volume.
    pub present: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub config_exists: bool,
    pub configured: Vec<ConfiguredTheme>,
    /// Theme folder names under `ventoy/theme`, sorted.
    pub folders: Vec<String>,
    /// Name of the default theme; `None` means random.
    pub default_theme: Option<String>,
    pub gfxmode: String,
    pub warnings: Vec<String>,
}

impl Inventory {
    /// Folders on disk that `ventoy.json` does not reference.
    pub fn unregistered_folders(&self) -> Vec<&str> {
        self.folders
            .iter()
            .filter(|f| !self.configured.iter().any(|c| c.name.eq_ignore_ascii_case(f)))
            .map(String::as_str)
            .collect()
    }
}

/// Read `ventoy.json` and the theme root of `volume`.
///
/// An unreadable config is an error; odd values inside it are reported as
/// warnings and shown with their effective meaning.
pub fn scan(volume: &Volume) -> Result<Inventory> {
    let store = ConfigStore::for_volume(volume);
    let mut inventory = Inventory {
        gfxmode: DEFAULT_GFXMODE.to_string(),
        ..Inventory::default()
    };

    if let Some(config) = store.load_existing()? {
        inventory.config_exists = true;
        let theme = &config.theme;

        let default_entry = theme.default_entry();
        if theme.default_file != 0 && default_entry.is_none() {
            push_warning(
                &mut inventory,
                format!(
                    "Invalid default_file index ({}) in ventoy.json; boot will pick a random theme",
                    theme.default_file
                ),
            );
        }

        for (i, entry) in theme.file.iter().enumerate() {
            let Some(name) = entry_name(entry) else {
                continue;
            };
            let is_default = theme.default_file == i as i64 + 1;
            if is_default {
                inventory.default_theme = Some(name.clone());
            }
            inventory.configured.push(ConfiguredTheme {
                present: volume.to_absolute(entry).exists(),
                name,
                entry: entry.clone(),
                is_default,
            });
        }

        if is_known_gfxmode(&theme.gfxmode) {
            inventory.gfxmode = theme.gfxmode.clone();
        } else {
            push_warning(
                &mut inventory,
                format!("Invalid 'gfxmode' value '{}' in ventoy.json; treating as max", theme.gfxmode),
            );
        }
    }

    match theme_folders(volume) {
        Ok(folders) => {
            inventory.folders = folders
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
        }
        Err(e) => push_warning(
            &mut inventory,
            format!("Error listing theme directory {}: {}", volume.theme_root().display(), e),
        ),
    }

    Ok(inventory)
}

fn push_warning(inventory: &mut Inventory, message: String) {
    warn!("{}", message);
    inventory.warnings.push(message);
}

/// Direct subdirectories of the theme root, sorted. Empty when the root is absent.
pub fn theme_folders(volume: &Volume) -> io::Result<Vec<PathBuf>> {
    let root = volume.theme_root();
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut folders = Vec::new();
    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThemeError;
    use tempfile::tempdir;

    fn volume_with(json: Option<&str>, folders: &[&str]) -> (tempfile::TempDir, Volume) {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        for f in folders {
            fs::create_dir_all(volume.theme_dir(f)).unwrap();
            fs::write(volume.theme_dir(f).join("theme.txt"), "").unwrap();
        }
        if let Some(json) = json {
            fs::create_dir_all(dir.path().join("ventoy")).unwrap();
            fs::write(volume.config_path(), json).unwrap();
        }
        (dir, volume)
    }

    #[test]
    fn test_scan_lists_configured_and_folders() {
        let (_dir, volume) = volume_with(
            Some(
                r#"{"theme": {"file": ["/ventoy/theme/A/theme.txt", "/ventoy/theme/Gone/theme.txt"],
                   "default_file": 1, "gfxmode": "1920x1080"}}"#,
            ),
            &["A", "Extra"],
        );

        let inv = scan(&volume).unwrap();
        assert!(inv.config_exists);
        assert_eq!(inv.default_theme.as_deref(), Some("A"));
        assert_eq!(inv.gfxmode, "1920x1080");
        assert_eq!(inv.folders, vec!["A", "Extra"]);
        assert!(inv.configured[0].present);
        assert!(!inv.configured[1].present);
        assert_eq!(inv.unregistered_folders(), vec!["Extra"]);
        assert!(inv.warnings.is_empty());
    }

    #[test]
    fn test_scan_without_config() {
        let (_dir, volume) = volume_with(None, &[]);
        let inv = scan(&volume).unwrap();
        assert!(!inv.config_exists);
        assert!(inv.configured.is_empty());
        assert!(inv.folders.is_empty());
        assert_eq!(inv.default_theme, None);
        assert_eq!(inv.gfxmode, "max");
    }

    #[test]
    fn test_scan_warns_on_bad_values() {
        let (_dir, volume) = volume_with(
            Some(r#"{"theme": {"file": ["/ventoy/theme/A/theme.txt"], "default_file": 5, "gfxmode": "huge"}}"#),
            &["A"],
        );
        let inv = scan(&volume).unwrap();
        assert_eq!(inv.default_theme, None);
        assert_eq!(inv.gfxmode, "max");
        assert_eq!(inv.warnings.len(), 2);
    }

    #[test]
    fn test_scan_corrupt_config_is_error() {
        let (_dir, volume) = volume_with(Some("not json"), &[]);
        assert!(matches!(scan(&volume), Err(ThemeError::ConfigParse { .. })));
    }
}
