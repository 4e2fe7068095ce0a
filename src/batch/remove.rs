//! Theme removal: one named theme, or everything under the theme root.
//!
//! Folder deletion and the config update are independent steps. A folder
//! that cannot be deleted is reported and the config is still updated.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::{ConfigStep, EventSink, ItemReport, ItemState, OperationKind, OperationReport, Outcome};
use crate::config::{reconcile, ConfigStore};
use crate::error::ThemeError;
use crate::inventory::theme_folders;
use crate::paths::{validate_theme_name, Volume};

/// Deletes a theme folder. Swappable so failures can be simulated.
pub type Remover = Arc<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

/// Recursive delete on the real filesystem.
pub fn default_remover() -> Remover {
    Arc::new(|path: &Path| fs::remove_dir_all(path))
}

#[derive(Debug, Clone)]
pub struct RemoveRequest {
    pub volume: Volume,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RemoveAllRequest {
    pub volume: Volume,
}

/// Remove one theme folder and every config entry under it.
pub fn run_remove(request: &RemoveRequest, remover: &Remover, events: &EventSink) -> OperationReport {
    let name = request.name.as_str();
    let volume = &request.volume;
    let mut item = ItemReport::new(name, None);

    if let Err(e) = validate_theme_name(name) {
        events.error("Error", e.to_string());
        item.finish(ItemState::Failed, Some(e.to_string()));
        return OperationReport {
            kind: OperationKind::Remove,
            outcome: Outcome::Failed,
            items: vec![item],
            config: ConfigStep::Untouched,
        };
    }

    let theme_dir = volume.theme_dir(name);
    events.progress(format!("Deleting theme '{}'...", name), 10);

    if theme_dir.exists() {
        delete_folder(remover, &theme_dir, &mut item, events);
        if item.state == ItemState::Failed {
            events.progress("Failed to delete theme folder.", 40);
            events.warning(
                "Partial Deletion",
                format!(
                    "Could not delete theme folder '{}'. Attempting to update ventoy.json.",
                    name
                ),
            );
        }
    } else {
        let reason = format!(
            "Theme folder not found, skipping deletion: {}",
            theme_dir.display()
        );
        events.warning("Warning", &reason);
        item.finish(ItemState::Skipped, Some(reason));
    }

    events.progress("Updating config file...", 60);
    let store = ConfigStore::for_volume(volume);
    let config = match store.load_existing() {
        Ok(Some(mut config)) => {
            let summary = reconcile::merge_removal(&mut config.theme, volume, &theme_dir);
            if summary.default_reset {
                info!("Resetting default theme to Random.");
            }
            save(&store, &config, events)
        }
        Ok(None) => {
            events.info("Deletion Status", "Theme folder deleted, but ventoy.json not found.");
            ConfigStep::NotFound
        }
        Err(e) => {
            report_config_error(events, &e);
            events.info(
                "Deletion Status",
                format!(
                    "Theme folder '{}' deletion attempted, but ventoy.json could not be updated.",
                    name
                ),
            );
            ConfigStep::Failed(e.to_string())
        }
    };

    events.progress(format!("Theme '{}' deletion process finished.", name), 100);
    finish(OperationKind::Remove, vec![item], config)
}

/// Delete every theme folder, then clear all theme lists in one config write.
pub fn run_remove_all(request: &RemoveAllRequest, remover: &Remover, events: &EventSink) -> OperationReport {
    let volume = &request.volume;
    let mut items = Vec::new();
    let mut listing_failed = false;

    let folders = match theme_folders(volume) {
        Ok(folders) => folders,
        Err(e) => {
            events.error(
                "Error",
                format!("Failed to list themes for deletion: {}", ThemeError::io(volume.theme_root(), e)),
            );
            listing_failed = true;
            Vec::new()
        }
    };

    let total = folders.len();
    if total == 0 && !listing_failed {
        events.progress("No themes found in directory to delete.", 80);
    }
    for (idx, folder) in folders.iter().enumerate() {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        events.progress(format!("Deleting {}...", name), (idx + 1) * 80 / total);

        let mut item = ItemReport::new(name, Some(folder.clone()));
        delete_folder(remover, folder, &mut item, events);
        items.push(item);
    }

    let store = ConfigStore::for_volume(volume);
    let config = match store.load_existing() {
        Ok(Some(mut config)) => {
            events.progress("Updating config file...", 80);
            reconcile::clear_all(&mut config.theme);
            save(&store, &config, events)
        }
        Ok(None) => {
            if total > 0 {
                events.info("Info", "Themes deleted, but ventoy.json not found.");
            }
            ConfigStep::NotFound
        }
        Err(e) => {
            report_config_error(events, &e);
            ConfigStep::Failed(e.to_string())
        }
    };

    let mut report = finish(OperationKind::RemoveAll, items, config);
    if listing_failed {
        report.outcome = Outcome::from_parts(report.config == ConfigStep::Written, true);
    }
    if report.outcome == Outcome::Completed {
        events.progress("All themes removed and config updated.", 100);
    }
    report
}

fn delete_folder(remover: &Remover, folder: &Path, item: &mut ItemReport, events: &EventSink) {
    match remover(folder) {
        Ok(()) => {
            info!("Theme folder deleted: {}", folder.display());
            item.finish(ItemState::Removed, None);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let reason = format!(
                "Theme folder not found during deletion (already removed?): {}",
                folder.display()
            );
            events.warning("Warning", &reason);
            item.finish(ItemState::Skipped, Some(reason));
        }
        Err(e) => {
            let err = ThemeError::io(folder, e);
            let title = if err.is_permission() { "Permission Error" } else { "Error" };
            events.error(
                title,
                format!(
                    "Could not delete theme folder '{}': {}. Make sure the folder is not in use.",
                    item.name, err
                ),
            );
            item.finish(ItemState::Failed, Some(err.to_string()));
        }
    }
}

fn save(store: &ConfigStore, config: &crate::config::VentoyConfig, events: &EventSink) -> ConfigStep {
    match store.save(config) {
        Ok(()) => {
            events.progress("Config update processed.", 90);
            ConfigStep::Written
        }
        Err(e) => {
            report_config_error(events, &e);
            events.progress("Failed to update ventoy.json.", 100);
            ConfigStep::Failed(e.to_string())
        }
    }
}

fn report_config_error(events: &EventSink, e: &ThemeError) {
    let title = match e {
        ThemeError::ConfigParse { .. } => "JSON Error",
        ThemeError::Permission { .. } => "Permission Error",
        _ => "Error",
    };
    events.error(title, format!("Cannot update config: {}", e));
}

fn finish(kind: OperationKind, items: Vec<ItemReport>, config: ConfigStep) -> OperationReport {
    let work_done = items.iter().any(|i| i.state.is_done()) || config == ConfigStep::Written;
    let had_errors =
        items.iter().any(|i| i.state == ItemState::Failed) || matches!(config, ConfigStep::Failed(_));
    OperationReport {
        kind,
        outcome: Outcome::from_parts(work_done, had_errors),
        items,
        config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VentoyConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;
    use tempfile::tempdir;

    fn sink(kind: OperationKind) -> (EventSink, std::sync::mpsc::Receiver<crate::batch::ThemeEvent>) {
        let (tx, rx) = channel();
        (EventSink::new(kind, tx), rx)
    }

    fn add_theme(volume: &Volume, name: &str) {
        let dir = volume.theme_dir(name);
        fs::create_dir_all(dir.join("fonts")).unwrap();
        fs::write(dir.join("theme.txt"), "").unwrap();
        fs::write(dir.join("fonts/a.pf2"), "").unwrap();
    }

    fn write_config(volume: &Volume, json: &str) {
        fs::create_dir_all(volume.root().join("ventoy")).unwrap();
        fs::write(volume.config_path(), json).unwrap();
    }

    fn load(volume: &Volume) -> VentoyConfig {
        ConfigStore::for_volume(volume).load().unwrap()
    }

    #[test]
    fn test_remove_only_theme_resets_default() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        add_theme(&volume, "A");
        write_config(&volume, r#"{"theme":{"file":["/ventoy/theme/A/theme.txt"],"default_file":1}}"#);

        let (events, _rx) = sink(OperationKind::Remove);
        let request = RemoveRequest {
            volume: volume.clone(),
            name: "A".into(),
        };
        let report = run_remove(&request, &default_remover(), &events);

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.items[0].state, ItemState::Removed);
        assert!(!volume.theme_dir("A").exists());
        let theme = load(&volume).theme;
        assert!(theme.file.is_empty());
        assert_eq!(theme.default_file, 0);
    }

    #[test]
    fn test_remove_keeps_other_themes() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        add_theme(&volume, "A");
        add_theme(&volume, "AB");
        write_config(
            &volume,
            r#"{"theme":{"file":["/ventoy/theme/A/theme.txt","/ventoy/theme/AB/theme.txt"],
                "fonts":["/ventoy/theme/A/fonts/a.pf2","/ventoy/theme/AB/fonts/a.pf2"],"default_file":1}}"#,
        );

        let (events, _rx) = sink(OperationKind::Remove);
        let request = RemoveRequest {
            volume: volume.clone(),
            name: "A".into(),
        };
        run_remove(&request, &default_remover(), &events);

        let theme = load(&volume).theme;
        assert_eq!(theme.file, vec!["/ventoy/theme/AB/theme.txt"]);
        assert_eq!(theme.fonts, vec!["/ventoy/theme/AB/fonts/a.pf2"]);
        assert_eq!(theme.default_file, 1);
        assert!(volume.theme_dir("AB").exists());
    }

    #[test]
    fn test_remove_failure_still_updates_config() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        add_theme(&volume, "A");
        write_config(&volume, r#"{"theme":{"file":["/ventoy/theme/A/theme.txt"],"default_file":1}}"#);

        let denied: Remover =
            Arc::new(|_: &Path| Err(io::Error::new(io::ErrorKind::PermissionDenied, "in use")));
        let (events, _rx) = sink(OperationKind::Remove);
        let request = RemoveRequest {
            volume: volume.clone(),
            name: "A".into(),
        };
        let report = run_remove(&request, &denied, &events);

        assert_eq!(report.outcome, Outcome::PartialFailure);
        assert_eq!(report.items[0].state, ItemState::Failed);
        assert_eq!(report.config, ConfigStep::Written);
        assert!(volume.theme_dir("A").exists());
        assert!(load(&volume).theme.file.is_empty());
    }

    #[test]
    fn test_remove_missing_folder_and_config() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();

        let (events, _rx) = sink(OperationKind::Remove);
        let request = RemoveRequest {
            volume: volume.clone(),
            name: "Ghost".into(),
        };
        let report = run_remove(&request, &default_remover(), &events);

        assert_eq!(report.items[0].state, ItemState::Skipped);
        assert_eq!(report.config, ConfigStep::NotFound);
        assert_eq!(report.outcome, Outcome::Completed);
        assert!(!volume.config_path().exists());
    }

    #[test]
    fn test_remove_rejects_path_names() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        let (events, _rx) = sink(OperationKind::Remove);
        let request = RemoveRequest {
            volume,
            name: "../..".into(),
        };
        let report = run_remove(&request, &default_remover(), &events);
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.config, ConfigStep::Untouched);
    }

    #[test]
    fn test_remove_all_with_one_failure() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        for name in ["A", "B", "C"] {
            add_theme(&volume, name);
        }
        write_config(
            &volume,
            r#"{"control":[{"VTOY_MENU_TIMEOUT":"5"}],
                "theme":{"file":["/ventoy/theme/A/theme.txt","/ventoy/theme/B/theme.txt","/ventoy/theme/C/theme.txt"],
                "fonts":["/ventoy/theme/A/fonts/a.pf2"],"images":["/ventoy/theme/C/bg.png"],"default_file":2}}"#,
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let remover: Remover = Arc::new(move |path: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("B") {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                fs::remove_dir_all(path)
            }
        });

        let (events, _rx) = sink(OperationKind::RemoveAll);
        let report = run_remove_all(&RemoveAllRequest { volume: volume.clone() }, &remover, &events);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.outcome, Outcome::PartialFailure);
        assert_eq!(report.count(ItemState::Removed), 2);
        assert_eq!(report.item("B").unwrap().state, ItemState::Failed);
        assert!(!volume.theme_dir("A").exists());
        assert!(volume.theme_dir("B").exists());
        assert!(!volume.theme_dir("C").exists());

        let config = load(&volume);
        assert!(config.theme.file.is_empty());
        assert!(config.theme.fonts.is_empty());
        assert!(config.theme.images.is_empty());
        assert_eq!(config.theme.default_file, 0);
        assert!(config.other.contains_key("control"));
    }

    #[test]
    fn test_remove_all_on_empty_volume() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        let (events, _rx) = sink(OperationKind::RemoveAll);
        let report = run_remove_all(&RemoveAllRequest { volume }, &default_remover(), &events);
        assert!(report.items.is_empty());
        assert_eq!(report.config, ConfigStep::NotFound);
        assert_eq!(report.outcome, Outcome::Completed);
    }
}
