//! Install batch: normalize each source onto the volume, scan it, then fold
//! everything discovered into `ventoy.json` in a single write.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{ConfigStep, EventSink, ItemReport, ItemState, OperationKind, OperationReport, Outcome};
use crate::archive::{self, DecoderRegistry, SourceKind};
use crate::config::{reconcile, ConfigStore};
use crate::discover::{find_descriptor, find_fonts};
use crate::error::{Result, ThemeError};
use crate::paths::{validate_theme_name, Volume};
use crate::sources::ThemeSource;

/// Prefix of the transient folder a theme is normalized into before it
/// replaces anything under `ventoy/theme/`.
const STAGING_PREFIX: &str = ".staging-";
const STAGED_DIR: &str = "incoming";
const PARKED_DIR: &str = "previous";

/// What to do when a theme folder with the same name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Send a confirmation request and wait for the answer.
    #[default]
    Ask,
    Always,
    Never,
}

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub volume: Volume,
    pub sources: Vec<ThemeSource>,
    pub overwrite: OverwritePolicy,
}

impl InstallRequest {
    pub fn new(volume: Volume, sources: Vec<ThemeSource>) -> Self {
        Self {
            volume,
            sources,
            overwrite: OverwritePolicy::Ask,
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Volume-relative paths found in one installed theme.
#[derive(Debug, Default)]
struct Discovered {
    descriptors: BTreeSet<String>,
    fonts: BTreeSet<String>,
}

enum ItemResult {
    Installed { found: Discovered, replaced: Option<PathBuf> },
    Skipped(String),
}

struct Installer<'a> {
    request: &'a InstallRequest,
    registry: &'a DecoderRegistry,
    events: &'a EventSink,
}

/// Run an install batch to completion.
pub fn run(request: &InstallRequest, registry: &DecoderRegistry, events: &EventSink) -> OperationReport {
    let installer = Installer {
        request,
        registry,
        events,
    };
    installer.run()
}

impl Installer<'_> {
    fn run(&self) -> OperationReport {
        let sources = &self.request.sources;
        let total = sources.len().max(1);
        if sources.is_empty() {
            self.events.warning("Nothing to install", "No theme items to process.");
        }

        let mut items = Vec::with_capacity(sources.len());
        // Keyed by theme name: a later item with the same name replaces the
        // earlier one's folder, and so its discoveries.
        let mut discovered: BTreeMap<String, Discovered> = BTreeMap::new();
        let mut replaced_dirs = Vec::new();

        for (i, source) in sources.iter().enumerate() {
            let name = source
                .theme_name()
                .unwrap_or_else(|| source.path().display().to_string());
            let mut item = ItemReport::new(&name, Some(source.path().to_path_buf()));
            let percent = i * 100 / total;

            match self.install_one(source, &name, percent, &mut item) {
                Ok(ItemResult::Installed { found, replaced }) => {
                    replaced_dirs.extend(replaced);
                    discovered.insert(name.clone(), found);
                    item.finish(ItemState::Merged, None);
                    self.events
                        .progress(format!("Processed {}", name), (i + 1) * 100 / total);
                }
                Ok(ItemResult::Skipped(reason)) => {
                    item.finish(ItemState::Skipped, Some(reason));
                    self.events
                        .progress(format!("Skipped {}", name), (i + 1) * 100 / total);
                }
                Err(e) => {
                    let message = format!("Error processing theme '{}': {}", name, e);
                    self.events.error("Processing Error", &message);
                    item.finish(ItemState::Failed, Some(e.to_string()));
                    self.events
                        .progress(format!("Error processing {}", name), (i + 1) * 100 / total);
                }
            }
            items.push(item);
        }

        self.events.progress("Updating ventoy.json...", 100);
        let config = match self.update_config(&discovered, &replaced_dirs) {
            Ok(()) => ConfigStep::Written,
            Err(e) => {
                self.events
                    .error("JSON Write Error", format!("Failed to update ventoy.json: {}", e));
                ConfigStep::Failed(e.to_string())
            }
        };

        let work_done = items.iter().any(|i| i.state.is_done());
        let had_errors =
            items.iter().any(|i| i.state == ItemState::Failed) || matches!(config, ConfigStep::Failed(_));
        let outcome = Outcome::from_parts(work_done, had_errors);
        if outcome == Outcome::Completed {
            self.events
                .progress("Themes applied and config updated successfully!", 100);
        }

        OperationReport {
            kind: OperationKind::Install,
            outcome,
            items,
            config,
        }
    }

    fn install_one(
        &self,
        source: &ThemeSource,
        name: &str,
        percent: usize,
        item: &mut ItemReport,
    ) -> Result<ItemResult> {
        let volume = &self.request.volume;
        if !source.path().exists() {
            let reason = format!("Theme source not found: {}. Skipping.", source.display_name());
            self.events.warning("Source Not Found", &reason);
            return Ok(ItemResult::Skipped(reason));
        }
        validate_theme_name(name)?;

        // Refuse unknown formats before anything on the volume is touched.
        let kind = archive::classify(self.registry, source.path())?;
        let theme_dir = volume.theme_dir(name);

        let replacing = theme_dir.exists();
        if replacing {
            item.state = ItemState::Confirming;
            self.events
                .progress(format!("Confirming overwrite for {}...", name), percent);
            if !self.confirm_overwrite(name) {
                return Ok(ItemResult::Skipped(format!("Skipped existing theme: {}", name)));
            }
        }

        match kind {
            SourceKind::Directory => {
                item.state = ItemState::Copying;
                self.events
                    .progress(format!("Copying theme folder {}...", name), percent);
            }
            SourceKind::Archive(_) => {
                item.state = ItemState::Extracting;
                self.events.progress(format!("Extracting {}...", name), percent);
            }
        }

        // A failed extraction or copy only ever loses the staging folder.
        let staging = self.stage(source, name)?;
        let staged = staging.path().join(STAGED_DIR);
        let replaced = if replacing {
            swap_into_place(staging.path(), &staged, &theme_dir)?;
            info!("Theme folder replaced: {}", theme_dir.display());
            Some(theme_dir.clone())
        } else {
            fs::rename(&staged, &theme_dir).map_err(|e| ThemeError::io(&theme_dir, e))?;
            None
        };
        drop(staging);

        item.state = ItemState::Scanning;
        let found = self.scan(name, &theme_dir);
        Ok(ItemResult::Installed { found, replaced })
    }

    /// Normalize `source` into a fresh staging folder next to the theme folders.
    fn stage(&self, source: &ThemeSource, name: &str) -> Result<TempDir> {
        let theme_root = self.request.volume.theme_root();
        fs::create_dir_all(&theme_root).map_err(|e| ThemeError::io(&theme_root, e))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&theme_root)
            .map_err(|e| ThemeError::io(&theme_root, e))?;
        debug!("Staging {} in {}", name, staging.path().display());
        archive::normalize(self.registry, source.path(), &staging.path().join(STAGED_DIR))?;
        Ok(staging)
    }

    fn confirm_overwrite(&self, name: &str) -> bool {
        match self.request.overwrite {
            OverwritePolicy::Always => true,
            OverwritePolicy::Never => false,
            OverwritePolicy::Ask => self.events.confirm(
                name,
                "Confirm Overwrite",
                format!("Theme '{}' already exists on this volume. Overwrite it?", name),
            ),
        }
    }

    fn scan(&self, name: &str, theme_dir: &Path) -> Discovered {
        let volume = &self.request.volume;
        let mut found = Discovered::default();

        match find_descriptor(theme_dir) {
            Some(descriptor) => match volume.to_volume_relative(&descriptor) {
                Some(rel) => {
                    debug!("Descriptor for {}: {}", name, rel);
                    found.descriptors.insert(rel);
                }
                None => warn!("Descriptor outside the volume: {}", descriptor.display()),
            },
            None => {
                self.events.warning(
                    "Warning",
                    format!(
                        "theme.txt not found in processed theme '{}'. This theme might not work correctly.",
                        name
                    ),
                );
                if let Some(rel) = volume.to_volume_relative(theme_dir) {
                    found.descriptors.insert(rel);
                }
            }
        }

        found.fonts = find_fonts(theme_dir, volume);
        found
    }

    fn update_config(&self, discovered: &BTreeMap<String, Discovered>, replaced_dirs: &[PathBuf]) -> Result<()> {
        let volume = &self.request.volume;
        let store = ConfigStore::for_volume(volume);
        let mut config = store.load()?;

        for dir in replaced_dirs {
            let pruned = reconcile::prune_missing(&mut config.theme, volume, dir);
            if pruned > 0 {
                debug!("Pruned {} stale entries under {}", pruned, dir.display());
            }
        }

        let exists = |p: &&String| volume.to_absolute(p).exists();
        let descriptors = discovered
            .values()
            .flat_map(|d| d.descriptors.iter())
            .filter(exists)
            .cloned();
        let fonts = discovered
            .values()
            .flat_map(|d| d.fonts.iter())
            .filter(exists)
            .cloned();
        reconcile::merge_install(&mut config.theme, descriptors, fonts);

        store.save(&config)
    }
}

/// Swap a staged theme folder in for the existing one.
///
/// The old folder is parked inside `staging` first so it is deleted along
/// with the staging folder, or moved back if the swap fails.
fn swap_into_place(staging: &Path, staged: &Path, theme_dir: &Path) -> Result<()> {
    let parked = staging.join(PARKED_DIR);
    fs::rename(theme_dir, &parked).map_err(|e| ThemeError::io(theme_dir, e))?;
    if let Err(e) = fs::rename(staged, theme_dir) {
        if let Err(restore) = fs::rename(&parked, theme_dir) {
            warn!("Failed to restore {}: {}", theme_dir.display(), restore);
        }
        return Err(ThemeError::io(theme_dir, e));
    }
    Ok(())
}
