//! Pure edits of the `theme` object.
//!
//! Every operation that can shrink `file` ends by re-checking
//! `default_file`, so the index always points into `file` or is 0.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use super::{is_known_gfxmode, ThemeConfig, DEFAULT_GFXMODE};
use crate::discover::DESCRIPTOR_NAME;
use crate::paths::{to_forward_slashes, Volume};

/// Label used for the random-default choice.
pub const RANDOM_THEME: &str = "Random Theme";

/// Which theme to boot by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultTheme {
    Random,
    Named(String),
}

impl DefaultTheme {
    /// Interpret a user selection. Empty, `random` and [`RANDOM_THEME`]
    /// mean random.
    pub fn from_selection(selection: Option<&str>) -> Self {
        match selection.map(str::trim) {
            None | Some("") => DefaultTheme::Random,
            Some(s) if s.eq_ignore_ascii_case("random") || s.eq_ignore_ascii_case(RANDOM_THEME) => {
                DefaultTheme::Random
            }
            Some(s) => DefaultTheme::Named(s.to_string()),
        }
    }
}

/// Result of [`resolve_default_theme`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultResolution {
    Random,
    Selected { index: usize },
    /// The name matched nothing; `default_file` was reset to random.
    NotFound { name: String },
}

/// Result of [`apply_resolution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Applied,
    /// Unknown request; the current valid value was kept.
    KeptCurrent(String),
    /// Unknown request and no valid current value; set to `max`.
    ResetToMax,
}

/// What [`merge_removal`] dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub files: usize,
    pub fonts: usize,
    pub images: usize,
    pub default_reset: bool,
}

impl RemovalSummary {
    pub fn total(&self) -> usize {
        self.files + self.fonts + self.images
    }
}

/// Union newly discovered descriptors and fonts into the config.
///
/// Lists keep set semantics and are stored sorted. Re-sorting can move the
/// selected entry, so `default_file` follows it to its new position.
pub fn merge_install<D, F>(theme: &mut ThemeConfig, descriptors: D, fonts: F)
where
    D: IntoIterator<Item = String>,
    F: IntoIterator<Item = String>,
{
    let selected = theme.default_entry().map(str::to_string);
    theme.file = sorted_union(&theme.file, descriptors);
    theme.fonts = sorted_union(&theme.fonts, fonts);

    if let Some(selected) = selected {
        if let Some(index) = theme.file.iter().position(|p| *p == selected) {
            theme.default_file = index as i64 + 1;
        }
    }
    repair_default_index(theme);
}

fn sorted_union<I: IntoIterator<Item = String>>(existing: &[String], new: I) -> Vec<String> {
    let mut set: BTreeSet<String> = existing.iter().cloned().collect();
    set.extend(new);
    set.into_iter().collect()
}

/// Drop every `file`/`fonts`/`images` entry under `removed_dir`.
pub fn merge_removal(theme: &mut ThemeConfig, volume: &Volume, removed_dir: &Path) -> RemovalSummary {
    let mut summary = RemovalSummary::default();
    let keep = |p: &String| !volume.is_under(p, removed_dir);

    let before = theme.file.len();
    theme.file.retain(keep);
    summary.files = before - theme.file.len();

    let before = theme.fonts.len();
    theme.fonts.retain(keep);
    summary.fonts = before - theme.fonts.len();

    let before = theme.images.len();
    theme.images.retain(keep);
    summary.images = before - theme.images.len();

    summary.default_reset = repair_default_index(theme);
    debug!(
        "Removed {} config entries under {}",
        summary.total(),
        removed_dir.display()
    );
    summary
}

/// Drop entries under `theme_dir` whose target no longer exists.
///
/// Used after a theme folder was replaced, so paths from the old layout do
/// not linger next to the new ones.
pub fn prune_missing(theme: &mut ThemeConfig, volume: &Volume, theme_dir: &Path) -> usize {
    let keep = |p: &String| !volume.is_under(p, theme_dir) || volume.to_absolute(p).exists();
    let before = theme.file.len() + theme.fonts.len() + theme.images.len();
    theme.file.retain(keep);
    theme.fonts.retain(keep);
    theme.images.retain(keep);
    repair_default_index(theme);
    before - (theme.file.len() + theme.fonts.len() + theme.images.len())
}

/// Forget every theme: empty lists, random default.
pub fn clear_all(theme: &mut ThemeConfig) {
    theme.file.clear();
    theme.fonts.clear();
    theme.images.clear();
    theme.default_file = 0;
}

/// Point `default_file` at the named theme.
///
/// Matching is case-insensitive on `/<name>/theme.txt`, or on the last
/// path segment of a registered theme folder. A descriptor entry never
/// matches by its own file name.
pub fn resolve_default_theme(theme: &mut ThemeConfig, choice: &DefaultTheme) -> DefaultResolution {
    let name = match choice {
        DefaultTheme::Random => {
            theme.default_file = 0;
            return DefaultResolution::Random;
        }
        DefaultTheme::Named(name) => name,
    };

    let descriptor_suffix = format!("/{}/{}", name, DESCRIPTOR_NAME).to_lowercase();
    let folder_suffix = format!("/{}", name).to_lowercase();

    let found = theme.file.iter().position(|p| {
        let p = to_forward_slashes(p).to_lowercase();
        if p.ends_with(&descriptor_suffix) || p == folder_suffix {
            return true;
        }
        let is_descriptor = p
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .is_some_and(|last| last == DESCRIPTOR_NAME.to_lowercase());
        !is_descriptor && entry_name(&p).is_some_and(|n| n.eq_ignore_ascii_case(name))
    });

    match found {
        Some(index) => {
            theme.default_file = index as i64 + 1;
            DefaultResolution::Selected { index: index + 1 }
        }
        None => {
            warn!("Selected default theme '{}' not found in ventoy.json, using random", name);
            theme.default_file = 0;
            DefaultResolution::NotFound { name: name.clone() }
        }
    }
}

/// Set `gfxmode`, refusing values outside the offered list.
pub fn apply_resolution(theme: &mut ThemeConfig, resolution: &str) -> ResolutionOutcome {
    if is_known_gfxmode(resolution) {
        theme.gfxmode = resolution.to_string();
        return ResolutionOutcome::Applied;
    }

    warn!("Resolution '{}' is not in the allowed list", resolution);
    if is_known_gfxmode(&theme.gfxmode) {
        ResolutionOutcome::KeptCurrent(theme.gfxmode.clone())
    } else {
        theme.gfxmode = DEFAULT_GFXMODE.to_string();
        ResolutionOutcome::ResetToMax
    }
}

/// Reset `default_file` to random when it no longer points into `file`.
///
/// Returns whether a reset happened.
pub fn repair_default_index(theme: &mut ThemeConfig) -> bool {
    let len = theme.file.len() as i64;
    if theme.default_file < 0 || theme.default_file > len {
        debug!(
            "default_file {} out of range for {} entries, resetting to random",
            theme.default_file, len
        );
        theme.default_file = 0;
        true
    } else {
        false
    }
}

/// Display name for a `file` entry: the folder holding the descriptor, or
/// the registered folder itself.
pub fn entry_name(entry: &str) -> Option<String> {
    let entry = to_forward_slashes(entry);
    let trimmed = entry.trim_end_matches('/');
    let (parent, last) = trimmed.rsplit_once('/')?;
    let name = if last.eq_ignore_ascii_case(DESCRIPTOR_NAME) {
        parent.rsplit('/').next()?
    } else {
        last
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Names of the themes listed in `file`, in list order.
pub fn theme_names(theme: &ThemeConfig) -> Vec<String> {
    theme.file.iter().filter_map(|p| entry_name(p)).collect()
}
