//! Turning user-supplied paths into install sources.
//!
//! A dropped or passed path can be:
//! - An archive file with a recognized suffix
//! - A folder holding archives (each archive in its root becomes a source)
//! - A folder of theme folders (each subfolder with a `theme.txt` becomes a source)
//! - A single theme folder (contains a `theme.txt` somewhere)
//!
//! The first rule that matches a folder wins. Anything else is skipped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::{theme_name_for, ArchiveFormat};
use crate::discover::contains_descriptor;
use crate::paths::lexical_normalize;

/// One item of an install batch: an archive file or a theme folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThemeSource {
    path: PathBuf,
}

impl ThemeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder name, or archive file name minus its recognized suffix.
    pub fn theme_name(&self) -> Option<String> {
        theme_name_for(&self.path)
    }

    /// Label for listings (`[FOLDER] Foo` / `Foo.zip`).
    pub fn display_name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        if self.path.is_dir() {
            format!("[FOLDER] {}", name)
        } else {
            name
        }
    }
}

/// Why an input contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedExtension,
    NoThemeContent,
    Duplicate,
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of [`expand_inputs`].
#[derive(Debug, Clone, Default)]
pub struct SourceList {
    pub sources: Vec<ThemeSource>,
    pub skipped: Vec<SkippedInput>,
}

impl SourceList {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn push(&mut self, seen: &mut HashSet<PathBuf>, path: PathBuf) -> bool {
        if seen.insert(lexical_normalize(&path)) {
            debug!("Added theme source: {}", path.display());
            self.sources.push(ThemeSource::new(path));
            true
        } else {
            warn!("Skipping already added source: {}", path.display());
            self.skipped.push(SkippedInput {
                path,
                reason: SkipReason::Duplicate,
            });
            false
        }
    }

    fn skip(&mut self, path: &Path, reason: SkipReason) {
        self.skipped.push(SkippedInput {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Expand user inputs into a deduplicated, ordered list of sources.
///
/// Paths that do not exist are passed through so the install batch reports
/// them as skipped items.
pub fn expand_inputs<I, P>(inputs: I) -> SourceList
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut list = SourceList::default();
    let mut seen = HashSet::new();

    for input in inputs {
        let path = input.as_ref();
        if path.is_dir() {
            expand_directory(path, &mut list, &mut seen);
        } else if !path.exists() || ArchiveFormat::detect(path).is_some() {
            list.push(&mut seen, path.to_path_buf());
        } else {
            warn!(
                "Skipping unsupported file extension: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            list.skip(path, SkipReason::UnsupportedExtension);
        }
    }
    list
}

fn expand_directory(dir: &Path, list: &mut SourceList, seen: &mut HashSet<PathBuf>) {
    let children = match sorted_children(dir) {
        Ok(children) => children,
        Err(e) => {
            warn!("Cannot list directory {}: {}", dir.display(), e);
            list.skip(dir, SkipReason::Unreadable(e.to_string()));
            return;
        }
    };

    let archives: Vec<&PathBuf> = children
        .iter()
        .filter(|p| p.is_file() && ArchiveFormat::detect(p).is_some())
        .collect();
    if !archives.is_empty() {
        let added = archives
            .into_iter()
            .filter(|p| list.push(seen, (*p).clone()))
            .count();
        info!("Added {} archive(s) from folder '{}'", added, dir.display());
        return;
    }

    let theme_folders: Vec<&PathBuf> = children
        .iter()
        .filter(|p| p.is_dir() && contains_descriptor(p))
        .collect();
    if !theme_folders.is_empty() {
        let added = theme_folders
            .into_iter()
            .filter(|p| list.push(seen, (*p).clone()))
            .count();
        info!("Added {} theme folder(s) from folder '{}'", added, dir.display());
        return;
    }

    if contains_descriptor(dir) {
        if list.push(seen, dir.to_path_buf()) {
            info!("Added theme folder '{}'", dir.display());
        }
        return;
    }

    warn!(
        "Skipping directory '{}': no supported theme archives or theme folders",
        dir.display()
    );
    list.skip(dir, SkipReason::NoThemeContent);
}

fn sorted_children(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut children = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect::<Vec<_>>();
    children.sort();
    Ok(children)
}
