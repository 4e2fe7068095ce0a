//! Asset discovery inside an installed theme directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::paths::Volume;

/// File name GRUB looks for as the theme entry point.
pub const DESCRIPTOR_NAME: &str = "theme.txt";

/// Bitmap font extension (compared case-insensitively).
pub const FONT_EXTENSION: &str = "pf2";

/// Find the theme descriptor below `theme_dir`.
///
/// Archives often wrap the theme in an extra folder, so the search is
/// recursive. When several descriptors exist, the shallowest wins and ties
/// are broken by path order.
pub fn find_descriptor(theme_dir: &Path) -> Option<PathBuf> {
    if !theme_dir.is_dir() {
        return None;
    }

    WalkDir::new(theme_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == DESCRIPTOR_NAME)
        .map(|e| (e.depth(), e.into_path()))
        .min()
        .map(|(_, path)| path)
}

/// Whether `dir` contains a descriptor anywhere beneath it.
pub fn contains_descriptor(dir: &Path) -> bool {
    find_descriptor(dir).is_some()
}

/// Collect every `.pf2` font below `theme_dir` as a volume-relative path.
///
/// Fonts whose path cannot be expressed relative to the volume are skipped.
pub fn find_fonts(theme_dir: &Path, volume: &Volume) -> BTreeSet<String> {
    let mut fonts = BTreeSet::new();
    if !theme_dir.is_dir() {
        return fonts;
    }

    for entry in WalkDir::new(theme_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !is_font(entry.path()) {
            continue;
        }
        match volume.to_volume_relative(entry.path()) {
            Some(rel) => {
                debug!("Found font: {}", rel);
                fonts.insert(rel);
            }
            None => warn!(
                "Could not get volume-relative path for font file: {}",
                entry.path().display()
            ),
        }
    }
    fonts
}

fn is_font(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(FONT_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_find_descriptor_prefers_shallowest() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a/b/theme.txt"));
        touch(&dir.path().join("z/theme.txt"));
        touch(&dir.path().join("b/theme.txt"));

        assert_eq!(find_descriptor(dir.path()), Some(dir.path().join("b/theme.txt")));

        touch(&dir.path().join("theme.txt"));
        assert_eq!(find_descriptor(dir.path()), Some(dir.path().join("theme.txt")));
    }

    #[test]
    fn test_find_descriptor_none() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Theme.TXT.bak"));
        assert_eq!(find_descriptor(dir.path()), None);
        assert!(!contains_descriptor(dir.path()));
        assert_eq!(find_descriptor(&dir.path().join("missing")), None);
    }

    #[test]
    fn test_find_fonts_volume_relative() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        let theme = volume.theme_dir("Foo");
        touch(&theme.join("theme.txt"));
        touch(&theme.join("fonts/unifont.pf2"));
        touch(&theme.join("Terminus-16.PF2"));
        touch(&theme.join("fonts/readme.txt"));

        let fonts: Vec<_> = find_fonts(&theme, &volume).into_iter().collect();
        assert_eq!(
            fonts,
            vec![
                "/ventoy/theme/Foo/Terminus-16.PF2".to_string(),
                "/ventoy/theme/Foo/fonts/unifont.pf2".to_string(),
            ]
        );
    }

    #[test]
    fn test_find_fonts_outside_volume_skipped() {
        let vol_dir = tempdir().unwrap();
        let other = tempdir().unwrap();
        let volume = Volume::open(vol_dir.path()).unwrap();
        touch(&other.path().join("a.pf2"));

        assert!(find_fonts(other.path(), &volume).is_empty());
    }
}
