//! Volume layout and volume-relative path handling
//!
//! Ventoy reads theme assets through paths rooted at the volume, written with
//! forward slashes and a leading slash (`/ventoy/theme/Foo/theme.txt`),
//! regardless of where the host OS mounts the device. This module handles:
//! - Locating `ventoy/theme/` and `ventoy/ventoy.json` under a volume root
//! - Converting host paths to the volume-relative form and back
//! - Deciding whether a configured path lives under a theme directory

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ThemeError};

/// Theme folders live here, relative to the volume root.
pub const THEMES_DIR: &str = "ventoy/theme";

/// Ventoy's configuration file, relative to the volume root.
pub const CONFIG_FILE: &str = "ventoy/ventoy.json";

/// The mount point of a target device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    root: PathBuf,
}

impl Volume {
    /// Open a volume rooted at an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ThemeError::InvalidVolume(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/ventoy/theme`
    pub fn theme_root(&self) -> PathBuf {
        self.root.join(THEMES_DIR)
    }

    /// `<root>/ventoy/theme/<name>`
    pub fn theme_dir(&self, name: &str) -> PathBuf {
        self.theme_root().join(name)
    }

    /// `<root>/ventoy/ventoy.json`
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Convert a host path under this volume to `/a/b/c` form.
    ///
    /// Returns `None` when the path is not inside the volume.
    pub fn to_volume_relative(&self, path: &Path) -> Option<String> {
        let rel = lexical_normalize(path)
            .strip_prefix(lexical_normalize(&self.root))
            .ok()?
            .to_path_buf();

        let mut out = String::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    out.push('/');
                    out.push_str(&part.to_string_lossy());
                }
                _ => return None,
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Some(out)
    }

    /// Rebuild the host path for a volume-relative path.
    pub fn to_absolute(&self, volume_path: &str) -> PathBuf {
        let trimmed = to_forward_slashes(volume_path);
        let trimmed = trimmed.trim_start_matches('/');
        lexical_normalize(&self.root.join(trimmed))
    }

    /// Whether a configured path equals `dir` or lies beneath it.
    pub fn is_under(&self, volume_path: &str, dir: &Path) -> bool {
        if volume_path.is_empty() {
            return false;
        }
        let full = self.to_absolute(volume_path);
        let dir = lexical_normalize(dir);
        // Path::starts_with compares whole components, so `/theme/Foo`
        // does not match `/theme/FooBar`.
        full == dir || full.starts_with(&dir)
    }
}

/// Convert Windows path separators to forward slashes.
pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Normalize a path for lookups and comparisons (lowercase, forward slashes, trimmed)
pub fn normalize_for_lookup(path: &str) -> String {
    path.to_lowercase()
        .replace('\\', "/")
        .trim_matches('/')
        .to_string()
}

/// Name of the directory containing a volume path (`/ventoy/theme/Foo/theme.txt` -> `Foo`).
pub fn parent_name(volume_path: &str) -> Option<&str> {
    let trimmed = volume_path.trim_end_matches(['/', '\\']);
    let idx = trimmed.rfind(['/', '\\'])?;
    let parent = &trimmed[..idx];
    let name = match parent.rfind(['/', '\\']) {
        Some(p) => &parent[p + 1..],
        None => parent,
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Reject names that would escape the theme root or nest directories.
pub fn validate_theme_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(ThemeError::InvalidThemeName(name.to_string())),
    }
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Create parent directories for a path if they don't exist
pub fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_volume_layout() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        assert_eq!(volume.theme_root(), dir.path().join("ventoy/theme"));
        assert_eq!(volume.theme_dir("Foo"), dir.path().join("ventoy/theme/Foo"));
        assert_eq!(volume.config_path(), dir.path().join("ventoy/ventoy.json"));
    }

    #[test]
    fn test_open_rejects_missing_root() {
        let dir = tempdir().unwrap();
        let result = Volume::open(dir.path().join("nope"));
        assert!(matches!(result, Err(ThemeError::InvalidVolume(_))));
    }

    #[test]
    fn test_to_volume_relative() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        let file = dir.path().join("ventoy/theme/Foo/fonts/a.pf2");
        assert_eq!(
            volume.to_volume_relative(&file).as_deref(),
            Some("/ventoy/theme/Foo/fonts/a.pf2")
        );
        assert_eq!(volume.to_volume_relative(Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn test_is_under() {
        let dir = tempdir().unwrap();
        let volume = Volume::open(dir.path()).unwrap();
        let foo = volume.theme_dir("Foo");

        assert!(volume.is_under("/ventoy/theme/Foo/theme.txt", &foo));
        assert!(volume.is_under("/ventoy/theme/Foo", &foo));
        assert!(volume.is_under("\\ventoy\\theme\\Foo\\x.pf2", &foo));
        assert!(!volume.is_under("/ventoy/theme/FooBar/theme.txt", &foo));
        assert!(!volume.is_under("/ventoy/theme/Bar/theme.txt", &foo));
        assert!(!volume.is_under("", &foo));
    }

    #[test]
    fn test_parent_name() {
        assert_eq!(parent_name("/ventoy/theme/Foo/theme.txt"), Some("Foo"));
        assert_eq!(parent_name("/ventoy/theme/Foo"), Some("theme"));
        assert_eq!(parent_name("theme.txt"), None);
    }

    #[test]
    fn test_validate_theme_name() {
        assert!(validate_theme_name("Foo").is_ok());
        assert!(validate_theme_name("my theme v2").is_ok());
        assert!(validate_theme_name("..").is_err());
        assert!(validate_theme_name("a/b").is_err());
        assert!(validate_theme_name("a\\b").is_err());
        assert!(validate_theme_name("").is_err());
        assert!(validate_theme_name(".").is_err());
    }

    #[test]
    fn test_normalize_for_lookup() {
        assert_eq!(normalize_for_lookup("\\Ventoy\\Theme\\Foo\\"), "ventoy/theme/foo");
    }
}
