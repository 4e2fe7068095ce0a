//! Loading and saving `ventoy.json` on a volume.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::VentoyConfig;
use crate::error::{Result, ThemeError};
use crate::paths::Volume;

const UTF8_BOM: &str = "\u{feff}";

/// Reads and writes one volume's `ventoy.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_volume(volume: &Volume) -> Self {
        Self::new(volume.config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the config, or an empty one with defaults if the file is absent.
    pub fn load(&self) -> Result<VentoyConfig> {
        Ok(self.load_existing()?.unwrap_or_default())
    }

    /// Load the config if the file exists.
    pub fn load_existing(&self) -> Result<Option<VentoyConfig>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ThemeError::io(&self.path, e)),
        };

        // Windows editors like to prepend a BOM
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);
        let config = serde_json::from_str(content).map_err(|source| ThemeError::ConfigParse {
            path: self.path.clone(),
            source,
        })?;
        debug!("Loaded existing {}", self.path.display());
        Ok(Some(config))
    }

    /// Rewrite the whole file: pretty JSON, 4-space indent, UTF-8.
    ///
    /// The new content goes to a temporary file in the same directory which
    /// is then renamed over the config.
    pub fn save(&self, config: &VentoyConfig) -> Result<()> {
        let content = to_pretty_json(config).map_err(|e| self.write_error(io::Error::other(e)))?;

        let dir = self
            .path
            .parent()
            .ok_or_else(|| self.write_error(io::Error::other("config path has no parent")))?;
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ventoy-")
            .suffix(".json.tmp")
            .tempfile_in(dir)
            .map_err(|e| self.write_error(e))?;
        tmp.write_all(&content).map_err(|e| self.write_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;

        info!("Saved {}", self.path.display());
        Ok(())
    }

    fn write_error(&self, source: io::Error) -> ThemeError {
        if source.kind() == io::ErrorKind::PermissionDenied {
            ThemeError::Permission {
                path: self.path.clone(),
                source,
            }
        } else {
            ThemeError::ConfigWrite {
                path: self.path.clone(),
                source,
            }
        }
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}
