//! Error taxonomy for theme operations.

use std::io;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveFormat;

/// Errors surfaced by the theme pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("Unsupported archive format for extraction: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to extract {format} archive '{}': {cause}", path.display())]
    Extraction {
        format: ArchiveFormat,
        path: PathBuf,
        cause: String,
    },

    #[error("Could not parse {}: file might be corrupted or not valid JSON", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Permission denied: {}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to save {}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Theme source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("Not a usable volume root: {}", .0.display())]
    InvalidVolume(PathBuf),

    #[error("Invalid theme name: '{0}'")]
    InvalidThemeName(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

impl ThemeError {
    /// Map an I/O error on `path`, splitting out permission failures.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            ThemeError::Permission { path, source }
        } else {
            ThemeError::Io { path, source }
        }
    }

    /// Whether this error came from the filesystem refusing access.
    pub fn is_permission(&self) -> bool {
        matches!(self, ThemeError::Permission { .. })
    }
}

pub type Result<T, E = ThemeError> = std::result::Result<T, E>;
