//! Archive normalization.
//!
//! Turns a theme source (an archive in one of the recognized formats, or an
//! already-extracted folder) into a theme directory on the target volume.
//!
//! Formats are recognized purely by filename suffix, case-insensitively, in a
//! fixed precedence order. Each recognized format maps to a [`Decoder`] in a
//! [`DecoderRegistry`] that is built once at startup; a format without a
//! decoder is reported as unsupported, the same as an unknown suffix.
//!
//! Compression-only formats (xz, lz4, zst) are handled by composing a
//! [`StreamDecompressor`] with the generic tar extractor in [`stream`].

pub mod container;
pub mod sevenzip;
pub mod stream;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ThemeError};

pub use stream::{StreamDecompressor, TarPipeline};

/// Archive formats recognized by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    Xz,
    Lz4,
    Zstd,
    SevenZ,
    Rar,
}

/// Recognized suffix sets in dispatch precedence order.
///
/// Within a set, longer suffixes come first so the matched suffix can be
/// stripped whole when deriving a theme name.
const SUFFIXES: &[(ArchiveFormat, &[&str])] = &[
    (ArchiveFormat::Zip, &[".zipx", ".zip"]),
    (ArchiveFormat::Tar, &[".tar"]),
    (ArchiveFormat::TarGz, &[".tar.gz", ".tgz"]),
    (ArchiveFormat::TarBz2, &[".tar.bz2"]),
    (ArchiveFormat::Xz, &[".tar.xz", ".xz"]),
    (ArchiveFormat::Lz4, &[".tar.lz4", ".lz4"]),
    (ArchiveFormat::Zstd, &[".tar.zst", ".zst"]),
    (ArchiveFormat::SevenZ, &[".7z"]),
    (ArchiveFormat::Rar, &[".rar"]),
];

impl ArchiveFormat {
    /// All formats, in dispatch order.
    pub const ALL: [ArchiveFormat; 9] = [
        ArchiveFormat::Zip,
        ArchiveFormat::Tar,
        ArchiveFormat::TarGz,
        ArchiveFormat::TarBz2,
        ArchiveFormat::Xz,
        ArchiveFormat::Lz4,
        ArchiveFormat::Zstd,
        ArchiveFormat::SevenZ,
        ArchiveFormat::Rar,
    ];

    /// Detect the format from a path's file name.
    pub fn detect(path: &Path) -> Option<ArchiveFormat> {
        Self::detect_with_suffix(path).map(|(format, _)| format)
    }

    /// Detect the format and return the suffix that matched.
    pub fn detect_with_suffix(path: &Path) -> Option<(ArchiveFormat, &'static str)> {
        let name = path.file_name()?.to_string_lossy();
        for (format, suffixes) in SUFFIXES {
            for suffix in suffixes.iter() {
                if ends_with_ignore_ascii_case(&name, suffix) {
                    return Some((*format, suffix));
                }
            }
        }
        None
    }

    /// Suffixes accepted for this format.
    pub fn suffixes(self) -> &'static [&'static str] {
        SUFFIXES
            .iter()
            .find(|(format, _)| *format == self)
            .map(|(_, suffixes)| *suffixes)
            .unwrap_or(&[])
    }

    /// Whether this format is a compression-only wrapper around tar.
    pub fn is_two_stage(self) -> bool {
        matches!(
            self,
            ArchiveFormat::Xz | ArchiveFormat::Lz4 | ArchiveFormat::Zstd
        )
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::Tar => ".tar",
            ArchiveFormat::TarGz => ".tar.gz/.tgz",
            ArchiveFormat::TarBz2 => ".tar.bz2",
            ArchiveFormat::Xz => ".xz",
            ArchiveFormat::Lz4 => ".lz4",
            ArchiveFormat::Zstd => ".zst",
            ArchiveFormat::SevenZ => ".7z",
            ArchiveFormat::Rar => ".rar",
        };
        f.write_str(label)
    }
}

fn ends_with_ignore_ascii_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Theme name for a source: archive file name without its recognized
/// suffix, or the folder name.
pub fn theme_name_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    if path.is_dir() {
        return Some(name);
    }
    let stem = match ArchiveFormat::detect_with_suffix(path) {
        Some((_, suffix)) => name[..name.len() - suffix.len()].to_string(),
        None => path.file_stem()?.to_string_lossy().into_owned(),
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

/// Extraction capability for one archive format.
pub trait Decoder: Send + Sync {
    /// Short name for logs (`zip`, `tar+gzip`, `unrar`, ...).
    fn name(&self) -> &'static str;

    /// Extract every entry of `archive` into `dest`, which already exists.
    fn extract_all(&self, archive: &Path, dest: &Path) -> anyhow::Result<()>;
}

/// Static mapping from recognized formats to available decoders.
pub struct DecoderRegistry {
    entries: Vec<(ArchiveFormat, Box<dyn Decoder>)>,
}

static GLOBAL_REGISTRY: Lazy<Arc<DecoderRegistry>> = Lazy::new(|| Arc::new(DecoderRegistry::detect()));

impl DecoderRegistry {
    /// An empty registry; every format is unsupported until registered.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Check decoder availability once and register everything usable.
    pub fn detect() -> Self {
        let mut registry = Self::empty();
        registry.register(ArchiveFormat::Zip, Box::new(container::ZipDecoder));
        registry.register(ArchiveFormat::Tar, Box::new(container::TarDecoder::plain()));
        registry.register(ArchiveFormat::TarGz, Box::new(container::TarDecoder::gzip()));
        registry.register(ArchiveFormat::TarBz2, Box::new(container::TarDecoder::bzip2()));
        registry.register(ArchiveFormat::Xz, Box::new(TarPipeline::new(stream::XzDecompressor)));
        registry.register(ArchiveFormat::Lz4, Box::new(TarPipeline::new(stream::Lz4Decompressor)));
        registry.register(ArchiveFormat::Zstd, Box::new(TarPipeline::new(stream::ZstdDecompressor)));
        registry.register(ArchiveFormat::SevenZ, Box::new(container::SevenZDecoder));

        match sevenzip::find_rar_tool() {
            Some(tool) => {
                info!("Using {} for .rar extraction", tool.binary().display());
                registry.register(ArchiveFormat::Rar, Box::new(tool));
            }
            None => warn!("No RAR extractor found (install unrar or 7-Zip); .rar themes are unsupported"),
        }

        debug!(
            "Decoder registry: {}",
            registry
                .entries
                .iter()
                .map(|(f, d)| format!("{}={}", f, d.name()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        registry
    }

    /// The process-wide registry, built on first use.
    pub fn global() -> Arc<DecoderRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register (or replace) the decoder for a format.
    pub fn register(&mut self, format: ArchiveFormat, decoder: Box<dyn Decoder>) {
        self.entries.retain(|(f, _)| *f != format);
        self.entries.push((format, decoder));
    }

    pub fn decoder_for(&self, format: ArchiveFormat) -> Option<&dyn Decoder> {
        self.entries
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, d)| d.as_ref())
    }

    /// Registered formats, in dispatch order.
    pub fn formats(&self) -> Vec<ArchiveFormat> {
        ArchiveFormat::ALL
            .into_iter()
            .filter(|f| self.decoder_for(*f).is_some())
            .collect()
    }

    /// Whether `path` has a suffix this registry can extract.
    pub fn supports(&self, path: &Path) -> bool {
        ArchiveFormat::detect(path)
            .map(|f| self.decoder_for(f).is_some())
            .unwrap_or(false)
    }
}

/// How a source will be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Archive(ArchiveFormat),
    Directory,
}

/// Classify a source without writing anything.
pub fn classify(registry: &DecoderRegistry, source: &Path) -> Result<SourceKind> {
    if source.is_dir() {
        return Ok(SourceKind::Directory);
    }
    if !source.exists() {
        return Err(ThemeError::SourceNotFound(source.to_path_buf()));
    }
    match ArchiveFormat::detect(source) {
        Some(format) if registry.decoder_for(format).is_some() => Ok(SourceKind::Archive(format)),
        _ => Err(ThemeError::UnsupportedFormat {
            path: source.to_path_buf(),
        }),
    }
}

/// Produce a theme directory at `dest` from `source`.
///
/// Archives are extracted into `dest` (created with parents if absent).
/// Folders are copied recursively; `dest` must not exist yet.
pub fn normalize(registry: &DecoderRegistry, source: &Path, dest: &Path) -> Result<SourceKind> {
    let kind = classify(registry, source)?;
    match kind {
        SourceKind::Directory => {
            if dest.exists() {
                return Err(ThemeError::DestinationExists(dest.to_path_buf()));
            }
            copy_dir_recursive(source, dest)?;
            info!("Copied theme folder: {} to {}", source.display(), dest.display());
        }
        SourceKind::Archive(format) => {
            let Some(decoder) = registry.decoder_for(format) else {
                return Err(ThemeError::UnsupportedFormat {
                    path: source.to_path_buf(),
                });
            };
            fs::create_dir_all(dest).map_err(|e| ThemeError::io(dest, e))?;
            decoder
                .extract_all(source, dest)
                .map_err(|e| ThemeError::Extraction {
                    format,
                    path: source.to_path_buf(),
                    cause: format!("{:#}", e),
                })?;
            info!(
                "Extracted {} archive: {}",
                format,
                source.file_name().unwrap_or_default().to_string_lossy()
            );
        }
    }
    Ok(kind)
}

/// Recursively copy `src` into a new directory `dest`.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            ThemeError::io(&path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target: PathBuf = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| ThemeError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            crate::paths::ensure_parent_dirs(&target).map_err(|e| ThemeError::io(&target, e))?;
            fs::copy(entry.path(), &target).map_err(|e| ThemeError::io(entry.path(), e))?;
            copied += 1;
        } else {
            warn!("Skipping non-regular file in theme folder: {}", entry.path().display());
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_precedence_and_case() {
        assert_eq!(ArchiveFormat::detect(Path::new("a.ZIP")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(Path::new("a.zipx")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(Path::new("a.tar")), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect(Path::new("a.Tar.Gz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("a.tgz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("a.tar.bz2")), Some(ArchiveFormat::TarBz2));
        assert_eq!(ArchiveFormat::detect(Path::new("a.tar.xz")), Some(ArchiveFormat::Xz));
        assert_eq!(ArchiveFormat::detect(Path::new("a.xz")), Some(ArchiveFormat::Xz));
        assert_eq!(ArchiveFormat::detect(Path::new("a.tar.lz4")), Some(ArchiveFormat::Lz4));
        assert_eq!(ArchiveFormat::detect(Path::new("a.zst")), Some(ArchiveFormat::Zstd));
        assert_eq!(ArchiveFormat::detect(Path::new("a.7Z")), Some(ArchiveFormat::SevenZ));
        assert_eq!(ArchiveFormat::detect(Path::new("a.rar")), Some(ArchiveFormat::Rar));
        assert_eq!(ArchiveFormat::detect(Path::new("a.bz2")), None);
        assert_eq!(ArchiveFormat::detect(Path::new("a.txt")), None);
    }

    #[test]
    fn test_theme_name_strips_full_suffix() {
        assert_eq!(theme_name_for(Path::new("/x/foo.zip")).as_deref(), Some("foo"));
        assert_eq!(theme_name_for(Path::new("/x/bar.tar.gz")).as_deref(), Some("bar"));
        assert_eq!(theme_name_for(Path::new("/x/Baz.TAR.XZ")).as_deref(), Some("Baz"));
        assert_eq!(theme_name_for(Path::new("/x/v1.2.theme.7z")).as_deref(), Some("v1.2.theme"));
        assert_eq!(theme_name_for(Path::new("/x/.zip")), None);
    }

    #[test]
    fn test_theme_name_for_folder() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("My.Theme.zip");
        fs::create_dir(&folder).unwrap();
        assert_eq!(theme_name_for(&folder).as_deref(), Some("My.Theme.zip"));
    }

    #[test]
    fn test_unsupported_suffix_writes_nothing() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("theme.bin");
        File::create(&source).unwrap().write_all(b"junk").unwrap();
        let dest = dir.path().join("out/theme");

        let registry = DecoderRegistry::detect();
        let err = normalize(&registry, &source, &dest).unwrap_err();
        assert!(matches!(err, ThemeError::UnsupportedFormat { .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_unregistered_format_is_unsupported() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("theme.zip");
        File::create(&source).unwrap();
        let dest = dir.path().join("out");

        let registry = DecoderRegistry::empty();
        let err = normalize(&registry, &source, &dest).unwrap_err();
        assert!(matches!(err, ThemeError::UnsupportedFormat { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_source() {
        let dir = tempdir().unwrap();
        let registry = DecoderRegistry::detect();
        let err = classify(&registry, &dir.path().join("gone.zip")).unwrap_err();
        assert!(matches!(err, ThemeError::SourceNotFound(_)));
    }

    #[test]
    fn test_corrupt_archive_is_extraction_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.zip");
        File::create(&source).unwrap().write_all(b"definitely not a zip").unwrap();

        let registry = DecoderRegistry::detect();
        let err = normalize(&registry, &source, &dir.path().join("out")).unwrap_err();
        match err {
            ThemeError::Extraction { format, .. } => assert_eq!(format, ArchiveFormat::Zip),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_copy_folder_source() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Foo");
        fs::create_dir_all(src.join("icons")).unwrap();
        fs::write(src.join("theme.txt"), "title-text: \"\"").unwrap();
        fs::write(src.join("icons/linux.png"), b"png").unwrap();

        let dest = dir.path().join("vol/ventoy/theme/Foo");
        let registry = DecoderRegistry::detect();
        let kind = normalize(&registry, &src, &dest).unwrap();

        assert_eq!(kind, SourceKind::Directory);
        assert!(dest.join("theme.txt").is_file());
        assert!(dest.join("icons/linux.png").is_file());
    }

    #[test]
    fn test_copy_folder_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Foo");
        fs::create_dir_all(&src).unwrap();
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        let registry = DecoderRegistry::detect();
        let err = normalize(&registry, &src, &dest).unwrap_err();
        assert!(matches!(err, ThemeError::DestinationExists(_)));
    }

    #[test]
    fn test_detect_registers_builtin_formats() {
        let registry = DecoderRegistry::detect();
        for format in [
            ArchiveFormat::Zip,
            ArchiveFormat::Tar,
            ArchiveFormat::TarGz,
            ArchiveFormat::TarBz2,
            ArchiveFormat::Xz,
            ArchiveFormat::Lz4,
            ArchiveFormat::Zstd,
            ArchiveFormat::SevenZ,
        ] {
            assert!(registry.decoder_for(format).is_some(), "{format} not registered");
        }
        assert!(registry.supports(Path::new("x.tar.zst")));
        assert!(!registry.supports(Path::new("x.doc")));
    }
}
