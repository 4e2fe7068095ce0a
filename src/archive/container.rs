//! Single-stage container decoders: ZIP, tar (plain/gzip/bzip2) and 7z.
//!
//! Each extracts straight into the destination directory using a native Rust
//! crate. RAR has no pure-Rust decoder and lives in `sevenzip.rs`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::Decoder;
use crate::paths::lexical_normalize;

/// `.zip` / `.zipx` via the zip crate.
pub struct ZipDecoder;

impl Decoder for ZipDecoder {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive)
            .with_context(|| format!("Failed to open ZIP: {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file))
            .context("Not a valid ZIP file")?;
        debug!("{}: {} entries", archive.display(), zip.len());

        // ZipArchive::extract refuses entries that escape `dest`.
        zip.extract(dest)
            .context("Unsupported compression method or corrupted entry")?;
        Ok(())
    }
}

/// Compression layer in front of a tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
    Bzip2,
}

/// `.tar`, `.tar.gz`/`.tgz`, `.tar.bz2` via the tar crate.
pub struct TarDecoder {
    compression: TarCompression,
}

impl TarDecoder {
    pub fn plain() -> Self {
        Self {
            compression: TarCompression::None,
        }
    }

    pub fn gzip() -> Self {
        Self {
            compression: TarCompression::Gzip,
        }
    }

    pub fn bzip2() -> Self {
        Self {
            compression: TarCompression::Bzip2,
        }
    }
}

impl Decoder for TarDecoder {
    fn name(&self) -> &'static str {
        match self.compression {
            TarCompression::None => "tar",
            TarCompression::Gzip => "tar+gzip",
            TarCompression::Bzip2 => "tar+bzip2",
        }
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive)
            .with_context(|| format!("Failed to open tarball: {}", archive.display()))?;
        let reader = BufReader::new(file);
        let reader: Box<dyn Read> = match self.compression {
            TarCompression::None => Box::new(reader),
            TarCompression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            TarCompression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        };
        unpack_tar(reader, dest).context("Not a valid TAR file")
    }
}

/// Unpack a tar stream into `dest`.
///
/// `tar::Archive::unpack` skips entries with `..` or absolute paths.
pub fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);
    archive
        .unpack(dest)
        .with_context(|| format!("Failed to unpack tar into {}", dest.display()))
}

/// `.7z` via sevenz-rust (pure Rust).
pub struct SevenZDecoder;

impl Decoder for SevenZDecoder {
    fn name(&self) -> &'static str {
        "sevenz-rust"
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        // sevenz-rust joins entry names onto `dest` unchecked.
        sevenz_rust::decompress_file_with_extract_fn(archive, dest, |entry, reader, path| {
            if !entry_stays_inside(dest, entry.name()) {
                return Err(sevenz_rust::Error::other(format!(
                    "Refusing entry outside destination: {}",
                    entry.name()
                )));
            }
            sevenz_rust::default_entry_extract_fn(entry, reader, path)
        })
        .with_context(|| format!("Failed to decompress 7z archive: {}", archive.display()))
    }
}

/// True when an archive entry name resolves to a path under `dest`.
fn entry_stays_inside(dest: &Path, name: &str) -> bool {
    let relative = PathBuf::from(name.replace('\\', "/"));
    let traverses = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    !traverses && lexical_normalize(&dest.join(&relative)).starts_with(lexical_normalize(dest))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn file_set(dir: &Path) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    pub(crate) fn build_tar<W: Write>(writer: W) -> W {
        let mut builder = tar::Builder::new(writer);
        for (path, data) in [
            ("Foo/theme.txt", b"desktop-color: \"#000000\"".as_slice()),
            ("Foo/fonts/unifont.pf2", b"PFF2".as_slice()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_extract_zip() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("test.zip");

        // Create a test ZIP
        {
            let file = File::create(&zip_path)?;
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();

            zip.start_file("theme.txt", options)?;
            zip.write_all(b"title-text: \"\"")?;

            zip.start_file("icons/linux.png", options)?;
            zip.write_all(b"png")?;

            zip.finish()?;
        }

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        ZipDecoder.extract_all(&zip_path, &out)?;

        assert_eq!(file_set(&out), vec!["icons/linux.png", "theme.txt"]);
        Ok(())
    }

    #[test]
    fn test_extract_plain_tar() -> Result<()> {
        let dir = tempdir()?;
        let tar_path = dir.path().join("test.tar");
        build_tar(File::create(&tar_path)?);

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        TarDecoder::plain().extract_all(&tar_path, &out)?;

        assert_eq!(file_set(&out), vec!["Foo/fonts/unifont.pf2", "Foo/theme.txt"]);
        Ok(())
    }

    #[test]
    fn test_extract_tar_gz() -> Result<()> {
        let dir = tempdir()?;
        let tgz_path = dir.path().join("test.tgz");
        let encoder = flate2::write::GzEncoder::new(File::create(&tgz_path)?, flate2::Compression::default());
        build_tar(encoder).finish()?;

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        TarDecoder::gzip().extract_all(&tgz_path, &out)?;

        assert_eq!(file_set(&out), vec!["Foo/fonts/unifont.pf2", "Foo/theme.txt"]);
        Ok(())
    }

    #[test]
    fn test_extract_tar_bz2() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.tar.bz2");
        let encoder = bzip2::write::BzEncoder::new(File::create(&path)?, bzip2::Compression::default());
        build_tar(encoder).finish()?;

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        TarDecoder::bzip2().extract_all(&path, &out)?;

        assert_eq!(file_set(&out), vec!["Foo/fonts/unifont.pf2", "Foo/theme.txt"]);
        Ok(())
    }

    #[test]
    fn test_gzip_decoder_rejects_plain_tar() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("mislabeled.tar.gz");
        build_tar(File::create(&path)?);

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        assert!(TarDecoder::gzip().extract_all(&path, &out).is_err());
        Ok(())
    }

    fn build_7z(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        let mut writer = sevenz_rust::SevenZWriter::create(path)?;
        for (name, data) in entries {
            let mut entry = sevenz_rust::SevenZArchiveEntry::new();
            entry.name = name.to_string();
            writer.push_archive_entry(entry, Some(*data))?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_extract_7z() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.7z");
        build_7z(
            &path,
            &[
                ("Foo/theme.txt", b"desktop-color: \"#000000\"".as_slice()),
                ("Foo/fonts/unifont.pf2", b"PFF2".as_slice()),
            ],
        )?;

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        SevenZDecoder.extract_all(&path, &out)?;

        assert_eq!(file_set(&out), vec!["Foo/fonts/unifont.pf2", "Foo/theme.txt"]);
        Ok(())
    }

    #[test]
    fn test_7z_entry_escaping_destination_fails() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("evil.7z");
        build_7z(
            &path,
            &[
                ("theme.txt", b"title-text: \"\"".as_slice()),
                ("../../../escaped.txt", b"gotcha".as_slice()),
            ],
        )?;

        let out = dir.path().join("a").join("b").join("out");
        std::fs::create_dir_all(&out)?;
        assert!(SevenZDecoder.extract_all(&path, &out).is_err());

        assert!(!dir.path().join("escaped.txt").exists());
        assert!(!dir.path().join("a").join("escaped.txt").exists());
        assert!(file_set(dir.path())
            .iter()
            .all(|f| f == "evil.7z" || f.starts_with("a/b/out/")));
        Ok(())
    }

    #[test]
    fn test_entry_stays_inside() {
        let dest = Path::new("/vol/ventoy/theme/.staging/Foo");
        assert!(entry_stays_inside(dest, "theme.txt"));
        assert!(entry_stays_inside(dest, "icons/./linux.png"));
        assert!(!entry_stays_inside(dest, "../escaped.txt"));
        assert!(!entry_stays_inside(dest, "icons/../../escaped.txt"));
        assert!(!entry_stays_inside(dest, "/etc/passwd"));
        assert!(!entry_stays_inside(dest, "..\\escaped.txt"));
    }

    #[test]
    fn test_corrupt_7z_fails() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.7z");
        std::fs::write(&path, b"not a 7z archive at all")?;

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out)?;
        assert!(SevenZDecoder.extract_all(&path, &out).is_err());
        Ok(())
    }
}
