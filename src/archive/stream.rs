//! Two-stage extraction for compression-only formats.
//!
//! `.xz`, `.lz4` and `.zst` carry a single compressed stream, expected to be a
//! tarball. The stream is decompressed into a scratch file next to the
//! destination, which is then unpacked as tar. The scratch file is a
//! [`tempfile::NamedTempFile`], so it is removed when extraction finishes,
//! whether it succeeded or not.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::container::unpack_tar;
use super::Decoder;

/// Decompresses one compressed stream into a writer.
pub trait StreamDecompressor: Send + Sync {
    /// Short name of the compression (`xz`, `lz4`, `zstd`).
    fn name(&self) -> &'static str;

    /// Decompress all of `input` into `output`, returning the bytes written.
    fn decompress(&self, input: File, output: &mut dyn Write) -> io::Result<u64>;
}

pub struct XzDecompressor;

impl StreamDecompressor for XzDecompressor {
    fn name(&self) -> &'static str {
        "xz"
    }

    fn decompress(&self, input: File, output: &mut dyn Write) -> io::Result<u64> {
        // multi-decoder accepts concatenated .xz streams (pixz, parallel xz)
        let mut decoder = xz2::read::XzDecoder::new_multi_decoder(BufReader::new(input));
        io::copy(&mut decoder, output)
    }
}

pub struct Lz4Decompressor;

impl StreamDecompressor for Lz4Decompressor {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn decompress(&self, input: File, output: &mut dyn Write) -> io::Result<u64> {
        let mut decoder = lz4_flex::frame::FrameDecoder::new(BufReader::new(input));
        io::copy(&mut decoder, output)
    }
}

pub struct ZstdDecompressor;

impl StreamDecompressor for ZstdDecompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn decompress(&self, input: File, output: &mut dyn Write) -> io::Result<u64> {
        let mut decoder = zstd::stream::read::Decoder::new(input)?;
        io::copy(&mut decoder, output)
    }
}

/// A [`Decoder`] that runs a [`StreamDecompressor`] and then unpacks the
/// result as tar.
pub struct TarPipeline<D> {
    decompressor: D,
}

impl<D: StreamDecompressor> TarPipeline<D> {
    pub fn new(decompressor: D) -> Self {
        Self { decompressor }
    }
}

impl<D: StreamDecompressor> Decoder for TarPipeline<D> {
    fn name(&self) -> &'static str {
        self.decompressor.name()
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        let input = File::open(archive)
            .with_context(|| format!("Failed to open archive: {}", archive.display()))?;

        let scratch_dir = dest.parent().unwrap_or(dest);
        let mut scratch = tempfile::Builder::new()
            .prefix(".vtheme-")
            .suffix(".tar")
            .tempfile_in(scratch_dir)
            .with_context(|| format!("Failed to create temporary file in {}", scratch_dir.display()))?;

        let written = {
            let mut writer = BufWriter::new(scratch.as_file_mut());
            let written = self
                .decompressor
                .decompress(input, &mut writer)
                .with_context(|| format!("Failed to decompress {} stream", self.decompressor.name()))?;
            writer.flush().context("Failed to write temporary tar")?;
            written
        };
        debug!(
            "Decompressed {} ({} bytes) to {}",
            archive.display(),
            written,
            scratch.path().display()
        );

        scratch
            .as_file_mut()
            .seek(SeekFrom::Start(0))
            .context("Failed to rewind temporary tar")?;
        unpack_tar(BufReader::new(scratch.as_file()), dest).with_context(|| {
            format!(
                "Decompressed {} data is not a valid tar archive",
                self.decompressor.name()
            )
        })?;

        scratch.close().context("Failed to remove temporary tar")?;
        Ok(())
    }
}
