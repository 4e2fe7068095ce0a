//! External-binary extraction for formats without a native Rust decoder.
//!
//! RAR is proprietary and has no pure-Rust decompressor, so `.rar` themes are
//! handed to a command-line extractor found at startup. Either 7-Zip or
//! `unrar` will do:
//!
//! - 7-Zip: `7zz x -y -aoa -o{dir} archive.rar`
//!   - `-y`: Yes to all prompts
//!   - `-aoa`: Overwrite all existing files
//! - unrar: `unrar x -o+ -y archive.rar {dir}/`
//!
//! A bundled binary at `bin/7zz` (Linux) or `bin/7z.exe` (Windows) next to the
//! executable wins over anything on PATH.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::Decoder;

/// Which command-line dialect a binary speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SevenZip,
    Unrar,
}

/// An external extractor binary usable as a [`Decoder`].
#[derive(Debug, Clone)]
pub struct ExternalTool {
    kind: ToolKind,
    binary: PathBuf,
}

impl ExternalTool {
    pub fn new(kind: ToolKind, binary: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            binary: binary.into(),
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Build the extraction command for `archive` into `dest`.
    pub fn command(&self, archive: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        match self.kind {
            ToolKind::SevenZip => {
                cmd.arg("x")
                    .arg("-y")
                    .arg("-aoa")
                    .arg(format!("-o{}", dest.display()))
                    .arg(archive);
            }
            ToolKind::Unrar => {
                // unrar treats a trailing separator as "extract into this directory".
                let mut dest_arg = dest.as_os_str().to_os_string();
                dest_arg.push(std::path::MAIN_SEPARATOR_STR);
                cmd.arg("x").arg("-o+").arg("-y").arg(archive).arg(dest_arg);
            }
        }
        cmd
    }
}

impl Decoder for ExternalTool {
    fn name(&self) -> &'static str {
        match self.kind {
            ToolKind::SevenZip => "7z binary",
            ToolKind::Unrar => "unrar binary",
        }
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut cmd = self.command(archive, dest);
        debug!("Running {:?}", cmd);

        let output = cmd
            .output()
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {} for {}: {}",
                self.name(),
                output.status,
                archive.display(),
                stderr.trim()
            );
        }
        Ok(())
    }
}

/// Locate a RAR-capable extractor.
///
/// Search order: a bundled 7-Zip next to the executable, then `7zz`, `7z`,
/// `unrar` on PATH.
pub fn find_rar_tool() -> Option<ExternalTool> {
    if let Some(bundled) = bundled_7z() {
        return Some(ExternalTool::new(ToolKind::SevenZip, bundled));
    }

    for (name, kind) in [
        ("7zz", ToolKind::SevenZip),
        ("7z", ToolKind::SevenZip),
        ("unrar", ToolKind::Unrar),
    ] {
        if let Ok(path) = which::which(name) {
            return Some(ExternalTool::new(kind, path));
        }
    }
    None
}

fn bundled_7z() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;
    ["bin/7zz", "bin/7z.exe", "7zz"]
        .into_iter()
        .map(|rel| exe_dir.join(rel))
        .find(|p| p.is_file())
}
