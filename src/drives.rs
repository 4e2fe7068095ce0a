//! Drive enumeration for picking a target volume.

use std::fmt;
use std::path::PathBuf;

use sysinfo::Disks;
use tracing::debug;

/// Filesystems that can never be a Ventoy data partition.
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "tmpfs", "devtmpfs", "overlay", "squashfs", "proc", "sysfs", "ramfs", "iso9660", "udf",
];

/// An eligible target volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveInfo {
    /// Mount point (drive root on Windows).
    pub identifier: PathBuf,
    /// Human readable capacity (`14.9 GB`).
    pub capacity: String,
    /// Volume label, or a description when the volume has none.
    pub label: String,
    /// `ventoy/` already exists at the root.
    pub has_ventoy_dir: bool,
}

impl DriveInfo {
    pub fn new(identifier: impl Into<PathBuf>, total_bytes: u64, label: &str, removable: bool) -> Self {
        let identifier = identifier.into();
        let label = if label.trim().is_empty() {
            if removable { "Removable Disk" } else { "Local Disk" }.to_string()
        } else {
            label.trim().to_string()
        };
        let has_ventoy_dir = identifier.join("ventoy").is_dir();
        Self {
            identifier,
            capacity: format_capacity(total_bytes),
            label,
            has_ventoy_dir,
        }
    }
}

impl fmt::Display for DriveInfo {
    /// `<identifier> [<capacity>] <label>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.identifier.display(), self.capacity, self.label)
    }
}

/// Capacity in GiB with one decimal, as shown in drive pickers.
pub fn format_capacity(bytes: u64) -> String {
    format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

/// Source of candidate volumes.
pub trait DriveProvider {
    fn list(&self) -> Vec<DriveInfo>;
}

/// Mounted disks as reported by the OS.
#[derive(Debug, Default)]
pub struct SystemDrives;

impl DriveProvider for SystemDrives {
    fn list(&self) -> Vec<DriveInfo> {
        let disks = Disks::new_with_refreshed_list();
        let mut drives: Vec<DriveInfo> = disks
            .list()
            .iter()
            .filter(|disk| {
                let fs = disk.file_system().to_string_lossy().to_lowercase();
                let eligible = disk.total_space() > 0
                    && !disk.is_read_only()
                    && !PSEUDO_FILESYSTEMS.contains(&fs.as_str());
                if !eligible {
                    debug!("Skipping {} ({})", disk.mount_point().display(), fs);
                }
                eligible
            })
            .map(|disk| {
                DriveInfo::new(
                    disk.mount_point(),
                    disk.total_space(),
                    &disk.name().to_string_lossy(),
                    disk.is_removable(),
                )
            })
            .collect();

        drives.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        drives.dedup_by(|a, b| a.identifier == b.identifier);
        drives
    }
}
