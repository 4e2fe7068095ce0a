//! ventoy-themer - boot theme manager for Ventoy volumes
//!
//! Installs GRUB2 themes from archives or folders into `ventoy/theme/` and
//! keeps the `theme` section of `ventoy/ventoy.json` in step with what is
//! on disk.

pub mod archive;
pub mod batch;
pub mod config;
pub mod discover;
pub mod drives;
pub mod error;
pub mod inventory;
pub mod paths;
pub mod settings;
pub mod sources;

pub use archive::{ArchiveFormat, DecoderRegistry};
pub use batch::{OperationReport, Outcome, ThemeEvent, ThemeManager};
pub use config::{ConfigStore, DefaultTheme, VentoyConfig};
pub use error::{Result, ThemeError};
pub use paths::Volume;
