//! Ventoy's `ventoy.json` model.
//!
//! Only the `theme` object is interpreted. Every other top-level key
//! (`control`, `menu_alias`, ...) and any unknown key inside `theme` is
//! carried through a rewrite untouched.

pub mod reconcile;
pub mod store;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use reconcile::{DefaultResolution, DefaultTheme, RemovalSummary, ResolutionOutcome};
pub use store::ConfigStore;

/// Resolutions offered for `gfxmode`, in display order.
pub const GFX_MODES: &[&str] = &[
    "max",
    "3840x2160",
    "2560x1440",
    "1920x1080",
    "1680x1050",
    "1600x900",
    "1440x900",
    "1280x1024",
    "1280x960",
    "1024x768",
    "800x600",
];

pub const DEFAULT_GFXMODE: &str = "max";
pub const DEFAULT_DISPLAY_MODE: &str = "GUI";
pub const DEFAULT_SERIAL_PARAM: &str = "--unit=0 --speed=9600";

/// Whether `mode` is one of [`GFX_MODES`].
pub fn is_known_gfxmode(mode: &str) -> bool {
    GFX_MODES.contains(&mode)
}

/// The whole `ventoy.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VentoyConfig {
    #[serde(default)]
    pub theme: ThemeConfig,

    /// Every other top-level key, in file order.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The `theme` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Descriptor paths (or theme folders when no descriptor exists).
    #[serde(default, deserialize_with = "one_or_many")]
    pub file: Vec<String>,

    /// 0 = random at boot, N = 1-based index into `file`.
    #[serde(default)]
    pub default_file: i64,

    #[serde(default = "default_gfxmode")]
    pub gfxmode: String,

    #[serde(default = "default_display_mode")]
    pub display_mode: String,

    #[serde(default = "default_serial_param")]
    pub serial_param: String,

    #[serde(default, deserialize_with = "one_or_many")]
    pub fonts: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub images: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            file: Vec::new(),
            default_file: 0,
            gfxmode: default_gfxmode(),
            display_mode: default_display_mode(),
            serial_param: default_serial_param(),
            fonts: Vec::new(),
            images: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl ThemeConfig {
    /// The descriptor selected as default, if `default_file` points at one.
    pub fn default_entry(&self) -> Option<&str> {
        let index = usize::try_from(self.default_file).ok()?.checked_sub(1)?;
        self.file.get(index).map(String::as_str)
    }
}

fn default_gfxmode() -> String {
    DEFAULT_GFXMODE.to_string()
}

fn default_display_mode() -> String {
    DEFAULT_DISPLAY_MODE.to_string()
}

fn default_serial_param() -> String {
    DEFAULT_SERIAL_PARAM.to_string()
}

/// Ventoy accepts either a single path or a list for `file`/`fonts`/`images`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}
