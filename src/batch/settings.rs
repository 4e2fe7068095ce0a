//! Settings apply: default theme and resolution.

use super::{ConfigStep, EventSink, OperationKind, OperationReport, Outcome};
use crate::config::reconcile::{self, DefaultResolution, DefaultTheme, ResolutionOutcome};
use crate::config::ConfigStore;
use crate::error::ThemeError;
use crate::paths::Volume;

#[derive(Debug, Clone)]
pub struct SettingsRequest {
    pub volume: Volume,
    /// `None` leaves `default_file` as it is (apart from range repair).
    pub default_theme: Option<DefaultTheme>,
    /// `None` leaves `gfxmode` as it is.
    pub resolution: Option<String>,
}

pub fn run(request: &SettingsRequest, events: &EventSink) -> OperationReport {
    let config = apply(request, events);
    let outcome = match config {
        ConfigStep::Written => Outcome::Completed,
        _ => Outcome::Failed,
    };
    OperationReport {
        kind: OperationKind::Settings,
        outcome,
        items: Vec::new(),
        config,
    }
}

fn apply(request: &SettingsRequest, events: &EventSink) -> ConfigStep {
    let store = ConfigStore::for_volume(&request.volume);
    events.progress("Reading ventoy.json...", 10);

    let mut config = match store.load_existing() {
        Ok(Some(config)) => config,
        Ok(None) => {
            events.warning(
                "ventoy.json not found",
                format!(
                    "No ventoy.json on {}. Install a theme first.",
                    request.volume.root().display()
                ),
            );
            return ConfigStep::NotFound;
        }
        Err(e) => {
            report_read_error(events, &e);
            return ConfigStep::Failed(e.to_string());
        }
    };

    if let Some(choice) = &request.default_theme {
        match reconcile::resolve_default_theme(&mut config.theme, choice) {
            DefaultResolution::Random => events.progress("Default theme: random", 40),
            DefaultResolution::Selected { index } => events.progress(
                format!("Default theme: entry {} of {}", index, config.theme.file.len()),
                40,
            ),
            DefaultResolution::NotFound { name } => events.warning(
                "Warning",
                format!("Selected default theme '{}' not found in ventoy.json. Using random theme.", name),
            ),
        }
    }

    if let Some(resolution) = &request.resolution {
        match reconcile::apply_resolution(&mut config.theme, resolution) {
            ResolutionOutcome::Applied => events.progress(format!("Resolution: {}", resolution), 60),
            ResolutionOutcome::KeptCurrent(current) => events.warning(
                "Warning",
                format!(
                    "Resolution '{}' is not in the allowed list. Keeping '{}'.",
                    resolution, current
                ),
            ),
            ResolutionOutcome::ResetToMax => events.warning(
                "Warning",
                format!("Resolution '{}' is not in the allowed list. Using max.", resolution),
            ),
        }
    }
    reconcile::repair_default_index(&mut config.theme);

    events.progress("Saving ventoy.json...", 80);
    match store.save(&config) {
        Ok(()) => {
            events.progress("Settings applied.", 100);
            ConfigStep::Written
        }
        Err(e) => {
            let title = if e.is_permission() { "Permission Error" } else { "Error" };
            events.error(title, format!("Failed to write ventoy.json: {}", e));
            ConfigStep::Failed(e.to_string())
        }
    }
}

fn report_read_error(events: &EventSink, e: &ThemeError) {
    let title = match e {
        ThemeError::ConfigParse { .. } => "JSON Read Error",
        ThemeError::Permission { .. } => "Permission Error",
        _ => "Error",
    };
    events.error(title, e.to_string());
}
