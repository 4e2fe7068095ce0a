//! Batch operations on a volume: install, settings apply, remove, remove-all.
//!
//! Each operation runs on a worker thread owned by [`ThemeManager`], reports
//! through [`ThemeEvent`]s and ends with an [`OperationReport`]. Item
//! failures are isolated: one broken archive never stops the rest of a batch.

pub mod events;
pub mod install;
pub mod remove;
pub mod settings;
pub mod worker;

use std::fmt;
use std::path::PathBuf;

pub use events::{
    confirmation_slot, AnswerWaiter, ConfirmError, ConfirmationRequest, EventSink, Responder, Severity, ThemeEvent,
};
pub use install::{InstallRequest, OverwritePolicy};
pub use remove::{RemoveAllRequest, RemoveRequest};
pub use settings::SettingsRequest;
pub use worker::{OperationHandle, ThemeManager};

/// The four operations a manager can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Install,
    Settings,
    Remove,
    RemoveAll,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Install => "install",
            OperationKind::Settings => "settings",
            OperationKind::Remove => "remove",
            OperationKind::RemoveAll => "remove-all",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Confirming,
    Extracting,
    Copying,
    Scanning,
    /// Discovered paths are part of the config merge.
    Merged,
    /// Theme folder deleted.
    Removed,
    Skipped,
    Failed,
}

impl ItemState {
    pub fn is_done(&self) -> bool {
        matches!(self, ItemState::Merged | ItemState::Removed)
    }
}

/// Per-item result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub name: String,
    pub source: Option<PathBuf>,
    pub state: ItemState,
    /// Why the item was skipped or failed.
    pub detail: Option<String>,
}

impl ItemReport {
    pub fn new(name: impl Into<String>, source: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source,
            state: ItemState::Pending,
            detail: None,
        }
    }

    pub(crate) fn finish(&mut self, state: ItemState, detail: Option<String>) {
        self.state = state;
        self.detail = detail;
    }
}

/// What happened to `ventoy.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStep {
    Written,
    /// The operation stopped before reaching the config.
    Untouched,
    /// No config on the volume; nothing was written.
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Some items or the config step failed, but work was done.
    PartialFailure,
    /// Nothing could be done.
    Failed,
}

impl Outcome {
    /// Classify an operation from whether anything was changed and whether
    /// anything went wrong.
    pub fn from_parts(work_done: bool, had_errors: bool) -> Self {
        match (work_done, had_errors) {
            (_, false) => Outcome::Completed,
            (true, true) => Outcome::PartialFailure,
            (false, true) => Outcome::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Outcome::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub kind: OperationKind,
    pub outcome: Outcome,
    pub items: Vec<ItemReport>,
    pub config: ConfigStep,
}

impl OperationReport {
    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|i| i.state == state).count()
    }

    pub fn item(&self, name: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_parts() {
        assert_eq!(Outcome::from_parts(true, false), Outcome::Completed);
        assert_eq!(Outcome::from_parts(false, false), Outcome::Completed);
        assert_eq!(Outcome::from_parts(true, true), Outcome::PartialFailure);
        assert_eq!(Outcome::from_parts(false, true), Outcome::Failed);
    }
}
