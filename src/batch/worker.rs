//! Background runner. At most one operation runs at a time; a second start
//! request while one is active is rejected with [`ThemeError::Busy`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::remove::{self, default_remover, Remover};
use super::{install, settings};
use super::{
    EventSink, InstallRequest, OperationKind, OperationReport, RemoveAllRequest, RemoveRequest, SettingsRequest,
    ThemeEvent,
};
use crate::archive::DecoderRegistry;
use crate::error::{Result, ThemeError};

/// Owns the decoder registry and the single operation slot.
#[derive(Clone)]
pub struct ThemeManager {
    registry: Arc<DecoderRegistry>,
    busy: Arc<AtomicBool>,
    remover: Remover,
}

impl Default for ThemeManager {
    fn default() -> Self {
        Self::new(DecoderRegistry::global())
    }
}

impl ThemeManager {
    pub fn new(registry: Arc<DecoderRegistry>) -> Self {
        Self {
            registry,
            busy: Arc::new(AtomicBool::new(false)),
            remover: default_remover(),
        }
    }

    /// Replace the folder deletion routine.
    pub fn with_remover<F>(mut self, remover: F) -> Self
    where
        F: Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.remover = Arc::new(remover);
        self
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn start_install(&self, request: InstallRequest, tx: Sender<ThemeEvent>) -> Result<OperationHandle> {
        let registry = Arc::clone(&self.registry);
        self.spawn(OperationKind::Install, tx, move |events| {
            install::run(&request, &registry, events)
        })
    }

    pub fn start_settings(&self, request: SettingsRequest, tx: Sender<ThemeEvent>) -> Result<OperationHandle> {
        self.spawn(OperationKind::Settings, tx, move |events| settings::run(&request, events))
    }

    pub fn start_remove(&self, request: RemoveRequest, tx: Sender<ThemeEvent>) -> Result<OperationHandle> {
        let remover = Arc::clone(&self.remover);
        self.spawn(OperationKind::Remove, tx, move |events| {
            remove::run_remove(&request, &remover, events)
        })
    }

    pub fn start_remove_all(&self, request: RemoveAllRequest, tx: Sender<ThemeEvent>) -> Result<OperationHandle> {
        let remover = Arc::clone(&self.remover);
        self.spawn(OperationKind::RemoveAll, tx, move |events| {
            remove::run_remove_all(&request, &remover, events)
        })
    }

    fn spawn<F>(&self, kind: OperationKind, tx: Sender<ThemeEvent>, work: F) -> Result<OperationHandle>
    where
        F: FnOnce(&EventSink) -> OperationReport + Send + 'static,
    {
        let slot = SlotGuard::acquire(&self.busy).ok_or(ThemeError::Busy)?;
        let events = EventSink::new(kind, tx);

        let handle = thread::Builder::new()
            .name(format!("ventoy-themer-{}", kind))
            .spawn(move || {
                // Released on return or unwind.
                let _slot = slot;
                debug!("{} started", kind);
                let report = work(&events);
                debug!("{} finished: {:?}", kind, report.outcome);
                events.finished(report.clone());
                report
            })
            .map_err(|e| ThemeError::io(format!("<{} worker>", kind), e))?;

        Ok(OperationHandle { kind, handle })
    }
}

/// Holds the busy flag for the lifetime of one worker.
struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl SlotGuard {
    fn acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { busy: Arc::clone(busy) })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// A running operation.
#[derive(Debug)]
pub struct OperationHandle {
    kind: OperationKind,
    handle: JoinHandle<OperationReport>,
}

impl OperationHandle {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its report.
    pub fn join(self) -> Result<OperationReport> {
        self.handle.join().map_err(|_| {
            error!("{} worker panicked", self.kind);
            ThemeError::WorkerPanicked
        })
    }
}
