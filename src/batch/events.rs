//! Events sent from a worker to the interface layer, and the one-shot
//! confirmation channel used for overwrite prompts.

use std::fmt;
use std::sync::mpsc::{sync_channel, Receiver, Sender, SyncSender, TrySendError};

use tracing::{error, info, warn};

use super::{OperationKind, OperationReport};

/// How loud a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Messages from a running operation.
#[derive(Debug)]
pub enum ThemeEvent {
    Progress {
        operation: OperationKind,
        message: String,
        /// 0..=100
        percent: u8,
    },
    Message {
        severity: Severity,
        title: String,
        text: String,
    },
    /// The worker is blocked until this request is answered or dropped.
    Confirm(ConfirmationRequest),
    Finished(OperationReport),
}

/// A yes/no question from the worker.
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub theme_name: String,
    pub title: String,
    pub message: String,
    responder: Responder,
}

impl ConfirmationRequest {
    /// Answer the question. Only the first answer counts.
    pub fn answer(&self, yes: bool) -> Result<(), ConfirmError> {
        self.responder.answer(yes)
    }

    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }
}

/// Why an answer could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmError {
    #[error("Confirmation was already answered")]
    AlreadyAnswered,
    #[error("The worker is no longer waiting for an answer")]
    WorkerGone,
}

/// Sending half of a confirmation slot.
#[derive(Debug, Clone)]
pub struct Responder {
    tx: SyncSender<bool>,
}

impl Responder {
    /// Deliver an answer without blocking.
    pub fn answer(&self, yes: bool) -> Result<(), ConfirmError> {
        match self.tx.try_send(yes) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ConfirmError::AlreadyAnswered),
            Err(TrySendError::Disconnected(_)) => Err(ConfirmError::WorkerGone),
        }
    }
}

/// Receiving half of a confirmation slot.
#[derive(Debug)]
pub struct AnswerWaiter {
    rx: Receiver<bool>,
}

impl AnswerWaiter {
    /// Block until answered. A dropped request counts as "no".
    pub fn wait(self) -> bool {
        self.rx.recv().unwrap_or(false)
    }
}

/// A single-slot answer channel.
pub fn confirmation_slot() -> (Responder, AnswerWaiter) {
    let (tx, rx) = sync_channel(1);
    (Responder { tx }, AnswerWaiter { rx })
}

/// Worker-side helper for emitting events of one operation.
///
/// Every message is also logged. A disconnected receiver is not an error;
/// the operation runs to completion regardless.
#[derive(Debug, Clone)]
pub struct EventSink {
    kind: OperationKind,
    tx: Sender<ThemeEvent>,
}

impl EventSink {
    pub fn new(kind: OperationKind, tx: Sender<ThemeEvent>) -> Self {
        Self { kind, tx }
    }

    pub fn progress(&self, message: impl Into<String>, percent: usize) {
        let message = message.into();
        info!("{}", message);
        self.tx
            .send(ThemeEvent::Progress {
                operation: self.kind,
                message,
                percent: percent.min(100) as u8,
            })
            .ok();
    }

    pub fn message(&self, severity: Severity, title: &str, text: impl Into<String>) {
        let text = text.into();
        match severity {
            Severity::Info => info!("{}: {}", title, text),
            Severity::Warning => warn!("{}: {}", title, text),
            Severity::Error => error!("{}: {}", title, text),
        }
        self.tx
            .send(ThemeEvent::Message {
                severity,
                title: title.to_string(),
                text,
            })
            .ok();
    }

    pub fn info(&self, title: &str, text: impl Into<String>) {
        self.message(Severity::Info, title, text);
    }

    pub fn warning(&self, title: &str, text: impl Into<String>) {
        self.message(Severity::Warning, title, text);
    }

    pub fn error(&self, title: &str, text: impl Into<String>) {
        self.message(Severity::Error, title, text);
    }

    /// Ask the interface layer and block for the answer.
    ///
    /// Returns false when nobody is listening or the request is dropped.
    pub fn confirm(&self, theme_name: &str, title: &str, message: String) -> bool {
        let (responder, waiter) = confirmation_slot();
        let request = ConfirmationRequest {
            theme_name: theme_name.to_string(),
            title: title.to_string(),
            message,
            responder,
        };
        if self.tx.send(ThemeEvent::Confirm(request)).is_err() {
            warn!("No listener for confirmation about '{}', treating as declined", theme_name);
            return false;
        }
        waiter.wait()
    }

    pub(crate) fn finished(&self, report: OperationReport) {
        self.tx.send(ThemeEvent::Finished(report)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::thread;

    #[test]
    fn test_second_answer_fails_fast() {
        let (responder, waiter) = confirmation_slot();
        assert_eq!(responder.answer(true), Ok(()));
        assert_eq!(responder.answer(false), Err(ConfirmError::AlreadyAnswered));
        assert!(waiter.wait());
    }

    #[test]
    fn test_answer_after_worker_gone() {
        let (responder, waiter) = confirmation_slot();
        drop(waiter);
        assert_eq!(responder.answer(true), Err(ConfirmError::WorkerGone));
    }

    #[test]
    fn test_dropped_request_is_declined() {
        let (responder, waiter) = confirmation_slot();
        drop(responder);
        assert!(!waiter.wait());
    }

    #[test]
    fn test_sink_confirm_round_trip() {
        let (tx, rx) = channel();
        let sink = EventSink::new(OperationKind::Install, tx);

        let worker = thread::spawn(move || sink.confirm("Foo", "Overwrite", "Replace Foo?".into()));
        match rx.recv().unwrap() {
            ThemeEvent::Confirm(request) => {
                assert_eq!(request.theme_name, "Foo");
                request.answer(true).unwrap();
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_confirm_without_listener_declines() {
        let (tx, rx) = channel();
        drop(rx);
        let sink = EventSink::new(OperationKind::Install, tx);
        assert!(!sink.confirm("Foo", "Overwrite", String::new()));
    }

    #[test]
    fn test_progress_clamped() {
        let (tx, rx) = channel();
        let sink = EventSink::new(OperationKind::RemoveAll, tx);
        sink.progress("done", 250);
        match rx.recv().unwrap() {
            ThemeEvent::Progress { percent, operation, .. } => {
                assert_eq!(percent, 100);
                assert_eq!(operation, OperationKind::RemoveAll);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
