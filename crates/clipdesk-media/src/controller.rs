// crates/clipdesk-media/src/controller.rs
//
// One OperationController per tab. Owns the tab's run status and is the only
// thing that starts, watches or cancels that tab's worker.
//
// UI contract:
//   busy      → disable the tab's inputs and Start button, show Cancel
//   progress  → Some(p) while a run is active, None otherwise
//   notice    → the blocking success / warning / error card

use crossbeam_channel::TryRecvError;

use clipdesk_core::operation::{
    OperationKind, OperationOutcome, OperationRequest, WorkerEvent, CANCELLED,
};
use clipdesk_core::validate::ValidationError;

use crate::worker::{OperationWorker, WorkerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind:    NoticeKind,
    pub title:   String,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, title: &str, message: impl Into<String>) -> Self {
        Self { kind, title: title.to_string(), message: message.into() }
    }
}

pub struct OperationController {
    kind:     OperationKind,
    worker:   OperationWorker,
    handle:   Option<WorkerHandle>,
    progress: Option<u8>,
    notice:   Option<Notice>,
}

impl OperationController {
    pub fn new(kind: OperationKind, worker: OperationWorker) -> Self {
        Self { kind, worker, handle: None, progress: None, notice: None }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn is_busy(&self) -> bool {
        self.handle.is_some()
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Start a run from a validated draft. Returns whether a worker started.
    ///
    /// A draft that failed validation only produces a warning notice; no
    /// worker is constructed and the engine is never called.
    pub fn start(&mut self, request: Result<OperationRequest, ValidationError>) -> bool {
        if self.is_busy() {
            tracing::warn!("[{}] start ignored: a run is already active", self.kind);
            return false;
        }
        let request = match request {
            Ok(r)  => r,
            Err(e) => {
                tracing::info!("[{}] rejected: {e}", self.kind);
                self.notice = Some(Notice::new(NoticeKind::Warning, "Cannot start", e.to_string()));
                return false;
            }
        };
        debug_assert_eq!(request.kind(), self.kind);

        self.notice   = None;
        self.progress = Some(0);
        self.handle   = Some(self.worker.start(request));
        true
    }

    pub fn cancel(&self) {
        if let Some(h) = &self.handle {
            h.cancel();
        }
    }

    /// Drain pending worker events. Returns the outcome if the run ended.
    pub fn poll(&mut self) -> Option<OperationOutcome> {
        loop {
            let event = match self.handle.as_ref()?.rx.try_recv() {
                Ok(e) => e,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    // The run thread died without a terminal event.
                    WorkerEvent::Failed("worker exited unexpectedly".into())
                }
            };

            match event {
                WorkerEvent::Progress(p) => self.progress = Some(p),
                terminal => {
                    let outcome = terminal.outcome();
                    self.finish(terminal);
                    return outcome;
                }
            }
        }
    }

    fn finish(&mut self, terminal: WorkerEvent) {
        self.handle   = None;
        self.progress = None;
        let label = self.kind.label();
        self.notice = match terminal {
            WorkerEvent::Completed(path) => Some(Notice::new(
                NoticeKind::Success,
                &format!("{label} complete"),
                format!("Saved to {}", path.display()),
            )),
            WorkerEvent::Failed(msg) if msg == CANCELLED => Some(Notice::new(
                NoticeKind::Warning,
                &format!("{label} cancelled"),
                "The operation was cancelled. A partial output file may remain.",
            )),
            WorkerEvent::Failed(msg) => Some(Notice::new(
                NoticeKind::Error,
                &format!("{label} failed"),
                msg,
            )),
            WorkerEvent::Progress(_) => None,
        };
    }
}
