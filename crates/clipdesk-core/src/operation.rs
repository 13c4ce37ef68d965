// crates/clipdesk-core/src/operation.rs
//
// Requests, events and outcomes for the three long-running operations.
//
// A controller builds an OperationRequest once the user confirms, hands it
// to a worker, and from then on only sees WorkerEvents:
//
//   Progress(p)*  →  Completed(path) | Failed(msg)
//
// The terminal event is always the last one for a given worker.

use std::fmt;
use std::path::PathBuf;

use crate::encoding::{Bitrate, Container};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Clip,
    Merge,
    Convert,
}

impl OperationKind {
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Clip    => "Clip",
            OperationKind::Merge   => "Merge",
            OperationKind::Convert => "Convert",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Clip range. `None` resolves inside the worker: start → 0, end → the
/// source's full duration.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ClipParams {
    pub start_seconds: Option<f64>,
    pub end_seconds:   Option<f64>,
}

impl ClipParams {
    pub fn resolve(&self, duration: f64) -> (f64, f64) {
        (self.start_seconds.unwrap_or(0.0), self.end_seconds.unwrap_or(duration))
    }
}

/// Merge carries nothing beyond the ordered inputs; the container check
/// happens before the request exists.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct MergeParams;

#[derive(Clone, Debug, PartialEq)]
pub struct ConvertParams {
    pub target_container: Container,
    pub video_codec:      String,
    pub audio_codec:      String,
    pub frame_rate:       f64,
    pub video_bitrate:    Bitrate,
    pub audio_bitrate:    Bitrate,
    pub resize:           bool,
    pub target_width:     u32,
    pub target_height:    u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OperationParams {
    Clip(ClipParams),
    Merge(MergeParams),
    Convert(ConvertParams),
}

/// Immutable once handed to a worker.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationRequest {
    /// Ordered; Clip and Convert use exactly one.
    pub inputs:      Vec<PathBuf>,
    pub output_path: PathBuf,
    pub params:      OperationParams,
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self.params {
            OperationParams::Clip(_)    => OperationKind::Clip,
            OperationParams::Merge(_)   => OperationKind::Merge,
            OperationParams::Convert(_) => OperationKind::Convert,
        }
    }
}

/// Produced exactly once per request.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationOutcome {
    Success { output_path: PathBuf },
    Failure { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::Failed)
    }
}

/// Message text of a user-requested cancellation.
pub const CANCELLED: &str = "cancelled";

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    /// 0..=100, strictly increasing within one run.
    Progress(u8),
    Completed(PathBuf),
    Failed(String),
}

impl WorkerEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerEvent::Progress(_))
    }

    /// The outcome carried by a terminal event.
    pub fn outcome(&self) -> Option<OperationOutcome> {
        match self {
            WorkerEvent::Progress(_) => None,
            WorkerEvent::Completed(p) => Some(OperationOutcome::Success { output_path: p.clone() }),
            WorkerEvent::Failed(m)    => Some(OperationOutcome::Failure { message: m.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_defaults_resolve_to_whole_file() {
        assert_eq!(ClipParams::default().resolve(42.0), (0.0, 42.0));
        let p = ClipParams { start_seconds: Some(3.0), end_seconds: None };
        assert_eq!(p.resolve(42.0), (3.0, 42.0));
    }

    #[test]
    fn kind_follows_params() {
        let r = OperationRequest {
            inputs:      vec![PathBuf::from("a.mp4")],
            output_path: PathBuf::from("b.mp4"),
            params:      OperationParams::Merge(MergeParams),
        };
        assert_eq!(r.kind(), OperationKind::Merge);
    }

    #[test]
    fn only_terminal_events_carry_outcomes() {
        assert_eq!(WorkerEvent::Progress(50).outcome(), None);
        assert_eq!(
            WorkerEvent::Failed("disk full".into()).outcome(),
            Some(OperationOutcome::Failure { message: "disk full".into() }),
        );
        assert!(WorkerEvent::Completed(PathBuf::from("x")).is_terminal());
    }
}
