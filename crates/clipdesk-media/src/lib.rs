// crates/clipdesk-media/src/lib.rs
//
// No egui dependency; communicates with clipdesk-ui via channels only.
//
// To add a new operation kind:
//   1. Add a variant to `OperationParams` in clipdesk-core
//   2. Add a strategy function in worker.rs and one match arm in `run`
//   3. Add a request builder in clipdesk-core's validate.rs

pub mod audio;
pub mod controller;
pub mod encode;
pub mod engine;
mod helpers;
pub mod preview;
pub mod probe;
pub mod worker;

#[cfg(test)]
mod fake;
#[cfg(test)]
mod synth;

// Re-export the main public API so clipdesk-ui imports are simple.
pub use controller::{Notice, NoticeKind, OperationController};
pub use engine::{FfmpegEngine, MediaEngine};
pub use preview::{PreviewFrame, PreviewPlayer};
pub use probe::{probe, MediaProber, ProbeError, ProbeResult};
pub use worker::{OperationWorker, WorkerHandle};

/// Initialise FFmpeg and quiet its stderr logging. Call once from main.
pub fn init() -> anyhow::Result<()> {
    use ffmpeg_the_third as ffmpeg;
    ffmpeg::init().map_err(|e| anyhow::anyhow!("FFmpeg init failed: {e}"))?;
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    Ok(())
}
