// crates/clipdesk-media/src/engine.rs
//
// The seam between the operation worker and the media library.
//
// Only two calls touch files: `open` (read a source into a lazy Timeline)
// and `write` (render a Timeline to a container). Cutting, joining and
// resizing are pure Timeline edits in clipdesk-core, so the worker's
// per-kind algorithms run unchanged against a fake engine in tests.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use thiserror::Error;

use clipdesk_core::encoding::WriteSettings;
use clipdesk_core::timeline::{Segment, Timeline};

use crate::encode::write_timeline;
use crate::probe::inspect;

/// Returned (inside `anyhow::Error`) when a write stops because the cancel
/// flag was raised.
#[derive(Debug, Error)]
#[error("cancelled")]
pub struct Cancelled;

pub trait MediaEngine: Send + Sync + 'static {
    /// Whole-file timeline for `path`: one segment, source geometry and rate.
    fn open(&self, path: &Path) -> Result<Timeline>;

    /// Render `timeline` to `output`. Blocking. Polls `cancel` between frames
    /// and reports completion as a 0.0..=1.0 fraction through `progress`.
    fn write(
        &self,
        timeline: &Timeline,
        output:   &Path,
        settings: &WriteSettings,
        cancel:   &AtomicBool,
        progress: &mut dyn FnMut(f32),
    ) -> Result<()>;
}

/// Production engine backed by the statically linked FFmpeg.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegEngine;

impl MediaEngine for FfmpegEngine {
    fn open(&self, path: &Path) -> Result<Timeline> {
        let (desc, has_audio) = inspect(path)?;
        tracing::debug!("[engine] opened {} ({:.2}s, audio: {has_audio})", path.display(), desc.duration_seconds);
        Ok(Timeline::single(
            Segment {
                path:          desc.path,
                source_offset: 0.0,
                duration:      desc.duration_seconds,
                has_audio,
            },
            desc.width,
            desc.height,
            desc.frame_rate,
        ))
    }

    fn write(
        &self,
        timeline: &Timeline,
        output:   &Path,
        settings: &WriteSettings,
        cancel:   &AtomicBool,
        progress: &mut dyn FnMut(f32),
    ) -> Result<()> {
        write_timeline(timeline, output, settings, cancel, progress)
    }
}
