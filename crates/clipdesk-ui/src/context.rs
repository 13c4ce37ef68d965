// crates/clipdesk-ui/src/context.rs
//
// AppContext owns every runtime handle that is NOT part of EditorState:
//
//   AppContext
//     ├── prober  : background media probes, results on prober.rx
//     ├── clip     ┐
//     ├── merge    ├ one OperationController per tab, sharing one worker
//     ├── convert  ┘
//     └── preview  : Clip tab frames, paced by `playback`
//
// The prober, the worker and the preview thread wake the egui context
// whenever they send, so the UI repaints as soon as there is something to
// show.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;

use clipdesk_core::encoding::TempAudio;
use clipdesk_core::operation::{OperationKind, OperationOutcome};
use clipdesk_core::state::{ClipTabState, EditorState};
use clipdesk_media::worker::Waker;
use clipdesk_media::{
    FfmpegEngine, MediaProber, OperationController, OperationWorker, PreviewFrame, PreviewPlayer,
};

use crate::playback::Playback;

/// Play from the top again when started this close to the end.
const REPLAY_FROM_END_SECS: f64 = 0.05;

pub struct AppContext {
    pub prober: MediaProber,
    clip:       OperationController,
    merge:      OperationController,
    convert:    OperationController,
    preview:    PreviewPlayer,
    playback:   Playback,
}

impl AppContext {
    pub fn new(ctx: &egui::Context, temp_audio: TempAudio) -> Self {
        let repaint = ctx.clone();
        let waker: Waker = Arc::new(move || repaint.request_repaint());

        let worker = OperationWorker::new(Arc::new(FfmpegEngine), temp_audio)
            .with_waker(Arc::clone(&waker));

        Self {
            prober:   MediaProber::new(Some(Arc::clone(&waker))),
            preview:  PreviewPlayer::new(Some(waker)),
            playback: Playback::default(),
            clip:     OperationController::new(OperationKind::Clip, worker.clone()),
            merge:    OperationController::new(OperationKind::Merge, worker.clone()),
            convert:  OperationController::new(OperationKind::Convert, worker),
        }
    }

    pub fn controller(&self, kind: OperationKind) -> &OperationController {
        match kind {
            OperationKind::Clip    => &self.clip,
            OperationKind::Merge   => &self.merge,
            OperationKind::Convert => &self.convert,
        }
    }

    pub fn controller_mut(&mut self, kind: OperationKind) -> &mut OperationController {
        match kind {
            OperationKind::Clip    => &mut self.clip,
            OperationKind::Merge   => &mut self.merge,
            OperationKind::Convert => &mut self.convert,
        }
    }

    pub fn any_busy(&self) -> bool {
        self.clip.is_busy() || self.merge.is_busy() || self.convert.is_busy()
    }

    pub fn cancel_all(&self) {
        self.clip.cancel();
        self.merge.cancel();
        self.convert.cancel();
    }

    /// Route finished probes into the tab that asked for them.
    pub fn ingest_probe_results(&mut self, state: &mut EditorState) {
        while let Ok(res) = self.prober.rx.try_recv() {
            let outcome = res.result.map_err(|e| e.to_string());
            state.apply_probe(res.target, &res.path, outcome);
        }
    }

    /// Drain worker events for all three tabs.
    pub fn poll_operations(&mut self) {
        for kind in [OperationKind::Clip, OperationKind::Merge, OperationKind::Convert] {
            match self.controller_mut(kind).poll() {
                Some(OperationOutcome::Success { output_path }) => log_completed(kind, &output_path),
                Some(OperationOutcome::Failure { message }) => {
                    tracing::warn!("[app] {kind} failed: {message}");
                }
                None => {}
            }
        }
    }
}

// ── Clip preview ──────────────────────────────────────────────────────────────

impl AppContext {
    /// Show the frame under the playhead, resuming playback from there if it
    /// was running.
    pub fn seek_preview(&mut self, clip: &mut ClipTabState, secs: f64) {
        let Some(path) = clip.input.clone() else { return };
        let at = clip.seek(secs);
        if clip.playing {
            self.playback.start(at, Instant::now());
            self.preview.play(path, at);
        } else {
            self.preview.show(path, at);
        }
    }

    pub fn play_preview(&mut self, clip: &mut ClipTabState) {
        let Some(path) = clip.input.clone() else { return };
        if clip.playing {
            return;
        }
        if clip.duration().is_some_and(|d| clip.playhead_secs >= d - REPLAY_FROM_END_SECS) {
            clip.seek(0.0);
        }
        clip.playing = true;
        self.playback.start(clip.playhead_secs, Instant::now());
        self.preview.play(path, clip.playhead_secs);
        tracing::debug!("[preview] play from {:.2}s", clip.playhead_secs);
    }

    pub fn pause_preview(&mut self, clip: &mut ClipTabState) {
        clip.playing = false;
        self.playback.stop();
        self.preview.pause();
    }

    /// Advance the playhead with the clock and hand back the frame to show,
    /// if a new one is due. Playback stops at the end of the file.
    pub fn poll_preview(&mut self, clip: &mut ClipTabState) -> Option<PreviewFrame> {
        let now = Instant::now();
        if clip.playing {
            if let Some(pos) = self.playback.position(now) {
                clip.seek(pos);
                if clip.duration().is_some_and(|d| pos >= d) {
                    self.pause_preview(clip);
                }
            }
        }
        let rx = &self.preview.rx;
        self.playback.take_due(|| rx.try_recv().ok(), clip.input.as_deref(), now)
    }
}

fn log_completed(kind: OperationKind, path: &Path) {
    tracing::info!("[app] {kind} wrote {}", path.display());
}
