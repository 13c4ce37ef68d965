// crates/clipdesk-media/src/worker.rs
//
// OperationWorker: runs one Clip / Merge / Convert request on a dedicated
// thread and relays its lifecycle to the UI thread as WorkerEvents.
//
// Event protocol (per handle, in emission order):
//   Progress(p)*  →  Completed(path) | Failed(msg)
//
//   • Progress values are strictly increasing; a repeat or lower value is
//     dropped by the Reporter before it reaches the channel.
//   • The terminal methods consume the Reporter, so a second terminal event
//     cannot be written.
//   • Every error in the engine chain and every panic inside it end up as a
//     single Failed. A cancelled run fails with CANCELLED.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use clipdesk_core::encoding::{TempAudio, WriteSettings};
use clipdesk_core::operation::{
    ClipParams, ConvertParams, OperationKind, OperationParams, OperationRequest,
    WorkerEvent, WorkerState, CANCELLED,
};
use clipdesk_core::timeline::Timeline;

use crate::engine::{Cancelled, MediaEngine};

/// Called after every event so the UI can schedule a repaint.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

// ── Progress checkpoints ──────────────────────────────────────────────────────

const OPENED_CONVERT: u8 = 25;
const READY_TO_WRITE: u8 = 50;
/// Highest value the write phase may report; 100 is reserved for success.
const WRITE_CEILING:  u8 = 99;
const DONE:           u8 = 100;

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Sending half of one run. Owned by the worker thread.
struct Reporter {
    tx:    Sender<WorkerEvent>,
    last:  Option<u8>,
    state: Arc<Mutex<WorkerState>>,
    waker: Option<Waker>,
}

impl Reporter {
    fn send(&self, event: WorkerEvent) {
        // The UI may have dropped the handle; nothing left to tell.
        let _ = self.tx.send(event);
        if let Some(w) = &self.waker {
            w();
        }
    }

    fn progress(&mut self, p: u8) {
        let p = p.min(DONE);
        if self.last.is_some_and(|last| p <= last) {
            return;
        }
        self.last = Some(p);
        self.send(WorkerEvent::Progress(p));
    }

    fn completed(self, output: PathBuf) {
        *self.state.lock() = WorkerState::Completed;
        self.send(WorkerEvent::Completed(output));
    }

    fn failed(self, message: String) {
        *self.state.lock() = WorkerState::Failed;
        self.send(WorkerEvent::Failed(message));
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Receiving half of one run, held by the tab's controller.
pub struct WorkerHandle {
    pub rx: Receiver<WorkerEvent>,
    kind:   OperationKind,
    cancel: Arc<AtomicBool>,
    state:  Arc<Mutex<WorkerState>>,
}

impl WorkerHandle {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Ask the run to stop. The thread finishes its current frame and then
    /// reports `Failed(CANCELLED)`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

// ── OperationWorker ───────────────────────────────────────────────────────────

/// Spawns runs against a shared engine. Cheap to clone.
#[derive(Clone)]
pub struct OperationWorker {
    engine:     Arc<dyn MediaEngine>,
    temp_audio: TempAudio,
    waker:      Option<Waker>,
}

impl OperationWorker {
    pub fn new(engine: Arc<dyn MediaEngine>, temp_audio: TempAudio) -> Self {
        Self { engine, temp_audio, waker: None }
    }

    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }

    /// Idle → Running. Spawns the run thread and returns immediately.
    pub fn start(&self, request: OperationRequest) -> WorkerHandle {
        let (tx, rx) = unbounded();
        let kind     = request.kind();
        let cancel   = Arc::new(AtomicBool::new(false));
        let state    = Arc::new(Mutex::new(WorkerState::Running));

        let reporter = Reporter {
            tx,
            last:  None,
            state: Arc::clone(&state),
            waker: self.waker.clone(),
        };
        let engine     = Arc::clone(&self.engine);
        let temp_audio = self.temp_audio.clone();
        let flag       = Arc::clone(&cancel);

        tracing::info!("[worker] {kind} started → {}", request.output_path.display());
        thread::spawn(move || run(engine.as_ref(), &request, &flag, &temp_audio, reporter));

        WorkerHandle { rx, kind, cancel, state }
    }
}

// ── Run lifecycle ─────────────────────────────────────────────────────────────

fn run(
    engine:     &dyn MediaEngine,
    request:    &OperationRequest,
    cancel:     &AtomicBool,
    temp_audio: &TempAudio,
    mut reporter: Reporter,
) {
    let kind = request.kind();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = RunCtx { engine, cancel, temp_audio, reporter: &mut reporter };
        match &request.params {
            OperationParams::Clip(p)    => run_clip(&mut ctx, request, p),
            OperationParams::Merge(_)   => run_merge(&mut ctx, request),
            OperationParams::Convert(p) => run_convert(&mut ctx, request, p),
        }
    }));

    match result {
        Ok(Ok(output)) => {
            tracing::info!("[worker] {kind} completed → {}", output.display());
            reporter.completed(output);
        }
        Ok(Err(e)) if e.is::<Cancelled>() => {
            tracing::info!("[worker] {kind} cancelled");
            reporter.failed(CANCELLED.to_string());
        }
        Ok(Err(e)) => {
            let msg = format!("{e:#}");
            tracing::error!("[worker] {kind} failed: {msg}");
            reporter.failed(msg);
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::error!("[worker] {kind} panicked: {msg}");
            reporter.failed(msg);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload.downcast_ref::<&str>().map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into());
    format!("internal error: {detail}")
}

/// What a strategy function may touch.
struct RunCtx<'a> {
    engine:     &'a dyn MediaEngine,
    cancel:     &'a AtomicBool,
    temp_audio: &'a TempAudio,
    reporter:   &'a mut Reporter,
}

impl RunCtx<'_> {
    fn progress(&mut self, p: u8) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Cancelled.into());
        }
        self.reporter.progress(p);
        Ok(())
    }

    /// The output is complete; a cancel arriving now changes nothing.
    fn finished(&mut self) {
        self.reporter.progress(DONE);
    }

    fn open(&self, path: &Path) -> Result<Timeline> {
        self.engine.open(path)
    }

    /// Write phase: engine progress mapped onto READY_TO_WRITE..=WRITE_CEILING.
    fn write(&mut self, timeline: &Timeline, output: &Path, settings: &WriteSettings) -> Result<()> {
        let reporter = &mut *self.reporter;
        let span = f32::from(WRITE_CEILING - READY_TO_WRITE);
        let mut on_progress = |f: f32| {
            let p = READY_TO_WRITE + (f.clamp(0.0, 1.0) * span) as u8;
            reporter.progress(p);
        };
        self.engine.write(timeline, output, settings, self.cancel, &mut on_progress)
    }

    fn fixed_settings(&self) -> WriteSettings {
        WriteSettings::h264_aac(self.temp_audio.clone())
    }
}

// ── Strategies ────────────────────────────────────────────────────────────────

fn single_input(request: &OperationRequest) -> Result<&Path> {
    match request.inputs.as_slice() {
        [one] => Ok(one.as_path()),
        other => anyhow::bail!("{} expects exactly one input, got {}", request.kind(), other.len()),
    }
}

fn run_clip(ctx: &mut RunCtx<'_>, request: &OperationRequest, params: &ClipParams) -> Result<PathBuf> {
    let source = ctx.open(single_input(request)?)?;
    let (start, end) = params.resolve(source.duration());
    ctx.progress(READY_TO_WRITE)?;

    let clip = source.subclip(start, end)?;
    ctx.progress(READY_TO_WRITE)?;

    let settings = ctx.fixed_settings();
    ctx.write(&clip, &request.output_path, &settings)?;
    ctx.finished();
    Ok(request.output_path.clone())
}

fn run_merge(ctx: &mut RunCtx<'_>, request: &OperationRequest) -> Result<PathBuf> {
    if request.inputs.is_empty() {
        anyhow::bail!("nothing to merge");
    }
    let n = request.inputs.len();
    let mut parts = Vec::with_capacity(n);
    for (i, path) in request.inputs.iter().enumerate() {
        parts.push(ctx.open(path)?);
        ctx.progress((i * usize::from(READY_TO_WRITE) / n) as u8)?;
    }

    let merged = Timeline::concatenate(&parts)?;
    ctx.progress(READY_TO_WRITE)?;

    let settings = ctx.fixed_settings();
    ctx.write(&merged, &request.output_path, &settings)?;
    ctx.finished();
    Ok(request.output_path.clone())
}

fn run_convert(ctx: &mut RunCtx<'_>, request: &OperationRequest, params: &ConvertParams) -> Result<PathBuf> {
    let mut timeline = ctx.open(single_input(request)?)?;
    ctx.progress(OPENED_CONVERT)?;

    if params.resize {
        timeline = timeline.resized(params.target_width, params.target_height)?;
    }
    ctx.progress(READY_TO_WRITE)?;

    let settings = WriteSettings {
        video_codec:   params.video_codec.clone(),
        audio_codec:   params.audio_codec.clone(),
        frame_rate:    Some(params.frame_rate),
        video_bitrate: Some(params.video_bitrate),
        audio_bitrate: Some(params.audio_bitrate),
        container:     Some(params.target_container),
        temp_audio:    ctx.temp_audio.clone(),
    };
    ctx.write(&timeline, &request.output_path, &settings)?;
    ctx.finished();
    Ok(request.output_path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use clipdesk_core::encoding::{Bitrate, Container};
    use clipdesk_core::operation::MergeParams;

    use crate::fake::{Call, FakeEngine};

    fn worker(engine: FakeEngine) -> (OperationWorker, Arc<FakeEngine>) {
        let engine = Arc::new(engine);
        let dyn_engine: Arc<dyn MediaEngine> = engine.clone();
        (OperationWorker::new(dyn_engine, TempAudio::default()), engine)
    }

    /// Every event up to and including the terminal one; then checks the
    /// channel closes without anything further.
    fn events(handle: &WorkerHandle) -> Vec<WorkerEvent> {
        let mut out = Vec::new();
        loop {
            let e = handle.rx.recv_timeout(Duration::from_secs(5)).expect("worker went silent");
            let terminal = e.is_terminal();
            out.push(e);
            if terminal { break; }
        }
        assert!(handle.rx.recv_timeout(Duration::from_secs(5)).is_err(), "event after terminal");
        out
    }

    fn progress_of(events: &[WorkerEvent]) -> Vec<u8> {
        events.iter()
            .filter_map(|e| match e { WorkerEvent::Progress(p) => Some(*p), _ => None })
            .collect()
    }

    fn clip(start: f64, end: f64) -> OperationRequest {
        OperationRequest {
            inputs:      vec![PathBuf::from("/v/long.mp4")],
            output_path: PathBuf::from("/v/long_clip.mp4"),
            params:      OperationParams::Clip(ClipParams {
                start_seconds: Some(start),
                end_seconds:   Some(end),
            }),
        }
    }

    fn convert(resize: bool) -> OperationRequest {
        OperationRequest {
            inputs:      vec![PathBuf::from("/v/a.mov")],
            output_path: PathBuf::from("/v/a_converted.mkv"),
            params:      OperationParams::Convert(ConvertParams {
                target_container: Container::Mkv,
                video_codec:      "mpeg4".into(),
                audio_codec:      "mp3".into(),
                frame_rate:       25.0,
                video_bitrate:    Bitrate(5_000_000),
                audio_bitrate:    Bitrate(192_000),
                resize,
                target_width:     1280,
                target_height:    720,
            }),
        }
    }

    #[test]
    fn clip_cuts_requested_range() {
        let (w, engine) = worker(FakeEngine::new().with_duration("/v/long.mp4", 120.0));
        let handle = w.start(clip(10.0, 40.0));
        let ev = events(&handle);

        assert_eq!(ev.last(), Some(&WorkerEvent::Completed(PathBuf::from("/v/long_clip.mp4"))));
        assert_eq!(progress_of(&ev).last(), Some(&100));
        assert_eq!(handle.state(), WorkerState::Completed);

        let writes = engine.writes();
        assert_eq!(writes.len(), 1);
        let (timeline, output, settings) = &writes[0];
        assert!((timeline.duration() - 30.0).abs() < 1e-9);
        assert_eq!(timeline.segments[0].source_offset, 10.0);
        assert_eq!(output, &PathBuf::from("/v/long_clip.mp4"));
        assert_eq!(settings.video_codec, "libx264");
        assert_eq!(settings.audio_codec, "aac");
    }

    #[test]
    fn clip_defaults_cover_whole_file() {
        let (w, engine) = worker(FakeEngine::new().with_duration("/v/long.mp4", 42.0));
        let mut req = clip(0.0, 0.0);
        req.params = OperationParams::Clip(ClipParams::default());
        let ev = events(&w.start(req));
        assert!(matches!(ev.last(), Some(WorkerEvent::Completed(_))));
        assert_eq!(engine.writes()[0].0.duration(), 42.0);
    }

    #[test]
    fn progress_is_strictly_increasing_and_ends_at_100() {
        let (w, _) = worker(FakeEngine::new().with_duration("/v/long.mp4", 120.0));
        let ev = events(&w.start(clip(0.0, 60.0)));
        let p = progress_of(&ev);
        assert!(p.windows(2).all(|w| w[0] < w[1]), "{p:?}");
        assert_eq!(p.first(), Some(&50));
        assert_eq!(p.last(), Some(&100));
        assert!(p.iter().filter(|&&x| x == 99).count() <= 1);
    }

    #[test]
    fn clip_beyond_duration_fails_without_writing() {
        let (w, engine) = worker(FakeEngine::new().with_duration("/v/long.mp4", 20.0));
        let ev = events(&w.start(clip(10.0, 40.0)));
        assert!(matches!(ev.last(), Some(WorkerEvent::Failed(_))));
        assert!(engine.writes().is_empty());
    }

    #[test]
    fn merge_preserves_order_and_sums_durations() {
        let (w, engine) = worker(
            FakeEngine::new()
                .with_duration("/v/1.mp4", 5.0)
                .with_duration("/v/2.mp4", 5.0)
                .with_duration("/v/3.mp4", 5.0),
        );
        let req = OperationRequest {
            inputs:      vec!["/v/3.mp4".into(), "/v/1.mp4".into(), "/v/2.mp4".into()],
            output_path: PathBuf::from("/v/joined.mp4"),
            params:      OperationParams::Merge(MergeParams),
        };
        let ev = events(&w.start(req));

        let p = progress_of(&ev);
        // floor(i / 3 * 50) after each open: 0, 16, 33; then 50.
        assert_eq!(&p[..4], &[0, 16, 33, 50]);
        assert_eq!(p.last(), Some(&100));

        let (timeline, _, _) = &engine.writes()[0];
        assert_eq!(timeline.duration(), 15.0);
        let order: Vec<_> = timeline.segments.iter().map(|s| s.path.clone()).collect();
        assert_eq!(order, vec![PathBuf::from("/v/3.mp4"), "/v/1.mp4".into(), "/v/2.mp4".into()]);
    }

    #[test]
    fn merge_open_failure_is_reported() {
        let (w, engine) = worker(FakeEngine::new().failing_open("/v/2.mp4"));
        let req = OperationRequest {
            inputs:      vec!["/v/1.mp4".into(), "/v/2.mp4".into()],
            output_path: PathBuf::from("/v/out.mp4"),
            params:      OperationParams::Merge(MergeParams),
        };
        let ev = events(&w.start(req));
        match ev.last() {
            Some(WorkerEvent::Failed(msg)) => assert!(msg.contains("/v/2.mp4")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(engine.writes().is_empty());
    }

    #[test]
    fn convert_resizes_only_when_asked() {
        let (w, engine) = worker(FakeEngine::new());
        events(&w.start(convert(true)));
        events(&w.start(convert(false)));

        let writes = engine.writes();
        assert_eq!((writes[0].0.width, writes[0].0.height), (1280, 720));
        assert_eq!((writes[1].0.width, writes[1].0.height), (1920, 1080));

        let s = &writes[0].2;
        assert_eq!(s.container, Some(Container::Mkv));
        assert_eq!(s.frame_rate, Some(25.0));
        assert_eq!(s.video_bitrate, Some(Bitrate(5_000_000)));
        assert_eq!(s.audio_codec, "mp3");
    }

    #[test]
    fn convert_checkpoints() {
        let (w, _) = worker(FakeEngine::new());
        let p = progress_of(&events(&w.start(convert(false))));
        assert_eq!(&p[..2], &[25, 50]);
        assert_eq!(p.last(), Some(&100));
    }

    #[test]
    fn write_failure_is_one_failed_event() {
        let (w, _) = worker(FakeEngine::new().failing_write("disk full"));
        let handle = w.start(clip(0.0, 5.0));
        let ev = events(&handle);
        let terminals: Vec<_> = ev.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminals, vec![&WorkerEvent::Failed("disk full".into())]);
        assert!(!progress_of(&ev).contains(&100));
        assert_eq!(handle.state(), WorkerState::Failed);
    }

    #[test]
    fn engine_panic_becomes_failure() {
        let (w, _) = worker(FakeEngine::new().panicking_write());
        let ev = events(&w.start(clip(0.0, 5.0)));
        match ev.last() {
            Some(WorkerEvent::Failed(msg)) => assert!(msg.contains("encoder exploded")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn cancel_stops_a_running_write() {
        let (w, engine) = worker(FakeEngine::new().holding_write());
        let handle = w.start(clip(0.0, 5.0));
        // Wait until the write is underway.
        while engine.writes().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        handle.cancel();
        let ev = events(&handle);
        assert_eq!(ev.last(), Some(&WorkerEvent::Failed(CANCELLED.into())));
        assert!(matches!(engine.calls()[0], Call::Open(_)));
    }

    #[test]
    fn cancel_after_a_finished_write_still_completes() {
        let (w, _) = worker(FakeEngine::new().cancelling_after_write());
        let handle = w.start(clip(0.0, 5.0));
        let ev = events(&handle);
        assert_eq!(ev.last(), Some(&WorkerEvent::Completed(PathBuf::from("/v/long_clip.mp4"))));
        assert_eq!(progress_of(&ev).last(), Some(&100));
        assert_eq!(handle.state(), WorkerState::Completed);
    }

    #[test]
    fn waker_fires_per_event() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let (w, _) = worker(FakeEngine::new());
        let w = w.with_waker(Arc::new(move || { h.fetch_add(1, Ordering::SeqCst); }));
        let ev = events(&w.start(convert(false)));
        assert_eq!(hits.load(Ordering::SeqCst), ev.len());
    }

    #[test]
    fn reporter_drops_repeats_and_regressions() {
        let (tx, rx) = unbounded();
        let mut r = Reporter {
            tx,
            last:  None,
            state: Arc::new(Mutex::new(WorkerState::Running)),
            waker: None,
        };
        for p in [0, 0, 50, 50, 30, 120] {
            r.progress(p);
        }
        r.completed(PathBuf::from("out.mp4"));
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, vec![
            WorkerEvent::Progress(0),
            WorkerEvent::Progress(50),
            WorkerEvent::Progress(100),
            WorkerEvent::Completed(PathBuf::from("out.mp4")),
        ]);
    }
}
