// crates/clipdesk-media/src/probe.rs
//
// In-process FFmpeg probing: container, dimensions, frame rate, duration.
//
// Metadata only. The demuxer header is read, no packet is ever decoded, so a
// probe of a multi-gigabyte file returns as fast as one of a short clip.
// The input context is dropped before `probe` returns on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::media::Type;
use ffmpeg::util::rational::Rational;

use clipdesk_core::media_types::{container_of, MediaDescriptor};
use clipdesk_core::state::ProbeTarget;

use crate::worker::Waker;

/// Upper bound on probe threads doing FFmpeg work at the same time.
const PROBE_CONCURRENCY: u32 = 4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("cannot open '{}': {reason}", .path.display())]
    Open { path: PathBuf, reason: String },
    #[error("no video stream in '{}'", .0.display())]
    NoVideoStream(PathBuf),
    #[error("no frames in '{}'", .0.display())]
    NoFrames(PathBuf),
}

// ── Synchronous probe ─────────────────────────────────────────────────────────

/// What the demuxer header says about the best video stream.
#[derive(Debug, Clone, Default)]
struct StreamFacts {
    width:          u32,
    height:         u32,
    /// Average frame rate; 0 when the container leaves it unset.
    avg_rate:       f64,
    /// Real base frame rate; fallback for `avg_rate`.
    base_rate:      f64,
    /// Recorded frame count; 0 when the container does not store one.
    frames:         i64,
    stream_secs:    f64,
    container_secs: f64,
    demuxer:        String,
    file_size:      u64,
    has_audio:      bool,
}

pub fn probe(path: &Path) -> Result<MediaDescriptor, ProbeError> {
    inspect(path).map(|(desc, _)| desc)
}

/// Descriptor plus whether the file carries an audio stream.
pub(crate) fn inspect(path: &Path) -> Result<(MediaDescriptor, bool), ProbeError> {
    let facts = read_facts(path)?;
    let desc  = describe(path, &facts)?;
    tracing::debug!(
        "[probe] {} {}x{} {:.3}fps {:.2}s ← {}",
        desc.container_format, desc.width, desc.height,
        desc.frame_rate, desc.duration_seconds, path.display(),
    );
    Ok((desc, facts.has_audio))
}

fn read_facts(path: &Path) -> Result<StreamFacts, ProbeError> {
    let ictx = input(path).map_err(|e| ProbeError::Open {
        path:   path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let stream = ictx.streams().best(Type::Video)
        .ok_or_else(|| ProbeError::NoVideoStream(path.to_path_buf()))?;

    let (width, height) = display_size(&stream);

    let tb = stream.time_base();
    let stream_secs = if stream.duration() > 0 {
        stream.duration() as f64 * rational_f64(tb)
    } else {
        0.0
    };
    let container_secs = if ictx.duration() > 0 {
        ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    } else {
        0.0
    };

    Ok(StreamFacts {
        width,
        height,
        avg_rate:  rational_f64(stream.avg_frame_rate()),
        base_rate: rational_f64(stream.rate()),
        frames:    stream.frames(),
        stream_secs,
        container_secs,
        demuxer:   ictx.format().name().to_string(),
        file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        has_audio: ictx.streams().best(Type::Audio).is_some(),
    })
}

/// Display dimensions from codecpar: visible pixels, without the macroblock
/// padding a decoded frame carries. No decoder is opened.
pub(crate) fn display_size(stream: &ffmpeg::format::stream::Stream<'_>) -> (u32, u32) {
    unsafe {
        let p = stream.parameters().as_ptr();
        ((*p).width.max(0) as u32, (*p).height.max(0) as u32)
    }
}

/// Turns header facts into a descriptor. Pure so the arithmetic is testable
/// without media fixtures.
fn describe(path: &Path, f: &StreamFacts) -> Result<MediaDescriptor, ProbeError> {
    let frame_rate = if f.avg_rate > 0.0 { f.avg_rate } else { f.base_rate };

    let frames = if f.frames > 0 {
        f.frames as f64
    } else {
        // Matroska and friends record no count: estimate from duration.
        let secs = if f.stream_secs > 0.0 { f.stream_secs } else { f.container_secs };
        (secs * frame_rate).round()
    };
    if frames <= 0.0 {
        return Err(ProbeError::NoFrames(path.to_path_buf()));
    }

    let duration_seconds = if frame_rate > 0.0 { frames / frame_rate } else { 0.0 };
    let estimated_bitrate_kbps = if duration_seconds > 0.0 {
        ((f.file_size as f64 * 8.0) / (duration_seconds * 1000.0)) as u64
    } else {
        0
    };

    Ok(MediaDescriptor {
        path:             path.to_path_buf(),
        container_format: container_of(path).unwrap_or_else(|| f.demuxer.to_uppercase()),
        width:            f.width,
        height:           f.height,
        frame_rate,
        duration_seconds,
        estimated_bitrate_kbps,
    })
}

/// Rational → f64 with unset (`0/0`, `x/0`) values collapsing to 0.
pub(crate) fn rational_f64(r: Rational) -> f64 {
    if r.numerator() <= 0 || r.denominator() <= 0 {
        0.0
    } else {
        r.numerator() as f64 / r.denominator() as f64
    }
}

// ── Asynchronous prober ───────────────────────────────────────────────────────

pub struct ProbeResult {
    pub target: ProbeTarget,
    pub path:   PathBuf,
    pub result: Result<MediaDescriptor, ProbeError>,
}

type ProbeFn = Arc<dyn Fn(&Path) -> Result<MediaDescriptor, ProbeError> + Send + Sync>;

/// Runs probes off the UI thread. Results come back on `rx` in completion
/// order, tagged with the slot that asked.
pub struct MediaProber {
    pub rx:   Receiver<ProbeResult>,
    tx:       Sender<ProbeResult>,
    probe_fn: ProbeFn,
    /// (active_count, Condvar). Max = PROBE_CONCURRENCY.
    gate:     Arc<(Mutex<u32>, Condvar)>,
    waker:    Option<Waker>,
}

impl MediaProber {
    pub fn new(waker: Option<Waker>) -> Self {
        Self::with_probe(Arc::new(|p: &Path| probe(p)), waker)
    }

    pub(crate) fn with_probe(probe_fn: ProbeFn, waker: Option<Waker>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            rx,
            tx,
            probe_fn,
            gate: Arc::new((Mutex::new(0), Condvar::new())),
            waker,
        }
    }

    pub fn probe(&self, target: ProbeTarget, path: PathBuf) {
        let tx       = self.tx.clone();
        let gate     = Arc::clone(&self.gate);
        let probe_fn = Arc::clone(&self.probe_fn);
        let waker    = self.waker.clone();

        thread::spawn(move || {
            {
                let (lock, cvar) = &*gate;
                let mut count = lock.lock();
                while *count >= PROBE_CONCURRENCY {
                    cvar.wait(&mut count);
                }
                *count += 1;
            }
            // Releases the slot even if the probe panics.
            struct GateGuard(Arc<(Mutex<u32>, Condvar)>);
            impl Drop for GateGuard {
                fn drop(&mut self) {
                    let (lock, cvar) = &*self.0;
                    *lock.lock() -= 1;
                    cvar.notify_one();
                }
            }
            let guard = GateGuard(gate);

            let result = probe_fn(&path);
            drop(guard);

            if let Err(e) = &result {
                tracing::warn!("[probe] {e}");
            }
            let _ = tx.send(ProbeResult { target, path, result });
            if let Some(w) = waker {
                w();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn facts() -> StreamFacts {
        StreamFacts {
            width:          1920,
            height:         1080,
            avg_rate:       30.0,
            base_rate:      30.0,
            frames:         3600,
            stream_secs:    120.0,
            container_secs: 120.0,
            demuxer:        "mov,mp4,m4a,3gp,3g2,mj2".into(),
            file_size:      60_000_000,
            has_audio:      true,
        }
    }

    #[test]
    fn duration_is_frames_over_rate() {
        let d = describe(Path::new("/v/a.mp4"), &facts()).unwrap();
        assert_eq!(d.container_format, "MP4");
        assert_eq!(d.duration_seconds, 120.0);
        assert_eq!(d.frame_rate, 30.0);
        // 60 MB * 8 / 120 s / 1000
        assert_eq!(d.estimated_bitrate_kbps, 4000);
    }

    #[test]
    fn missing_frame_count_is_estimated() {
        let f = StreamFacts { frames: 0, stream_secs: 0.0, container_secs: 10.0, ..facts() };
        let d = describe(Path::new("/v/a.mkv"), &f).unwrap();
        assert_eq!(d.duration_seconds, 10.0);
        assert_eq!(d.container_format, "MKV");
    }

    #[test]
    fn average_rate_falls_back_to_base_rate() {
        let f = StreamFacts { avg_rate: 0.0, base_rate: 25.0, frames: 250, ..facts() };
        let d = describe(Path::new("/v/a.avi"), &f).unwrap();
        assert_eq!(d.frame_rate, 25.0);
        assert_eq!(d.duration_seconds, 10.0);
    }

    #[test]
    fn zero_frames_is_an_error() {
        let f = StreamFacts { frames: 0, stream_secs: 0.0, container_secs: 0.0, ..facts() };
        assert_eq!(
            describe(Path::new("/v/a.mp4"), &f),
            Err(ProbeError::NoFrames(PathBuf::from("/v/a.mp4"))),
        );
    }

    #[test]
    fn unknown_rate_gives_zero_duration_and_bitrate() {
        let f = StreamFacts { avg_rate: 0.0, base_rate: 0.0, ..facts() };
        let d = describe(Path::new("/v/a.mp4"), &f).unwrap();
        assert_eq!(d.duration_seconds, 0.0);
        assert_eq!(d.estimated_bitrate_kbps, 0);
    }

    #[test]
    fn extensionless_path_uses_demuxer_name() {
        let d = describe(Path::new("/v/capture"), &facts()).unwrap();
        assert_eq!(d.container_format, "MOV,MP4,M4A,3GP,3G2,MJ2");
    }

    #[test]
    fn unset_rationals_collapse_to_zero() {
        assert_eq!(rational_f64(Rational::new(0, 0)), 0.0);
        assert_eq!(rational_f64(Rational::new(30000, 1001)), 30000.0 / 1001.0);
    }

    #[test]
    fn prober_tags_results_and_limits_concurrency() {
        let active = Arc::new(AtomicU32::new(0));
        let peak   = Arc::new(AtomicU32::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let prober = MediaProber::with_probe(
            Arc::new(move |path: &Path| {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                a.fetch_sub(1, Ordering::SeqCst);
                Err(ProbeError::NoVideoStream(path.to_path_buf()))
            }),
            None,
        );

        for i in 0..10 {
            prober.probe(ProbeTarget::Clip, PathBuf::from(format!("{i}.mp4")));
        }
        let mut seen: Vec<PathBuf> = (0..10)
            .map(|_| prober.rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .inspect(|r| assert_eq!(r.target, ProbeTarget::Clip))
            .map(|r| r.path)
            .collect();
        seen.sort();
        assert_eq!(seen.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= PROBE_CONCURRENCY);
    }

    #[test]
    fn text_file_is_not_a_video() {
        crate::init().unwrap();
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, "shopping list: milk, eggs").unwrap();
        let err = probe(&path).unwrap_err();
        assert!(matches!(err, ProbeError::Open { .. } | ProbeError::NoVideoStream(_)));
    }

    #[test]
    fn missing_file_fails_to_open() {
        crate::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = probe(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(matches!(err, ProbeError::Open { .. }));
    }
}
