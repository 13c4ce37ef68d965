// crates/clipdesk-media/src/preview.rs
//
// Clip tab preview: RGBA frames for a scrub position or a playback run.
//
//   PreviewPlayer ──cmds──▶ preview thread ──PreviewFrame──▶ rx (bounded)
//
// One thread owns a FrameDecoder and reuses it while requests move forward
// by small steps; a different file, any backward move or a jump of more than
// REOPEN_AHEAD_SECS reopens and seeks instead. Commands are latest-wins: a
// burst of scrub positions decodes only the newest.
//
// Playback decodes ahead into the bounded channel; a full channel blocks the
// thread, which is the rate limit. The UI releases frames against its own
// clock (clipdesk-ui playback.rs). Preview is video only.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context as _, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;

use crate::helpers::seek::{media_origin, seek_target, seek_to_secs, ticks_to_secs};
use crate::probe::display_size;
use crate::worker::Waker;

/// Preview frames are scaled down to at most this width.
const PREVIEW_MAX_W: u32 = 640;
/// Frames decoded ahead of the UI while playing (~1 s at 30 fps).
const PLAYBACK_LOOKAHEAD: usize = 32;
/// Forward moves further than this reopen and seek instead of decoding on.
const REOPEN_AHEAD_SECS: f64 = 2.0;
/// A frame this close before the target counts as the target.
const TARGET_SLACK_SECS: f64 = 0.001;

#[derive(Clone, Debug)]
pub struct PreviewFrame {
    pub path:   PathBuf,
    /// Content time of the frame, seconds from the file's first frame.
    pub secs:   f64,
    pub width:  u32,
    pub height: u32,
    pub rgba:   Vec<u8>,
}

enum PreviewCmd {
    /// One frame at `secs`, then idle.
    Show { path: PathBuf, secs: f64 },
    /// Frames from `secs` onward until paused or the file ends.
    Play { path: PathBuf, secs: f64 },
    Pause,
}

// ── Player ────────────────────────────────────────────────────────────────────

pub struct PreviewPlayer {
    pub rx: Receiver<PreviewFrame>,
    cmd_tx: Sender<PreviewCmd>,
}

impl PreviewPlayer {
    pub fn new(waker: Option<Waker>) -> Self {
        let (cmd_tx, cmd_rx) = unbounded();
        let (frame_tx, rx)   = bounded(PLAYBACK_LOOKAHEAD);
        thread::spawn(move || preview_loop(&cmd_rx, &frame_tx, waker.as_ref()));
        Self { rx, cmd_tx }
    }

    /// Decode the single frame at `secs` (scrub / seek while paused).
    pub fn show(&self, path: PathBuf, secs: f64) {
        self.flush();
        let _ = self.cmd_tx.send(PreviewCmd::Show { path, secs });
    }

    /// Stream frames from `secs`. Frames of any earlier request are dropped.
    pub fn play(&self, path: PathBuf, secs: f64) {
        self.flush();
        let _ = self.cmd_tx.send(PreviewCmd::Play { path, secs });
    }

    pub fn pause(&self) {
        let _ = self.cmd_tx.send(PreviewCmd::Pause);
    }

    fn flush(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

// ── Thread ────────────────────────────────────────────────────────────────────

/// Runs until the player (and with it the command sender) is dropped.
fn preview_loop(cmds: &Receiver<PreviewCmd>, frames: &Sender<PreviewFrame>, waker: Option<&Waker>) {
    let mut live:    Option<FrameDecoder> = None;
    let mut playing  = false;
    let mut queued:  Option<PreviewCmd> = None;

    let deliver = |frame: PreviewFrame| -> bool {
        if frames.send(frame).is_err() {
            return false;
        }
        if let Some(w) = waker { w(); }
        true
    };

    loop {
        let next = match queued.take() {
            Some(cmd) => Some(cmd),
            None if playing => match cmds.try_recv() {
                Ok(cmd)                          => Some(cmd),
                Err(TryRecvError::Empty)         => None,
                Err(TryRecvError::Disconnected)  => return,
            },
            None => match cmds.recv() {
                Ok(cmd) => Some(cmd),
                Err(_)  => return,
            },
        };

        if let Some(cmd) = next {
            // Latest wins.
            let cmd = cmds.try_iter().last().unwrap_or(cmd);
            match cmd {
                PreviewCmd::Pause => playing = false,
                PreviewCmd::Show { path, secs } => {
                    playing = false;
                    if let Some(f) = frame_at(&mut live, &path, secs) {
                        if !deliver(f) { return; }
                    }
                }
                PreviewCmd::Play { path, secs } => {
                    playing = match frame_at(&mut live, &path, secs) {
                        Some(f) => deliver(f),
                        None    => false,
                    };
                }
            }
            continue;
        }

        let Some(frame) = live.as_mut().and_then(FrameDecoder::next_rgba) else {
            tracing::debug!("[preview] playback reached end of file");
            playing = false;
            continue;
        };
        select! {
            send(frames, frame) -> sent => {
                if sent.is_err() { return; }
                if let Some(w) = waker { w(); }
            }
            recv(cmds) -> cmd => match cmd {
                Ok(cmd) => queued = Some(cmd),
                Err(_)  => return,
            },
        }
    }
}

/// Frame at `secs` in `path`, reusing the live decoder when it can get there
/// by decoding forward.
fn frame_at(live: &mut Option<FrameDecoder>, path: &Path, secs: f64) -> Option<PreviewFrame> {
    let reuse = live.as_ref().is_some_and(|d| !needs_reopen(&d.path, d.last_secs, path, secs));
    if !reuse {
        match FrameDecoder::open(path, secs) {
            Ok(d) => *live = Some(d),
            Err(e) => {
                tracing::warn!("[preview] {}: {e:#}", path.display());
                *live = None;
                return None;
            }
        }
    }
    live.as_mut()?.frame_at(secs)
}

/// Whether a decoder sitting at `last_secs` in `current` must reopen to
/// reach `target` in `path`.
fn needs_reopen(current: &Path, last_secs: f64, path: &Path, target: f64) -> bool {
    current != path
        || target <= last_secs
        || target > last_secs + REOPEN_AHEAD_SECS
}

/// Largest even size no wider than PREVIEW_MAX_W with the source's shape.
fn preview_size(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (PREVIEW_MAX_W, PREVIEW_MAX_W * 9 / 16);
    }
    let even = |v: u32| (v & !1).max(2);
    if width <= PREVIEW_MAX_W {
        return (even(width), even(height));
    }
    let h = (f64::from(PREVIEW_MAX_W) * f64::from(height) / f64::from(width)).round() as u32;
    (PREVIEW_MAX_W, even(h))
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Sequential decoder over one file's best video stream.
struct FrameDecoder {
    path:      PathBuf,
    ictx:      ffmpeg::format::context::Input,
    decoder:   ffmpeg::decoder::Video,
    video_idx: usize,
    tb:        Rational,
    origin:    f64,
    out_w:     u32,
    out_h:     u32,
    /// Built on the first frame, once the decoder's pixel format is known.
    scaler:    Option<ScaleCtx>,
    /// Content time of the last decoded frame.
    last_secs: f64,
    eof:       bool,
}

impl FrameDecoder {
    fn open(path: &Path, secs: f64) -> Result<Self> {
        let mut ictx = input(path).with_context(|| format!("open '{}'", path.display()))?;
        let origin = media_origin(&ictx);

        let (video_idx, tb, (w, h), decoder) = {
            let stream = ictx.streams().best(MediaType::Video)
                .ok_or_else(|| anyhow!("no video stream"))?;
            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .context("video decoder context")?
                .decoder().video()
                .context("open video decoder")?;
            (stream.index(), stream.time_base(), display_size(&stream), decoder)
        };

        seek_to_secs(&mut ictx, seek_target(secs, origin), "preview");

        let (out_w, out_h) = preview_size(w, h);
        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            video_idx,
            tb,
            origin,
            out_w,
            out_h,
            scaler: None,
            last_secs: f64::NEG_INFINITY,
            eof: false,
        })
    }

    /// Next decoded frame and its content time; `None` once drained.
    fn decode_next(&mut self) -> Option<(VideoFrame, f64)> {
        let mut decoded = VideoFrame::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let secs = decoded.timestamp().or(decoded.pts())
                    .map(|ts| ticks_to_secs(ts, self.tb) - self.origin)
                    .unwrap_or(self.last_secs.max(0.0));
                self.last_secs = secs;
                return Some((decoded, secs));
            }
            if self.eof {
                return None;
            }
            let idx = self.video_idx;
            let packet = self.ictx.packets()
                .flatten()
                .find(|(stream, _)| stream.index() == idx)
                .map(|(_, packet)| packet);
            match packet {
                Some(packet) => { let _ = self.decoder.send_packet(&packet); }
                None => {
                    let _ = self.decoder.send_eof();
                    self.eof = true;
                }
            }
        }
    }

    /// First frame at or after `secs`; the last frame when the file ends
    /// before it. Earlier frames are decoded but never scaled.
    fn frame_at(&mut self, secs: f64) -> Option<PreviewFrame> {
        let mut last = None;
        while let Some((frame, t)) = self.decode_next() {
            if t >= secs - TARGET_SLACK_SECS {
                return self.to_rgba(&frame, t);
            }
            last = Some((frame, t));
        }
        let (frame, t) = last?;
        self.to_rgba(&frame, t)
    }

    fn next_rgba(&mut self) -> Option<PreviewFrame> {
        let (frame, t) = self.decode_next()?;
        self.to_rgba(&frame, t)
    }

    fn to_rgba(&mut self, frame: &VideoFrame, secs: f64) -> Option<PreviewFrame> {
        if self.scaler.is_none() {
            match ScaleCtx::get(
                frame.format(), frame.width(), frame.height(),
                Pixel::RGBA,    self.out_w,    self.out_h,
                ScaleFlags::BILINEAR,
            ) {
                Ok(sc) => self.scaler = Some(sc),
                Err(e) => {
                    tracing::warn!("[preview] swscale: {e}");
                    return None;
                }
            }
        }
        let mut out = VideoFrame::empty();
        self.scaler.as_mut()?.run(frame, &mut out).ok()?;

        let stride = out.stride(0);
        let row    = self.out_w as usize * 4;
        let raw    = out.data(0);
        let rgba: Vec<u8> = (0..self.out_h as usize)
            .flat_map(|y| &raw[y * stride..y * stride + row])
            .copied()
            .collect();

        Some(PreviewFrame {
            path:   self.path.clone(),
            secs,
            width:  self.out_w,
            height: self.out_h,
            rgba,
        })
    }
}
