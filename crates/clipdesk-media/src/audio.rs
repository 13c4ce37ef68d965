// crates/clipdesk-media/src/audio.rs
//
// Temp audio side-file: the whole timeline's audio decoded up front into one
// WAV spool, then streamed back into the audio encoder while video is written.
//
// Layout: 44100 Hz, stereo, interleaved f32le (WAV format tag 3 = IEEE_FLOAT).
// Each segment contributes exactly round(duration × 44100) sample frames,
// silence-padded or truncated, so audio never drifts against the video grid
// across a concatenation.
//
// The file is named `clipdesk-temp-audio-<uuid>.wav` in `TempAudio::dir` and
// removed when the last handle to it drops, if `TempAudio::remove` is set.
// Only a killed process leaves it behind.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Context as _, Result};
use uuid::Uuid;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;

use clipdesk_core::encoding::TempAudio;
use clipdesk_core::timeline::Segment;

use crate::engine::Cancelled;
use crate::helpers::seek::{media_origin, seek_target, seek_to_secs};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS:    u16 = 2;

const OUT_FMT:    Sample        = Sample::F32(SampleType::Packed);
const OUT_LAYOUT: ChannelLayout = ChannelLayout::STEREO;

const BITS:         u16 = 32;
const FORMAT_FLOAT: u16 = 3;
const BLOCK_ALIGN:  u16 = CHANNELS * (BITS / 8); // 8 bytes per stereo frame
const HEADER_LEN:   u64 = 44;

/// Sample frames a segment of `duration` seconds occupies in the spool.
pub fn samples_for(duration: f64) -> u64 {
    (duration.max(0.0) * SAMPLE_RATE as f64).round() as u64
}

// ── File ownership ────────────────────────────────────────────────────────────

/// Owns the spool's path; deletes the file on drop when asked to.
struct SpoolFile {
    path:   PathBuf,
    remove: bool,
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if !self.remove { return; }
        match std::fs::remove_file(&self.path) {
            Ok(())  => tracing::debug!("[audio] removed temp audio {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e)  => tracing::warn!("[audio] could not remove {}: {e}", self.path.display()),
        }
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

pub struct SpoolWriter {
    file:   SpoolFile,
    out:    BufWriter<File>,
    frames: u64,
}

impl SpoolWriter {
    /// Create the spool with a placeholder header; sizes are patched by `finish`.
    pub fn create(cfg: &TempAudio) -> Result<Self> {
        let path = cfg.dir.join(format!("clipdesk-temp-audio-{}.wav", Uuid::new_v4()));
        let f = File::create(&path)
            .with_context(|| format!("create temp audio '{}'", path.display()))?;
        let file = SpoolFile { path, remove: cfg.remove };
        let mut out = BufWriter::new(f);
        write_header(&mut out, 0)?;
        Ok(Self { file, out, frames: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Stereo sample frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Append interleaved stereo samples.
    pub fn push(&mut self, interleaved: &[f32]) -> Result<()> {
        for s in interleaved {
            self.out.write_all(&s.to_le_bytes())?;
        }
        self.frames += (interleaved.len() / CHANNELS as usize) as u64;
        Ok(())
    }

    pub fn push_silence(&mut self, frames: u64) -> Result<()> {
        const CHUNK: u64 = 4096;
        let zeros = [0f32; (CHUNK * CHANNELS as u64) as usize];
        let mut left = frames;
        while left > 0 {
            let n = left.min(CHUNK);
            self.push(&zeros[..(n * CHANNELS as u64) as usize])?;
            left -= n;
        }
        Ok(())
    }

    /// Decode `segment`'s audio into the spool, contributing exactly
    /// `samples_for(segment.duration)` frames. A segment without audio, or
    /// whose audio cannot be decoded, contributes silence.
    pub fn append_segment(&mut self, segment: &Segment, cancel: &AtomicBool) -> Result<()> {
        let target = samples_for(segment.duration);
        let start  = self.frames;

        if segment.has_audio {
            let mut sink = SegmentSink { spool: self, remaining: target };
            match decode_segment(segment, &mut sink, cancel) {
                Ok(()) => {}
                Err(e) if e.is::<Cancelled>() => return Err(e),
                Err(e) => tracing::warn!(
                    "[audio] '{}': {e:#}; using silence", segment.path.display(),
                ),
            }
        }

        let written = self.frames - start;
        self.push_silence(target.saturating_sub(written))?;
        Ok(())
    }

    /// Patch the header sizes and reopen the spool for reading.
    pub fn finish(self) -> Result<SpoolReader> {
        let Self { file, mut out, frames } = self;
        out.seek(SeekFrom::Start(0))?;
        write_header(&mut out, frames)?;
        out.flush()?;
        drop(out);

        let mut f = File::open(&file.path)
            .with_context(|| format!("reopen temp audio '{}'", file.path.display()))?;
        f.seek(SeekFrom::Start(HEADER_LEN))?;
        Ok(SpoolReader { file, input: BufReader::new(f), remaining: frames })
    }
}

/// WAV layout:
///   RIFF  <file_size - 8>  WAVE
///   fmt   16  <format=3 IEEE_FLOAT>  <channels=2>  <rate=44100>
///             <byte_rate=352800>  <block_align=8>  <bits=32>
///   data  <data_size>  <samples…>
fn write_header<W: Write>(w: &mut W, frames: u64) -> Result<()> {
    let data_size = u32::try_from(frames * BLOCK_ALIGN as u64)
        .map_err(|_| anyhow!("temp audio exceeds the 4 GiB WAV limit"))?;
    let byte_rate = SAMPLE_RATE * BLOCK_ALIGN as u32;

    w.write_all(b"RIFF")?;
    w.write_all(&(36u32 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&FORMAT_FLOAT.to_le_bytes())?;
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&SAMPLE_RATE.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    w.write_all(&BITS.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    Ok(())
}

// ── Reader ────────────────────────────────────────────────────────────────────

pub struct SpoolReader {
    file:      SpoolFile,
    input:     BufReader<File>,
    remaining: u64,
}

impl SpoolReader {
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read up to `frames` stereo frames into separate planes. Returns how
    /// many were read; fewer than asked only at the end of the spool.
    pub fn read_planar(
        &mut self,
        frames: usize,
        left:   &mut Vec<f32>,
        right:  &mut Vec<f32>,
    ) -> Result<usize> {
        let n = (frames as u64).min(self.remaining) as usize;
        let mut buf = vec![0u8; n * BLOCK_ALIGN as usize];
        self.input.read_exact(&mut buf)
            .with_context(|| format!("read temp audio '{}'", self.file.path.display()))?;
        for frame in buf.chunks_exact(BLOCK_ALIGN as usize) {
            left.push(f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]));
            right.push(f32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Bounded view of the spool for one segment.
struct SegmentSink<'a> {
    spool:     &'a mut SpoolWriter,
    remaining: u64,
}

impl SegmentSink<'_> {
    fn full(&self) -> bool {
        self.remaining == 0
    }

    /// Silence up to the segment's end.
    fn pad(&mut self, frames: u64) -> Result<()> {
        let n = frames.min(self.remaining);
        self.spool.push_silence(n)?;
        self.remaining -= n;
        Ok(())
    }

    /// Write interleaved samples, dropping the first `skip` frames and
    /// anything past the segment's end.
    fn take(&mut self, interleaved: &[f32], skip: usize) -> Result<()> {
        let ch    = CHANNELS as usize;
        let total = interleaved.len() / ch;
        if skip >= total { return Ok(()); }
        let n = ((total - skip) as u64).min(self.remaining) as usize;
        self.spool.push(&interleaved[skip * ch..(skip + n) * ch])?;
        self.remaining -= n as u64;
        Ok(())
    }
}

/// For a segment starting `offset` seconds into the content whose first
/// decoded audio frame sits at content time `first_pts`: frames to drop from
/// the front, and frames of silence to insert ahead of the audio when it
/// starts late.
fn first_frame_alignment(offset: f64, first_pts: f64) -> (usize, u64) {
    if first_pts <= offset {
        (samples_for(offset - first_pts) as usize, 0)
    } else {
        (0, samples_for(first_pts - offset))
    }
}

fn decode_segment(segment: &Segment, sink: &mut SegmentSink<'_>, cancel: &AtomicBool) -> Result<()> {
    let mut ictx = input(&segment.path)
        .with_context(|| format!("open '{}'", segment.path.display()))?;

    let audio_idx = ictx.streams().best(MediaType::Audio)
        .ok_or_else(|| anyhow!("no audio stream"))?
        .index();

    let origin = media_origin(&ictx);
    let (in_tb, mut decoder) = {
        let stream = ictx.stream(audio_idx).ok_or_else(|| anyhow!("audio stream vanished"))?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("audio codec context")?
            .decoder().audio()
            .context("audio decoder")?;
        (stream.time_base(), decoder)
    };

    if segment.source_offset > 0.0 {
        seek_to_secs(&mut ictx, seek_target(segment.source_offset, origin), "spool audio");
    }

    let mut resampler: Option<resampling::Context> = None;
    // Samples before `source_offset` still to be discarded, in output frames.
    // Fixed from the first decoded frame's content time; later frames are
    // contiguous.
    let mut pending_skip: Option<usize> = None;

    for result in ictx.packets() {
        if cancel.load(Ordering::Relaxed) {
            return Err(Cancelled.into());
        }
        let Ok((stream, packet)) = result else { continue };
        if stream.index() != audio_idx { continue; }
        if decoder.send_packet(&packet).is_err() { continue; }

        let mut frame = AudioFrame::empty();
        while decoder.receive_frame(&mut frame).is_ok() {
            if pending_skip.is_none() {
                let pts = frame.pts()
                    .map(|p| p as f64 * f64::from(in_tb) - origin)
                    .unwrap_or(segment.source_offset);
                let (skip, lead) = first_frame_alignment(segment.source_offset, pts);
                sink.pad(lead)?;
                pending_skip = Some(skip);
            }
            let skip = pending_skip.get_or_insert(0);
            let pcm = resample(&frame, &mut resampler)?;
            let frames = pcm.len() / CHANNELS as usize;
            let now = (*skip).min(frames);
            sink.take(&pcm, now)?;
            *skip -= now;
            if sink.full() { return Ok(()); }
        }
    }

    let _ = decoder.send_eof();
    let mut frame = AudioFrame::empty();
    while decoder.receive_frame(&mut frame).is_ok() && !sink.full() {
        let pcm = resample(&frame, &mut resampler)?;
        let skip = pending_skip.get_or_insert(0);
        let now  = (*skip).min(pcm.len() / CHANNELS as usize);
        sink.take(&pcm, now)?;
        *skip -= now;
    }
    Ok(())
}

/// Convert `frame` to interleaved f32 stereo at 44.1 kHz. The resampler is
/// built on the first frame that needs one, once the source format is known.
fn resample(frame: &AudioFrame, resampler: &mut Option<resampling::Context>) -> Result<Vec<f32>> {
    let channels = frame.ch_layout().channels();
    let needs_resample = frame.format() != OUT_FMT
        || frame.rate()                != SAMPLE_RATE
        || channels                    != 2;

    if !needs_resample {
        return Ok(packed_f32(frame));
    }

    if resampler.is_none() {
        // Mono sources must be declared as MONO so swr reads one channel.
        let src_layout = if channels >= 2 { frame.ch_layout() } else { ChannelLayout::MONO };
        let ctx = resampling::Context::get2(
            frame.format(), src_layout, frame.rate(),
            OUT_FMT,        OUT_LAYOUT, SAMPLE_RATE,
        ).context("create audio resampler")?;
        *resampler = Some(ctx);
    }

    let mut out = AudioFrame::empty();
    match resampler.as_mut() {
        Some(rs) if rs.run(frame, &mut out).is_ok() && out.samples() > 0 => Ok(packed_f32(&out)),
        _ => Ok(Vec::new()),
    }
}

/// OUT_FMT is packed, so every channel lives in plane 0.
fn packed_f32(frame: &AudioFrame) -> Vec<f32> {
    let len = frame.samples() * CHANNELS as usize * 4;
    frame.data(0)[..len]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dir: &Path, remove: bool) -> TempAudio {
        TempAudio { dir: dir.to_path_buf(), remove }
    }

    fn silent(duration: f64) -> Segment {
        Segment {
            path:          PathBuf::from("/nowhere/silent.mp4"),
            source_offset: 0.0,
            duration,
            has_audio:     false,
        }
    }

    #[test]
    fn segment_without_audio_fills_exact_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SpoolWriter::create(&cfg(dir.path(), true)).unwrap();
        let cancel = AtomicBool::new(false);
        w.append_segment(&silent(1.5), &cancel).unwrap();
        w.append_segment(&silent(0.25), &cancel).unwrap();
        assert_eq!(w.frames(), 66_150 + 11_025);
    }

    #[test]
    fn header_is_patched_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SpoolWriter::create(&cfg(dir.path(), false)).unwrap();
        w.push(&[0.5, -0.5, 0.25, -0.25]).unwrap();
        let path = w.path().to_path_buf();
        drop(w.finish().unwrap());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44 + 16);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 16);
        assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 16);
    }

    #[test]
    fn reader_splits_planes_and_stops_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SpoolWriter::create(&cfg(dir.path(), true)).unwrap();
        w.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut r = w.finish().unwrap();

        let (mut l, mut rt) = (Vec::new(), Vec::new());
        assert_eq!(r.read_planar(2, &mut l, &mut rt).unwrap(), 2);
        assert_eq!(r.read_planar(5, &mut l, &mut rt).unwrap(), 1);
        assert_eq!(r.read_planar(5, &mut l, &mut rt).unwrap(), 0);
        assert_eq!(l, vec![1.0, 3.0, 5.0]);
        assert_eq!(rt, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn spool_is_removed_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();

        let w = SpoolWriter::create(&cfg(dir.path(), true)).unwrap();
        let removed = w.path().to_path_buf();
        assert!(removed.file_name().unwrap().to_string_lossy().starts_with("clipdesk-temp-audio-"));
        drop(w);
        assert!(!removed.exists());

        let w = SpoolWriter::create(&cfg(dir.path(), false)).unwrap();
        let kept = w.path().to_path_buf();
        drop(w.finish().unwrap());
        assert!(kept.exists());
    }

    #[test]
    fn late_audio_is_padded_and_early_audio_trimmed() {
        // Seek landed 0.5 s before the in-point.
        assert_eq!(first_frame_alignment(10.0, 9.5), (22_050, 0));
        // Audio stream starts 0.25 s after the video origin.
        assert_eq!(first_frame_alignment(0.0, 0.25), (0, 11_025));
        assert_eq!(first_frame_alignment(2.0, 2.0), (0, 0));
    }

    #[test]
    fn sink_pad_stops_at_segment_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SpoolWriter::create(&cfg(dir.path(), true)).unwrap();
        let mut sink = SegmentSink { spool: &mut w, remaining: 5 };
        sink.pad(3).unwrap();
        assert!(!sink.full());
        sink.pad(10).unwrap();
        assert!(sink.full());
        assert_eq!(w.frames(), 5);
    }

    #[test]
    fn sink_trims_to_segment_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SpoolWriter::create(&cfg(dir.path(), true)).unwrap();
        let mut sink = SegmentSink { spool: &mut w, remaining: 3 };
        sink.take(&[0.0; 8], 1).unwrap(); // 4 frames, skip 1
        assert!(sink.full());
        sink.take(&[0.0; 8], 0).unwrap();
        assert_eq!(w.frames(), 3);
    }
}
