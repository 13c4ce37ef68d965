// crates/clipdesk-media/src/encode.rs
//
// Timeline → container write pipeline.
//
// Phases:
//   1. Audio spool: every segment's audio decoded into the temp WAV
//      (audio.rs). First 10% of reported progress.
//   2. Output setup: muxer by extension or explicit container; video
//      encoder by name (YUV420P, even dimensions); audio encoder by name
//      (FLTP stereo 44.1 kHz).
//   3. Video: each segment decoded in order and placed onto the output
//      frame grid by hold-and-repeat, so a segment always yields exactly
//      round(duration × fps) frames whatever its source rate. After every
//      video frame the audio encoder is fed from the spool up to the same
//      instant, keeping the mux interleaved.
//   4. Flush both encoders, write the trailer.
//
// PTS strategy:
//   Video: frame counter in 1/fps. Audio: sample counter in 1/44100.
//   Both start at zero; source timestamps never reach the output. Source
//   times are read relative to each file's video start time, see
//   helpers/seek.rs.
//
// Cancellation:
//   `cancel` is checked for every demuxed packet and every emitted frame;
//   when set the write stops with `Cancelled`. The partial output stays on
//   disk. The spool is removed as its handle drops.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec;
use ffmpeg::encoder;
use ffmpeg::format::{input as open_input, output as open_output, output_as, Pixel, Sample};
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use clipdesk_core::encoding::{even, frame_rate_ratio, WriteSettings};
use clipdesk_core::timeline::{Segment, Timeline};

use crate::audio::{SpoolReader, SpoolWriter, SAMPLE_RATE};
use crate::engine::Cancelled;
use crate::helpers::seek::{media_origin, seek_target, seek_to_secs};
use crate::probe::display_size;

/// Share of reported progress spent building the audio spool.
const AUDIO_PHASE: f32 = 0.10;

// ── Frame grid ────────────────────────────────────────────────────────────────

/// Output frames a segment of `duration` seconds occupies at `fps`.
pub fn slots_for(duration: f64, fps: f64) -> u64 {
    (duration.max(0.0) * fps).round() as u64
}

/// Output slots of one segment. Slot `k` starts `k / fps` seconds into the
/// segment; a decoded frame is shown in every slot that starts before the
/// next decoded frame does.
#[derive(Debug, Clone)]
struct FrameGrid {
    fps:   f64,
    slots: u64,
    next:  u64,
}

impl FrameGrid {
    fn new(duration: f64, fps: f64) -> Self {
        Self { fps, slots: slots_for(duration, fps), next: 0 }
    }

    /// Claim every slot starting before `t` (seconds into the segment) and
    /// return how many were claimed.
    fn advance_to(&mut self, t: f64) -> u64 {
        let start = self.next;
        while self.next < self.slots && (self.next as f64) / self.fps < t {
            self.next += 1;
        }
        self.next - start
    }

    /// Claim whatever is left.
    fn rest(&mut self) -> u64 {
        let n = self.slots - self.next;
        self.next = self.slots;
        n
    }

    fn is_done(&self) -> bool {
        self.next >= self.slots
    }
}

/// FFmpeg encoder name for a user-facing audio codec choice.
fn audio_encoder_name(codec: &str) -> &str {
    match codec {
        "mp3" => "libmp3lame",
        other => other,
    }
}

/// Samples per audio frame sent to the encoder. Fixed-size encoders
/// (aac 1024, libmp3lame 1152, libvorbis 64) reject any other count;
/// variable-size ones report 0.
fn audio_frame_size(reported: u32) -> usize {
    match reported {
        0 => 1024,
        n => n as usize,
    }
}

// ── Audio encoder state ───────────────────────────────────────────────────────

/// Drives the audio encoder from the spool.
struct AudioOut {
    encoder:        encoder::audio::Encoder,
    spool:          SpoolReader,
    /// Next output frame's PTS in samples (audio stream timebase = 1/44100).
    out_sample_idx: i64,
    frame_size:     usize,
    audio_tb:       Rational,
    ost_tb:         Rational,
    left:           Vec<f32>,
    right:          Vec<f32>,
}

impl AudioOut {
    /// Encode spool audio up to `until` samples. With `flush` the final
    /// partial frame is zero-padded and sent too.
    fn feed(
        &mut self,
        octx:  &mut ffmpeg::format::context::Output,
        until: i64,
        flush: bool,
    ) -> Result<()> {
        while self.spool.remaining() > 0
            && (flush || self.out_sample_idx + self.frame_size as i64 <= until)
        {
            let frame = self.pop_frame()?;
            self.encoder.send_frame(&frame).context("send audio frame to encoder")?;
            self.drain_packets(octx)?;
        }
        Ok(())
    }

    /// One encoder-sized FLTP frame from the spool, zero-padded at the end.
    fn pop_frame(&mut self) -> Result<AudioFrame> {
        let n = self.frame_size;
        self.left.clear();
        self.right.clear();
        let available = self.spool.read_planar(n, &mut self.left, &mut self.right)?;

        let mut frame = AudioFrame::new(Sample::F32(SampleType::Planar), n, ChannelLayoutMask::STEREO);
        frame.set_rate(SAMPLE_RATE);
        frame.set_pts(Some(self.out_sample_idx));

        unsafe {
            for (plane, src) in [(0, &self.left), (1, &self.right)] {
                let data = frame.data_mut(plane);
                let dst  = std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut f32, n);
                dst[..available].copy_from_slice(&src[..available]);
                dst[available..].fill(0.0);
            }
        }

        self.out_sample_idx += n as i64;
        Ok(frame)
    }

    fn drain_packets(&mut self, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
        let mut pkt = Packet::empty();
        while self.encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(1);
            pkt.rescale_ts(self.audio_tb, self.ost_tb);
            pkt.write_interleaved(octx).context("write audio packet")?;
        }
        Ok(())
    }

    fn finish(&mut self, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
        self.feed(octx, i64::MAX, true)?;
        self.encoder.send_eof().context("send EOF to audio encoder")?;
        self.drain_packets(octx)
    }
}

// ── Muxer ─────────────────────────────────────────────────────────────────────

/// Output context plus both encoders. `emit` is the only way a video frame
/// reaches the file.
struct Mux<'p> {
    octx:        ffmpeg::format::context::Output,
    video:       encoder::video::Encoder,
    frame_tb:    Rational,
    ost_video:   Rational,
    next_pts:    i64,
    audio:       AudioOut,
    fps:         f64,
    width:       u32,
    height:      u32,
    total_slots: u64,
    cancel:      &'p AtomicBool,
    progress:    &'p mut dyn FnMut(f32),
}

impl Mux<'_> {
    fn check_cancel(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Cancelled.into());
        }
        Ok(())
    }

    /// Write `frame` into the next output slot, then catch audio up to it.
    fn emit(&mut self, frame: &mut VideoFrame) -> Result<()> {
        self.check_cancel()?;

        frame.set_pts(Some(self.next_pts));
        self.video.send_frame(frame).context("send video frame to encoder")?;
        self.drain_video()?;
        self.next_pts += 1;

        let until = ((self.next_pts as f64 / self.fps) * SAMPLE_RATE as f64).round() as i64;
        self.audio.feed(&mut self.octx, until, false)?;

        let done = self.next_pts as f32 / self.total_slots.max(1) as f32;
        (self.progress)(AUDIO_PHASE + (1.0 - AUDIO_PHASE) * done.min(1.0));
        Ok(())
    }

    fn drain_video(&mut self) -> Result<()> {
        let mut pkt = Packet::empty();
        while self.video.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(self.frame_tb, self.ost_video);
            pkt.write_interleaved(&mut self.octx).context("write video packet")?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.video.send_eof().context("send EOF to video encoder")?;
        self.drain_video()?;
        self.audio.finish(&mut self.octx)?;
        self.octx.write_trailer().context("write trailer")?;
        Ok(())
    }
}

/// Fill output stream `index`'s codecpar from an opened encoder. The encoder
/// types do not implement AsPtr<AVCodecParameters>, so this goes via FFI.
pub(crate) fn copy_codec_parameters(
    octx:  &mut ffmpeg::format::context::Output,
    index: usize,
    enc:   &codec::Context,
) -> Result<()> {
    let stream_count = octx.nb_streams() as usize;
    if index >= stream_count {
        bail!("output has no stream {index}");
    }
    let ret = unsafe {
        ffmpeg::ffi::avcodec_parameters_from_context(
            (**(*octx.as_mut_ptr()).streams.add(index)).codecpar,
            enc.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
        )
    };
    if ret < 0 {
        bail!("avcodec_parameters_from_context (stream {index}) failed: {ret}");
    }
    Ok(())
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Render `timeline` to `output`. Blocking; run this on a worker thread.
pub fn write_timeline(
    timeline: &Timeline,
    output:   &Path,
    settings: &WriteSettings,
    cancel:   &AtomicBool,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    if timeline.segments.is_empty() {
        bail!("nothing to write: timeline is empty");
    }

    let (num, den) = frame_rate_ratio(settings.frame_rate.unwrap_or(timeline.frame_rate));
    let fps        = num as f64 / den as f64;
    let width      = even(timeline.width);
    let height     = even(timeline.height);
    let total_slots: u64 = timeline.segments.iter().map(|s| slots_for(s.duration, fps)).sum();

    tracing::info!(
        "[encode] {} segment(s) → {} ({width}x{height} @ {num}/{den}, {}/{})",
        timeline.segments.len(), output.display(), settings.video_codec, settings.audio_codec,
    );

    // ── Audio spool ───────────────────────────────────────────────────────────
    let mut writer = SpoolWriter::create(&settings.temp_audio)?;
    for (i, seg) in timeline.segments.iter().enumerate() {
        writer.append_segment(seg, cancel)?;
        progress(AUDIO_PHASE * (i + 1) as f32 / timeline.segments.len() as f32);
    }
    let spool = writer.finish()?;
    tracing::debug!("[encode] audio spool ready: {}", spool.path().display());

    // ── Output context ────────────────────────────────────────────────────────
    let mut octx = match settings.container {
        Some(c) => output_as(output, c.muxer()),
        None    => open_output(output),
    }
    .with_context(|| format!("could not open output '{}'", output.display()))?;

    let global_header = octx.format().flags().contains(ffmpeg::format::Flags::GLOBAL_HEADER);

    // ── Video encoder (stream 0) ──────────────────────────────────────────────
    let frame_tb = Rational::new(den, num);

    let vcodec = encoder::find_by_name(&settings.video_codec)
        .ok_or_else(|| anyhow!("video encoder '{}' not found", settings.video_codec))?;

    let mut ost_video = octx.add_stream(vcodec).context("add video stream")?;
    ost_video.set_time_base(frame_tb);

    let mut video_enc = codec::context::Context::new_with_codec(vcodec)
        .encoder().video()
        .context("create video encoder context")?;

    video_enc.set_width(width);
    video_enc.set_height(height);
    video_enc.set_format(Pixel::YUV420P);
    video_enc.set_time_base(frame_tb);
    video_enc.set_frame_rate(Some(Rational::new(num, den)));
    if global_header {
        video_enc.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let mut opts = ffmpeg::Dictionary::new();
    match settings.video_bitrate {
        Some(b) => video_enc.set_bit_rate(b.0 as usize),
        None if settings.video_codec.contains("264") => {
            // CRF controls quality; bit_rate 0 signals VBR.
            video_enc.set_bit_rate(0);
            opts.set("crf",    "18");
            opts.set("preset", "fast");
        }
        None => {}
    }

    let mut video_encoder = video_enc.open_as_with(vcodec, opts)
        .with_context(|| format!("open video encoder '{}'", settings.video_codec))?;

    // libavcodec resets the sample aspect ratio during open.
    video_encoder.set_aspect_ratio(Rational::new(1, 1));

    copy_codec_parameters(&mut octx, 0, &video_encoder)?;

    // ── Audio encoder (stream 1) ──────────────────────────────────────────────
    let audio_tb   = Rational::new(1, SAMPLE_RATE as i32);
    let aname      = audio_encoder_name(&settings.audio_codec);
    let acodec     = encoder::find_by_name(aname)
        .ok_or_else(|| anyhow!("audio encoder '{aname}' not found"))?;

    let mut ost_audio = octx.add_stream(acodec).context("add audio stream")?;
    ost_audio.set_time_base(audio_tb);

    let mut audio_enc = codec::context::Context::new_with_codec(acodec)
        .encoder().audio()
        .context("create audio encoder context")?;

    audio_enc.set_rate(SAMPLE_RATE as i32);
    audio_enc.set_ch_layout(ChannelLayout::STEREO);
    audio_enc.set_format(Sample::F32(SampleType::Planar));
    audio_enc.set_time_base(audio_tb);
    if let Some(b) = settings.audio_bitrate {
        audio_enc.set_bit_rate(b.0 as usize);
    }
    if global_header {
        audio_enc.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let audio_encoder = audio_enc.open_as_with(acodec, ffmpeg::Dictionary::new())
        .with_context(|| format!("open audio encoder '{aname}'"))?;

    let frame_size = audio_frame_size(audio_encoder.frame_size() as u32);

    copy_codec_parameters(&mut octx, 1, &audio_encoder)?;

    // ── Header ────────────────────────────────────────────────────────────────
    octx.write_header().context("write output header")?;

    // The muxer may pick its own stream time bases while writing the header.
    let ost_video_tb = octx.stream(0).ok_or_else(|| anyhow!("video stream missing"))?.time_base();
    let ost_audio_tb = octx.stream(1).ok_or_else(|| anyhow!("audio stream missing"))?.time_base();

    let mut mux = Mux {
        octx,
        video:     video_encoder,
        frame_tb,
        ost_video: ost_video_tb,
        next_pts:  0,
        audio:     AudioOut {
            encoder:        audio_encoder,
            spool,
            out_sample_idx: 0,
            frame_size,
            audio_tb,
            ost_tb:         ost_audio_tb,
            left:           Vec::with_capacity(frame_size),
            right:          Vec::with_capacity(frame_size),
        },
        fps,
        width,
        height,
        total_slots,
        cancel,
        progress,
    };

    // ── Segments ──────────────────────────────────────────────────────────────
    for seg in &timeline.segments {
        mux.check_cancel()?;
        write_segment(seg, &mut mux)?;
    }

    mux.finish()?;
    tracing::info!("[encode] wrote {}", output.display());
    Ok(())
}

// ── Per-segment decode ────────────────────────────────────────────────────────

/// Decode `seg` and place its frames onto the output grid.
fn write_segment(seg: &Segment, mux: &mut Mux<'_>) -> Result<()> {
    let mut ictx = open_input(&seg.path)
        .with_context(|| format!("open '{}'", seg.path.display()))?;

    let (vidx, in_tb, (disp_w, disp_h), mut decoder) = {
        let stream = ictx.streams().best(MediaType::Video)
            .ok_or_else(|| anyhow!("no video stream in '{}'", seg.path.display()))?;
        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .context("video decoder context")?
            .decoder().video()
            .context("open video decoder")?;
        (stream.index(), stream.time_base(), display_size(&stream), decoder)
    };
    let (src_w, src_h) = if disp_w > 0 && disp_h > 0 {
        (disp_w, disp_h)
    } else {
        (decoder.width(), decoder.height())
    };

    // Seek to the keyframe at or before the in-point; pre-roll frames only
    // ever become the held frame.
    let in_point = seek_target(seg.source_offset, media_origin(&ictx));
    if seg.source_offset > 0.0 {
        seek_to_secs(&mut ictx, in_point, "encode video");
    }

    let mut placer = Placer {
        grid:     FrameGrid::new(seg.duration, mux.fps),
        held:     None,
        scaler:   None,
        src_w,
        src_h,
        in_tb,
        in_point,
    };

    'packets: for result in ictx.packets() {
        let (stream, packet) = result
            .with_context(|| format!("read packet from '{}'", seg.path.display()))?;
        mux.check_cancel()?;
        if stream.index() != vidx { continue; }

        decoder.send_packet(&packet).context("send video packet to decoder")?;
        let mut decoded = VideoFrame::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            if placer.place(&decoded, mux)? {
                break 'packets;
            }
        }
    }

    if !placer.grid.is_done() {
        let _ = decoder.send_eof();
        let mut decoded = VideoFrame::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            if placer.place(&decoded, mux)? { break; }
        }
    }

    placer.finish(mux, &seg.path)
}

/// Hold-and-repeat placement state for one segment.
struct Placer {
    grid:   FrameGrid,
    /// Last scaled frame; repeated until a newer one starts.
    held:   Option<VideoFrame>,
    scaler: Option<ScaleCtx>,
    src_w:  u32,
    src_h:  u32,
    in_tb:  Rational,
    /// Absolute source time of the segment's first slot.
    in_point: f64,
}

impl Placer {
    /// Returns `true` once every slot of the segment is filled.
    fn place(&mut self, decoded: &VideoFrame, mux: &mut Mux<'_>) -> Result<bool> {
        let t = decoded.timestamp().or(decoded.pts())
            .map(|ts| ts as f64 * f64::from(self.in_tb))
            .unwrap_or(self.in_point)
            - self.in_point;

        if self.scaler.is_none() {
            let sc = ScaleCtx::get(
                decoded.format(), self.src_w, self.src_h,
                Pixel::YUV420P,   mux.width,  mux.height,
                ScaleFlags::BILINEAR,
            ).context("create swscale context")?;
            self.scaler = Some(sc);
        }
        let mut yuv = VideoFrame::empty();
        if let Some(sc) = self.scaler.as_mut() {
            sc.run(decoded, &mut yuv).context("scale video frame")?;
        }
        // swscale copies the source SAR; force square pixels.
        unsafe {
            (*yuv.as_mut_ptr()).sample_aspect_ratio = ffmpeg::ffi::AVRational { num: 1, den: 1 };
        }

        let due = self.grid.advance_to(t);
        // Slots before the first decoded frame show that frame.
        let shown = self.held.as_mut().unwrap_or(&mut yuv);
        for _ in 0..due {
            mux.emit(shown)?;
        }
        self.held = Some(yuv);
        Ok(self.grid.is_done())
    }

    /// Fill the remaining slots with the held frame.
    fn finish(mut self, mux: &mut Mux<'_>, path: &Path) -> Result<()> {
        let rest = self.grid.rest();
        if rest == 0 { return Ok(()); }
        let Some(held) = self.held.as_mut() else {
            bail!("no video frames decoded from '{}'", path.display());
        };
        for _ in 0..rest {
            mux.emit(held)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_round_to_nearest_frame() {
        assert_eq!(slots_for(30.0, 30.0), 900);
        assert_eq!(slots_for(10.0, 30000.0 / 1001.0), 300);
        assert_eq!(slots_for(0.0, 25.0), 0);
    }

    #[test]
    fn upsampling_repeats_frames() {
        // 10 fps source into 30 fps: each source frame covers three slots.
        let mut grid = FrameGrid::new(1.0, 30.0);
        let mut counts = Vec::new();
        for k in 1..10 {
            counts.push(grid.advance_to(k as f64 / 10.0));
        }
        counts.push(grid.rest());
        assert_eq!(counts.iter().sum::<u64>(), 30);
        assert!(counts.iter().all(|&c| c == 3));
    }

    #[test]
    fn downsampling_drops_frames() {
        // 60 fps source into 30 fps: every other source frame claims nothing.
        let mut grid = FrameGrid::new(1.0, 30.0);
        let mut total = grid.advance_to(0.0);
        let mut empty = 0;
        for k in 1..60 {
            let n = grid.advance_to(k as f64 / 60.0);
            if n == 0 { empty += 1; }
            total += n;
        }
        total += grid.rest();
        assert_eq!(total, 30);
        assert!(empty >= 29);
    }

    #[test]
    fn preroll_frames_claim_no_slots() {
        let mut grid = FrameGrid::new(2.0, 25.0);
        assert_eq!(grid.advance_to(-0.4), 0);
        assert_eq!(grid.advance_to(0.0), 0);
        assert_eq!(grid.advance_to(0.04), 1);
        assert!(!grid.is_done());
        assert_eq!(grid.rest(), 49);
        assert!(grid.is_done());
    }

    #[test]
    fn grid_never_overflows() {
        let mut grid = FrameGrid::new(0.2, 10.0);
        assert_eq!(grid.advance_to(100.0), 2);
        assert_eq!(grid.advance_to(200.0), 0);
        assert_eq!(grid.rest(), 0);
    }

    #[test]
    fn encoder_frame_size_is_kept() {
        assert_eq!(audio_frame_size(64), 64);
        assert_eq!(audio_frame_size(1152), 1152);
        assert_eq!(audio_frame_size(1024), 1024);
        assert_eq!(audio_frame_size(0), 1024);
    }

    #[test]
    fn mp3_maps_to_lame() {
        assert_eq!(audio_encoder_name("mp3"), "libmp3lame");
        assert_eq!(audio_encoder_name("aac"), "aac");
        assert_eq!(audio_encoder_name("libvorbis"), "libvorbis");
    }
}
