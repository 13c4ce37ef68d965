// crates/clipdesk-media/src/synth.rs
//
// Short synthetic sources for tests that run the real FFmpeg pipeline.
//
// Video is mpeg4, flat frames whose luma steps up by two per frame, so the
// first frame of an output tells which source instant it came from. Audio is
// an AAC 440 Hz tone. Both streams can start at a non-zero timestamp, the
// way FLV files and MKV remuxes often do.

use std::path::Path;
use std::f32::consts::TAU;

use anyhow::{anyhow, Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec;
use ffmpeg::encoder;
use ffmpeg::format::{input, output, Pixel, Sample};
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::media::Type as MediaType;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use crate::audio::SAMPLE_RATE;
use crate::encode::copy_codec_parameters;

pub struct Source {
    pub secs:   f64,
    pub fps:    i32,
    pub width:  u32,
    pub height: u32,
    /// Timestamp of the first frame and first sample, in seconds.
    pub start:  f64,
    /// Luma of frame 0.
    pub base:   u8,
}

impl Default for Source {
    fn default() -> Self {
        Self { secs: 4.0, fps: 25, width: 320, height: 240, start: 0.0, base: 16 }
    }
}

impl Source {
    pub fn luma_at(&self, frame: i64) -> u8 {
        (i64::from(self.base) + frame * 2).min(235) as u8
    }
}

pub fn has_encoder(name: &str) -> bool {
    encoder::find_by_name(name).is_some()
}

/// Write `src` to `path`; the muxer follows the extension.
pub fn write_source(path: &Path, src: &Source) -> Result<()> {
    let mut octx = output(path).with_context(|| format!("create '{}'", path.display()))?;
    let global_header = octx.format().flags().contains(ffmpeg::format::Flags::GLOBAL_HEADER);

    // ── Video (stream 0)
    let frame_tb = Rational::new(1, src.fps);
    let vcodec = encoder::find_by_name("mpeg4").ok_or_else(|| anyhow!("mpeg4 encoder missing"))?;
    octx.add_stream(vcodec).context("add video stream")?.set_time_base(frame_tb);

    let mut venc = codec::context::Context::new_with_codec(vcodec).encoder().video()?;
    venc.set_width(src.width);
    venc.set_height(src.height);
    venc.set_format(Pixel::YUV420P);
    venc.set_time_base(frame_tb);
    venc.set_frame_rate(Some(Rational::new(src.fps, 1)));
    venc.set_bit_rate(400_000);
    if global_header {
        venc.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut video = venc.open_as_with(vcodec, ffmpeg::Dictionary::new())?;
    copy_codec_parameters(&mut octx, 0, &video)?;

    // ── Audio (stream 1)
    let audio_tb = Rational::new(1, SAMPLE_RATE as i32);
    let acodec = encoder::find_by_name("aac").ok_or_else(|| anyhow!("aac encoder missing"))?;
    octx.add_stream(acodec).context("add audio stream")?.set_time_base(audio_tb);

    let mut aenc = codec::context::Context::new_with_codec(acodec).encoder().audio()?;
    aenc.set_rate(SAMPLE_RATE as i32);
    aenc.set_ch_layout(ChannelLayout::STEREO);
    aenc.set_format(Sample::F32(SampleType::Planar));
    aenc.set_time_base(audio_tb);
    aenc.set_bit_rate(128_000);
    if global_header {
        aenc.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut audio = aenc.open_as_with(acodec, ffmpeg::Dictionary::new())?;
    copy_codec_parameters(&mut octx, 1, &audio)?;

    octx.write_header().context("write header")?;
    let ost_video = octx.stream(0).ok_or_else(|| anyhow!("video stream missing"))?.time_base();
    let ost_audio = octx.stream(1).ok_or_else(|| anyhow!("audio stream missing"))?.time_base();

    let mut pkt = Packet::empty();

    let frames     = (src.secs * f64::from(src.fps)).round() as i64;
    let first_tick = (src.start * f64::from(src.fps)).round() as i64;
    for i in 0..frames {
        let mut frame = VideoFrame::new(Pixel::YUV420P, src.width, src.height);
        frame.data_mut(0).fill(src.luma_at(i));
        frame.data_mut(1).fill(128);
        frame.data_mut(2).fill(128);
        frame.set_pts(Some(first_tick + i));
        video.send_frame(&frame)?;
        while video.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(frame_tb, ost_video);
            pkt.write_interleaved(&mut octx)?;
        }
    }
    video.send_eof()?;
    while video.receive_packet(&mut pkt).is_ok() {
        pkt.set_stream(0);
        pkt.rescale_ts(frame_tb, ost_video);
        pkt.write_interleaved(&mut octx)?;
    }

    let n = match audio.frame_size() as usize {
        0 => 1024,
        n => n,
    };
    let samples     = (src.secs * f64::from(SAMPLE_RATE)).round() as i64;
    let first_sample = (src.start * f64::from(SAMPLE_RATE)).round() as i64;
    let mut written = 0i64;
    while written < samples {
        let mut frame = AudioFrame::new(Sample::F32(SampleType::Planar), n, ChannelLayoutMask::STEREO);
        frame.set_rate(SAMPLE_RATE);
        frame.set_pts(Some(first_sample + written));
        for plane in 0..2 {
            let data = frame.data_mut(plane);
            let dst = unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut f32, n) };
            for (k, s) in dst.iter_mut().enumerate() {
                let t = (written + k as i64) as f32 / SAMPLE_RATE as f32;
                *s = 0.25 * (TAU * 440.0 * t).sin();
            }
        }
        audio.send_frame(&frame)?;
        while audio.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(1);
            pkt.rescale_ts(audio_tb, ost_audio);
            pkt.write_interleaved(&mut octx)?;
        }
        written += n as i64;
    }
    audio.send_eof()?;
    while audio.receive_packet(&mut pkt).is_ok() {
        pkt.set_stream(1);
        pkt.rescale_ts(audio_tb, ost_audio);
        pkt.write_interleaved(&mut octx)?;
    }

    octx.write_trailer().context("write trailer")?;
    Ok(())
}

/// Mean luma over the visible pixels of the first decoded video frame.
pub fn first_frame_luma(path: &Path) -> Result<f64> {
    let mut ictx = input(path).with_context(|| format!("open '{}'", path.display()))?;
    let (vidx, mut decoder) = {
        let stream = ictx.streams().best(MediaType::Video).ok_or_else(|| anyhow!("no video"))?;
        let decoder = codec::context::Context::from_parameters(stream.parameters())?
            .decoder().video()?;
        (stream.index(), decoder)
    };

    let mut frame = VideoFrame::empty();
    for result in ictx.packets() {
        let (stream, packet) = result?;
        if stream.index() != vidx { continue; }
        decoder.send_packet(&packet)?;
        if decoder.receive_frame(&mut frame).is_ok() {
            return Ok(mean_luma(&frame));
        }
    }
    decoder.send_eof()?;
    if decoder.receive_frame(&mut frame).is_ok() {
        return Ok(mean_luma(&frame));
    }
    Err(anyhow!("no frames in '{}'", path.display()))
}

fn mean_luma(frame: &VideoFrame) -> f64 {
    let (w, h, stride) = (frame.width() as usize, frame.height() as usize, frame.stride(0));
    let data = frame.data(0);
    let sum: u64 = (0..h)
        .flat_map(|y| data[y * stride..y * stride + w].iter())
        .map(|&v| u64::from(v))
        .sum();
    sum as f64 / (w * h).max(1) as f64
}
