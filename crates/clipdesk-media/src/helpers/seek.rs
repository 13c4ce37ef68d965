// crates/clipdesk-media/src/helpers/seek.rs
//
// Seek and stream-origin helpers shared by the video and audio decoders.
//
// Source timestamps are absolute: a file whose first video frame carries
// pts = 1.4 s (FLV, remuxed MKV/MOV) has content time 0 at 1.4 s. Both
// decoders measure segment offsets from the same origin, the best video
// stream's start time, so audio and video stay aligned after the shift.
//
// Seek failures are soft. The demuxer then decodes from wherever it is and
// the callers' pts filtering drops the pre-roll; slower, never wrong.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type as MediaType;
use ffmpeg::util::rational::Rational;

/// Seconds for `ticks` in `tb`; an unset timestamp reads as zero.
pub(crate) fn ticks_to_secs(ticks: i64, tb: Rational) -> f64 {
    if ticks == ffmpeg::ffi::AV_NOPTS_VALUE || tb.denominator() == 0 {
        return 0.0;
    }
    ticks as f64 * f64::from(tb)
}

/// Content-time origin of `ictx`: start time of its best video stream, or of
/// its first stream when there is no video.
pub(crate) fn media_origin(ictx: &Input) -> f64 {
    let stream = ictx.streams().best(MediaType::Video).or_else(|| ictx.stream(0));
    stream.map_or(0.0, |s| ticks_to_secs(s.start_time(), s.time_base()))
}

/// Absolute seek target for `offset` seconds of content.
pub(crate) fn seek_target(offset: f64, origin: f64) -> f64 {
    offset + origin
}

/// Backward-seek `ictx` to the keyframe at or before `target_secs` (absolute).
///
/// Returns `false` when the seek failed and decoding continues from the
/// current position. A target at or before zero skips the seek: the demuxer
/// already sits at the start, and some platforms reject `max_ts = 0`.
pub(crate) fn seek_to_secs(ictx: &mut Input, target_secs: f64, label: &str) -> bool {
    if target_secs <= 0.0 {
        return true;
    }
    let ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    match ictx.seek(ts, ..=ts) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "[seek] soft-fail in {label} at {target_secs:.3}s: {e}; decoding from current position"
            );
            false
        }
    }
}
