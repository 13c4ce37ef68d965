// crates/clipdesk-core/src/encoding.rs
//
// Encoder-facing settings handed to MediaEngine::write.
//
//   • `Bitrate`      : parsed from the UI strings ("2000k", "5M", "128000").
//   • `Container`    : the five output containers the Convert tab offers,
//                       with their muxer names and file extensions.
//   • `WriteSettings`: codec names, rate, bitrates, temp-audio policy.
//
// Codec names stay strings: they are passed to the encoder lookup verbatim
// and an unknown name surfaces as a write failure, not a validation error.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Bitrate ───────────────────────────────────────────────────────────────────

/// Bits per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bitrate(pub u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseBitrateError {
    #[error("bitrate is empty")]
    Empty,
    #[error("invalid bitrate '{0}' (expected e.g. 2000k, 5M or 128000)")]
    Invalid(String),
    #[error("bitrate must be greater than zero")]
    Zero,
}

impl FromStr for Bitrate {
    type Err = ParseBitrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseBitrateError::Empty);
        }
        let (digits, scale) = match s.char_indices().last() {
            Some((i, 'k' | 'K')) => (&s[..i], 1_000),
            Some((i, 'm' | 'M')) => (&s[..i], 1_000_000),
            _                    => (s, 1),
        };
        let n: u64 = digits.trim().parse()
            .map_err(|_| ParseBitrateError::Invalid(s.to_string()))?;
        if n == 0 {
            return Err(ParseBitrateError::Zero);
        }
        n.checked_mul(scale)
            .map(Bitrate)
            .ok_or_else(|| ParseBitrateError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            b if b % 1_000_000 == 0 => write!(f, "{}M", b / 1_000_000),
            b if b % 1_000 == 0     => write!(f, "{}k", b / 1_000),
            b                       => write!(f, "{b}"),
        }
    }
}

/// Video bitrate choices offered by the Convert tab (index 2 is the default).
pub const VIDEO_BITRATES: &[&str] = &["500k", "1000k", "2000k", "5000k", "10000k", "20000k"];
/// Audio bitrate choices offered by the Convert tab (index 1 is the default).
pub const AUDIO_BITRATES: &[&str] = &["64k", "128k", "192k", "256k", "320k"];
pub const VIDEO_CODECS:   &[&str] = &["libx264", "mpeg4", "libxvid", "libvpx"];
pub const AUDIO_CODECS:   &[&str] = &["aac", "mp3", "libvorbis"];

// ── Container ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    Avi,
    Mov,
    Mkv,
    Flv,
}

impl Container {
    pub const ALL: [Container; 5] = [
        Container::Mp4, Container::Avi, Container::Mov, Container::Mkv, Container::Flv,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Avi => "avi",
            Container::Mov => "mov",
            Container::Mkv => "mkv",
            Container::Flv => "flv",
        }
    }

    /// FFmpeg muxer short name.
    pub fn muxer(self) -> &'static str {
        match self {
            Container::Mkv => "matroska",
            other          => other.extension(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Container::Mp4 => "MP4",
            Container::Avi => "AVI",
            Container::Mov => "MOV",
            Container::Mkv => "MKV",
            Container::Flv => "FLV",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported container '{0}'")]
pub struct ParseContainerError(pub String);

impl FromStr for Container {
    type Err = ParseContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.');
        Container::ALL.into_iter()
            .find(|c| c.extension().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseContainerError(s.to_string()))
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Write settings ────────────────────────────────────────────────────────────

/// Where the audio side-file lives while an output is being written.
#[derive(Clone, Debug, PartialEq)]
pub struct TempAudio {
    pub dir:    PathBuf,
    /// Delete the side-file once the output has been written.
    pub remove: bool,
}

impl Default for TempAudio {
    fn default() -> Self {
        Self { dir: std::env::temp_dir(), remove: true }
    }
}

/// Everything MediaEngine::write needs besides the timeline and output path.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteSettings {
    pub video_codec:   String,
    pub audio_codec:   String,
    /// `None` keeps the timeline's own frame rate.
    pub frame_rate:    Option<f64>,
    /// `None` lets the encoder pick (CRF for x264).
    pub video_bitrate: Option<Bitrate>,
    pub audio_bitrate: Option<Bitrate>,
    /// `None` infers the muxer from the output extension.
    pub container:     Option<Container>,
    pub temp_audio:    TempAudio,
}

impl WriteSettings {
    /// Fixed H.264 + AAC pair used by Clip and Merge.
    pub fn h264_aac(temp_audio: TempAudio) -> Self {
        Self {
            video_codec:   "libx264".into(),
            audio_codec:   "aac".into(),
            frame_rate:    None,
            video_bitrate: None,
            audio_bitrate: None,
            container:     None,
            temp_audio,
        }
    }
}

// ── Numeric helpers ───────────────────────────────────────────────────────────

/// Express a frame rate as a rational `(num, den)`.
///
/// NTSC rates (29.97, 23.976, 59.94) map to `n*1000/1001`; whole rates to
/// `n/1`; anything else to millihertz precision.
///
/// ```
/// use clipdesk_core::encoding::frame_rate_ratio;
/// assert_eq!(frame_rate_ratio(30.0),   (30, 1));
/// assert_eq!(frame_rate_ratio(29.97),  (30000, 1001));
/// assert_eq!(frame_rate_ratio(12.5),   (25, 2));
/// ```
pub fn frame_rate_ratio(fps: f64) -> (i32, i32) {
    let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
    if (fps - fps.round()).abs() < 1e-3 {
        return (fps.round() as i32, 1);
    }
    let ntsc = (fps * 1001.0 / 1000.0).round();
    if (ntsc * 1000.0 / 1001.0 - fps).abs() < 5e-3 {
        return (ntsc as i32 * 1000, 1001);
    }
    let num = (fps * 1000.0).round() as i32;
    let g   = gcd(num, 1000);
    (num / g, 1000 / g)
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 { a.abs().max(1) } else { gcd(b, a % b) }
}

/// Round a dimension up to the next even value (YUV420P needs even sizes).
pub fn even(n: u32) -> u32 {
    (n.max(2) + 1) & !1
}
