// crates/clipdesk-core/src/media_types.rs
//
// Types that flow across the channel between clipdesk-media and clipdesk-ui.
// No egui, no ffmpeg; just plain data.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::helpers::time::format_duration;

/// Placeholder shown wherever probe metadata is unavailable.
pub const UNKNOWN: &str = "unknown";

/// Read-only metadata for one video file, produced by the probe when a tab
/// loads a file. Never mutated; a new probe replaces it wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub path:             PathBuf,
    /// Upper-cased file extension (`"MP4"`), or the demuxer name when the
    /// path has none.
    pub container_format: String,
    pub width:            u32,
    pub height:           u32,
    pub frame_rate:       f64,
    pub duration_seconds: f64,
    /// Whole-file size divided by duration, in kbit/s.
    ///
    /// This is a coarse approximation that includes audio and container
    /// overhead. It is NOT the encoded video stream bitrate and must not be
    /// fed back into an encoder as if it were.
    pub estimated_bitrate_kbps: u64,
}

impl MediaDescriptor {
    /// `1920x1080`
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// One-line summary used by the tab info panels.
    pub fn summary(&self) -> String {
        format!(
            "{} · {} · {:.2} fps · {} · ~{} kbps",
            self.container_format,
            self.resolution_label(),
            self.frame_rate,
            format_duration(self.duration_seconds),
            self.estimated_bitrate_kbps,
        )
    }
}

/// Summary line for a possibly-failed probe. Every field collapses to
/// "unknown" so a corrupt file never blocks selection.
pub fn describe(desc: Option<&MediaDescriptor>) -> String {
    match desc {
        Some(d) => d.summary(),
        None    => format!("{UNKNOWN} · {UNKNOWN} · {UNKNOWN} fps · {UNKNOWN}"),
    }
}

/// Container label for `path`: the upper-cased extension, or `None` when the
/// path has no extension. Merge validation compares these case-insensitively.
pub fn container_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_uppercase())
        .filter(|e| !e.is_empty())
}

/// Extensions accepted by the file pickers and drag-and-drop.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv"];

pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}
