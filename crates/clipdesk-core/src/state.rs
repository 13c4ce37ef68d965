// crates/clipdesk-core/src/state.rs
//
// Per-tab drafts and persisted preferences; no egui, no ffmpeg, no runtime
// handles. Tabs read these and emit EditorCommands; app.rs mutates them.
//
// Run status (busy / progress / notices) is NOT here: it belongs to the
// OperationController that owns the tab's worker.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encoding::{Container, AUDIO_BITRATES, AUDIO_CODECS, VIDEO_BITRATES, VIDEO_CODECS};
use crate::helpers::paths::{default_clip_output, default_convert_output};
use crate::media_types::{is_video_path, MediaDescriptor};

/// Which slot a probe result belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeTarget {
    Clip,
    Convert,
    Merge(Uuid),
}

/// Probe outcome as the UI keeps it: the descriptor or the error text.
pub type ProbeOutcome = Result<MediaDescriptor, String>;

// ── Clip ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct ClipTabState {
    pub input:       Option<PathBuf>,
    pub probe:       Option<ProbeOutcome>,
    pub start_secs:  f64,
    /// `None` = to the end of the file (used while the duration is unknown).
    pub end_secs:    Option<f64>,
    pub output:      String,
    /// Preview position, seconds from the first frame.
    pub playhead_secs: f64,
    pub playing:     bool,
}

impl ClipTabState {
    pub fn load(&mut self, path: PathBuf) {
        self.output     = default_clip_output(&path).to_string_lossy().into_owned();
        self.input      = Some(path);
        self.probe      = None;
        self.start_secs = 0.0;
        self.end_secs   = None;
        self.playhead_secs = 0.0;
        self.playing    = false;
    }

    pub fn descriptor(&self) -> Option<&MediaDescriptor> {
        self.probe.as_ref().and_then(|p| p.as_ref().ok())
    }

    pub fn duration(&self) -> Option<f64> {
        self.descriptor().map(|d| d.duration_seconds)
    }

    /// Move the playhead, kept within the file. Returns the new position.
    pub fn seek(&mut self, secs: f64) -> f64 {
        let upper = self.duration().unwrap_or(f64::INFINITY);
        self.playhead_secs = secs.clamp(0.0, upper.max(0.0));
        self.playhead_secs
    }

    /// Start the range at the playhead. An end at or before it opens back up
    /// to the end of the file.
    pub fn mark_start(&mut self) {
        self.start_secs = self.playhead_secs;
        if self.end_secs.is_some_and(|e| e <= self.start_secs) {
            self.end_secs = self.duration();
        }
    }

    /// End the range at the playhead. A start at or after it moves back to 0.
    pub fn mark_end(&mut self) {
        self.end_secs = Some(self.playhead_secs);
        if self.start_secs >= self.playhead_secs {
            self.start_secs = 0.0;
        }
    }

    /// Whole file again.
    pub fn reset_range(&mut self) {
        self.start_secs = 0.0;
        self.end_secs   = self.duration();
    }

    pub fn apply_probe(&mut self, path: &Path, outcome: ProbeOutcome) {
        if self.input.as_deref() != Some(path) {
            return; // stale result for a file that was replaced
        }
        if let Ok(d) = &outcome {
            self.end_secs = Some(d.duration_seconds);
        }
        self.probe = Some(outcome);
    }

    /// Selected range length, when both ends are known.
    pub fn selection_secs(&self) -> Option<f64> {
        let end = self.end_secs.or_else(|| self.descriptor().map(|d| d.duration_seconds))?;
        Some((end - self.start_secs).max(0.0))
    }
}

// ── Merge ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct MergeEntry {
    pub id:       Uuid,
    pub path:     PathBuf,
    pub probe:    Option<ProbeOutcome>,
    /// Unchecked rows stay in the list but are left out of the merge.
    pub included: bool,
}

impl MergeEntry {
    pub fn descriptor(&self) -> Option<&MediaDescriptor> {
        self.probe.as_ref().and_then(|p| p.as_ref().ok())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MergeTabState {
    pub entries:     Vec<MergeEntry>,
    pub selected:    Option<Uuid>,
    pub output_dir:  String,
    pub output_name: String,
}

impl MergeTabState {
    /// Append the video files among `paths`. Returns the (id, path) pairs that
    /// need probing.
    pub fn add(&mut self, paths: Vec<PathBuf>) -> Vec<(Uuid, PathBuf)> {
        let mut added = Vec::new();
        for path in paths.into_iter().filter(|p| is_video_path(p)) {
            if self.output_dir.is_empty() {
                if let Some(dir) = path.parent() {
                    self.output_dir = dir.to_string_lossy().into_owned();
                }
            }
            let id = Uuid::new_v4();
            self.entries.push(MergeEntry { id, path: path.clone(), probe: None, included: true });
            added.push((id, path));
        }
        added
    }

    pub fn remove(&mut self, id: Uuid) {
        self.entries.retain(|e| e.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    /// Swap `id` with its neighbour. No-op at either end of the list.
    pub fn move_entry(&mut self, id: Uuid, up: bool) {
        let Some(i) = self.entries.iter().position(|e| e.id == id) else { return };
        let j = if up { i.checked_sub(1) } else { Some(i + 1) };
        if let Some(j) = j.filter(|&j| j < self.entries.len()) {
            self.entries.swap(i, j);
        }
    }

    pub fn apply_probe(&mut self, id: Uuid, outcome: ProbeOutcome) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.id == id) {
            e.probe = Some(outcome);
        }
    }

    pub fn set_included(&mut self, id: Uuid, included: bool) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.id == id) {
            e.included = included;
        }
    }

    /// Paths of the checked rows, in list order.
    pub fn included_paths(&self) -> Vec<PathBuf> {
        self.entries.iter().filter(|e| e.included).map(|e| e.path.clone()).collect()
    }

    /// Sum of the checked rows' probed durations; unknown entries count as zero.
    pub fn total_secs(&self) -> f64 {
        self.entries.iter()
            .filter(|e| e.included)
            .filter_map(|e| e.descriptor())
            .map(|d| d.duration_seconds)
            .sum()
    }
}

// ── Convert ───────────────────────────────────────────────────────────────────

/// The Convert tab's form fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertOptions {
    pub container:       Container,
    pub video_codec:     String,
    pub audio_codec:     String,
    pub frame_rate:      f64,
    pub video_bitrate:   String,
    pub audio_bitrate:   String,
    /// `true` = write at the source resolution.
    pub keep_resolution: bool,
    pub width:           u32,
    pub height:          u32,
}

impl ConvertOptions {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            container:       prefs.convert_container,
            video_codec:     prefs.convert_video_codec.clone(),
            audio_codec:     prefs.convert_audio_codec.clone(),
            frame_rate:      30.0,
            video_bitrate:   prefs.convert_video_bitrate.clone(),
            audio_bitrate:   prefs.convert_audio_bitrate.clone(),
            keep_resolution: false,
            width:           1920,
            height:          1080,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConvertTabState {
    pub input:   Option<PathBuf>,
    pub probe:   Option<ProbeOutcome>,
    pub options: ConvertOptions,
    pub output:  String,
}

impl Default for ConvertTabState {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default())
    }
}

impl ConvertTabState {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            input:   None,
            probe:   None,
            options: ConvertOptions::from_preferences(prefs),
            output:  String::new(),
        }
    }

    pub fn load(&mut self, path: PathBuf) {
        self.output = default_convert_output(&path, self.options.container).to_string_lossy().into_owned();
        self.input  = Some(path);
        self.probe  = None;
    }

    pub fn descriptor(&self) -> Option<&MediaDescriptor> {
        self.probe.as_ref().and_then(|p| p.as_ref().ok())
    }

    /// Seeds resolution and frame rate from the probe.
    pub fn apply_probe(&mut self, path: &Path, outcome: ProbeOutcome) {
        if self.input.as_deref() != Some(path) {
            return;
        }
        if let Ok(d) = &outcome {
            if d.width > 0 && d.height > 0 {
                self.options.width  = d.width;
                self.options.height = d.height;
            }
            if d.frame_rate > 0.0 {
                self.options.frame_rate = d.frame_rate;
            }
        }
        self.probe = Some(outcome);
    }

    /// Replace the form fields. A container change rewrites the default
    /// output's extension.
    pub fn set_options(&mut self, options: ConvertOptions) {
        let container_changed = options.container != self.options.container;
        self.options = options;
        if container_changed {
            if let Some(input) = &self.input {
                self.output = default_convert_output(input, self.options.container)
                    .to_string_lossy()
                    .into_owned();
            }
        }
    }
}

// ── Preferences ───────────────────────────────────────────────────────────────

/// Persisted between sessions through eframe storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Directory the file pickers open in.
    #[serde(default)]
    pub last_dir:              Option<PathBuf>,
    #[serde(default = "default_container")]
    pub convert_container:     Container,
    #[serde(default = "default_video_codec")]
    pub convert_video_codec:   String,
    #[serde(default = "default_audio_codec")]
    pub convert_audio_codec:   String,
    #[serde(default = "default_video_bitrate")]
    pub convert_video_bitrate: String,
    #[serde(default = "default_audio_bitrate")]
    pub convert_audio_bitrate: String,
}

fn default_container()     -> Container { Container::Mp4 }
fn default_video_codec()   -> String { VIDEO_CODECS[0].into() }
fn default_audio_codec()   -> String { AUDIO_CODECS[0].into() }
fn default_video_bitrate() -> String { VIDEO_BITRATES[2].into() }
fn default_audio_bitrate() -> String { AUDIO_BITRATES[1].into() }

impl Default for Preferences {
    fn default() -> Self {
        Self {
            last_dir:              None,
            convert_container:     default_container(),
            convert_video_codec:   default_video_codec(),
            convert_audio_codec:   default_audio_codec(),
            convert_video_bitrate: default_video_bitrate(),
            convert_audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl Preferences {
    /// Remember the convert choices the user just ran with.
    pub fn remember_convert(&mut self, options: &ConvertOptions) {
        self.convert_container     = options.container;
        self.convert_video_codec   = options.video_codec.clone();
        self.convert_audio_codec   = options.audio_codec.clone();
        self.convert_video_bitrate = options.video_bitrate.clone();
        self.convert_audio_bitrate = options.audio_bitrate.clone();
    }
}

// ── Whole editor ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct EditorState {
    pub clip:    ClipTabState,
    pub merge:   MergeTabState,
    pub convert: ConvertTabState,
    pub prefs:   Preferences,
}

impl EditorState {
    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            convert: ConvertTabState::from_preferences(&prefs),
            prefs,
            ..Default::default()
        }
    }

    /// Route a probe result to the slot that asked for it.
    pub fn apply_probe(&mut self, target: ProbeTarget, path: &Path, outcome: ProbeOutcome) {
        match target {
            ProbeTarget::Clip      => self.clip.apply_probe(path, outcome),
            ProbeTarget::Convert   => self.convert.apply_probe(path, outcome),
            ProbeTarget::Merge(id) => self.merge.apply_probe(id, outcome),
        }
    }
}
