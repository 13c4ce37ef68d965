// crates/clipdesk-core/src/validate.rs
//
// Turns a tab's draft into an OperationRequest, or says why it can't.
// Runs synchronously on the UI thread before any worker exists; a rejected
// draft never reaches the media engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::encoding::{Bitrate, ParseBitrateError};
use crate::helpers::paths::{ensure_extension, merge_output};
use crate::media_types::container_of;
use crate::operation::{
    ClipParams, ConvertParams, MergeParams, OperationParams, OperationRequest,
};
use crate::state::{ClipTabState, ConvertTabState, MergeTabState};

/// Slack allowed past the probed duration before a clip end is rejected.
/// Spinners work in whole seconds while durations are fractional.
const END_SLACK_SECS: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Please select a video file first.")]
    NoInput,
    #[error("Please add at least one video file.")]
    NoMergeInputs,
    #[error("Please choose an output file.")]
    NoOutput,
    #[error("Start time cannot be negative.")]
    NegativeStart,
    #[error("End time ({end:.1}s) must be after start time ({start:.1}s).")]
    EndNotAfterStart { start: f64, end: f64 },
    #[error("End time ({end:.1}s) is beyond the video duration ({duration:.1}s).")]
    EndBeyondDuration { end: f64, duration: f64 },
    #[error("All videos must have the same format to merge (found: {}).", .found.join(", "))]
    MixedContainers { found: Vec<String> },
    #[error("Frame rate must be greater than zero.")]
    InvalidFrameRate,
    #[error("Video bitrate: {0}")]
    VideoBitrate(ParseBitrateError),
    #[error("Audio bitrate: {0}")]
    AudioBitrate(ParseBitrateError),
    #[error("Resolution must be positive (got {width}x{height}).")]
    InvalidResolution { width: u32, height: u32 },
}

fn output_path(raw: &str) -> Result<PathBuf, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        Err(ValidationError::NoOutput)
    } else {
        Ok(PathBuf::from(raw))
    }
}

// ── Clip ──────────────────────────────────────────────────────────────────────

pub fn clip_request(tab: &ClipTabState) -> Result<OperationRequest, ValidationError> {
    let input  = tab.input.clone().ok_or(ValidationError::NoInput)?;
    let output = output_path(&tab.output)?;

    let start = tab.start_secs;
    if start < 0.0 {
        return Err(ValidationError::NegativeStart);
    }

    let duration = tab.descriptor().map(|d| d.duration_seconds);
    if let Some(end) = tab.end_secs {
        if let Some(duration) = duration {
            if end > duration + END_SLACK_SECS {
                return Err(ValidationError::EndBeyondDuration { end, duration });
            }
        }
    }

    // Clamp before comparing; an end inside the slack can land on start.
    let end_seconds = tab.end_secs.map(|e| duration.map_or(e, |d| e.min(d)));
    // With no explicit end and no probe the worker resolves the end itself.
    if let Some(end) = end_seconds.or(duration) {
        if end <= start {
            return Err(ValidationError::EndNotAfterStart { start, end });
        }
    }

    Ok(OperationRequest {
        inputs:      vec![input],
        output_path: output,
        params:      OperationParams::Clip(ClipParams {
            start_seconds: Some(start),
            end_seconds,
        }),
    })
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// Only checked rows are merged; unchecked ones are not format-checked either.
pub fn merge_request(tab: &MergeTabState) -> Result<OperationRequest, ValidationError> {
    let inputs = tab.included_paths();
    if inputs.is_empty() {
        return Err(ValidationError::NoMergeInputs);
    }
    if tab.output_dir.trim().is_empty() || tab.output_name.trim().is_empty() {
        return Err(ValidationError::NoOutput);
    }
    check_same_container(&inputs)?;

    Ok(OperationRequest {
        output_path: merge_output(PathBuf::from(tab.output_dir.trim()).as_path(), &tab.output_name),
        inputs,
        params:      OperationParams::Merge(MergeParams),
    })
}

/// Every path must share one extension (case-insensitive). A path with no
/// extension counts as its own format.
pub fn check_same_container(paths: &[PathBuf]) -> Result<(), ValidationError> {
    let mut found: Vec<String> = Vec::new();
    for p in paths {
        let c = container_of(p).unwrap_or_else(|| "(none)".into());
        if !found.contains(&c) {
            found.push(c);
        }
    }
    if found.len() > 1 {
        Err(ValidationError::MixedContainers { found })
    } else {
        Ok(())
    }
}

// ── Convert ───────────────────────────────────────────────────────────────────

pub fn convert_request(tab: &ConvertTabState) -> Result<OperationRequest, ValidationError> {
    let input  = tab.input.clone().ok_or(ValidationError::NoInput)?;
    let output = output_path(&tab.output)?;
    let o      = &tab.options;

    if !(o.frame_rate > 0.0 && o.frame_rate.is_finite()) {
        return Err(ValidationError::InvalidFrameRate);
    }
    let video_bitrate: Bitrate = o.video_bitrate.parse().map_err(ValidationError::VideoBitrate)?;
    let audio_bitrate: Bitrate = o.audio_bitrate.parse().map_err(ValidationError::AudioBitrate)?;

    let resize = !o.keep_resolution;
    if resize && (o.width == 0 || o.height == 0) {
        return Err(ValidationError::InvalidResolution { width: o.width, height: o.height });
    }

    Ok(OperationRequest {
        inputs:      vec![input],
        output_path: ensure_extension(&output, o.container.extension()),
        params:      OperationParams::Convert(ConvertParams {
            target_container: o.container,
            video_codec:      o.video_codec.clone(),
            audio_codec:      o.audio_codec.clone(),
            frame_rate:       o.frame_rate,
            video_bitrate,
            audio_bitrate,
            resize,
            target_width:     o.width,
            target_height:    o.height,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Container;
    use crate::media_types::MediaDescriptor;
    use std::path::Path;

    fn probed(path: &str, secs: f64) -> MediaDescriptor {
        MediaDescriptor {
            path:                   PathBuf::from(path),
            container_format:       "MP4".into(),
            width:                  1920,
            height:                 1080,
            frame_rate:             30.0,
            duration_seconds:       secs,
            estimated_bitrate_kbps: 4000,
        }
    }

    fn clip_tab(secs: f64) -> ClipTabState {
        let mut t = ClipTabState::default();
        t.load(PathBuf::from("/v/a.mp4"));
        t.apply_probe(Path::new("/v/a.mp4"), Ok(probed("/v/a.mp4", secs)));
        t
    }

    #[test]
    fn clip_range_becomes_request() {
        let mut t = clip_tab(120.0);
        t.start_secs = 10.0;
        t.end_secs   = Some(40.0);
        let r = clip_request(&t).unwrap();
        assert_eq!(r.inputs, vec![PathBuf::from("/v/a.mp4")]);
        assert_eq!(r.output_path, PathBuf::from("/v/a_clip.mp4"));
        assert_eq!(
            r.params,
            OperationParams::Clip(ClipParams { start_seconds: Some(10.0), end_seconds: Some(40.0) }),
        );
    }

    #[test]
    fn clip_rejects_bad_ranges() {
        let mut t = clip_tab(120.0);
        t.start_secs = 50.0;
        t.end_secs   = Some(50.0);
        assert!(matches!(clip_request(&t), Err(ValidationError::EndNotAfterStart { .. })));

        t.start_secs = 0.0;
        t.end_secs   = Some(200.0);
        assert!(matches!(clip_request(&t), Err(ValidationError::EndBeyondDuration { .. })));

        t.start_secs = -1.0;
        t.end_secs   = Some(10.0);
        assert_eq!(clip_request(&t), Err(ValidationError::NegativeStart));
    }

    #[test]
    fn clip_end_is_clamped_within_slack() {
        let mut t = clip_tab(119.6);
        t.end_secs = Some(120.0);
        let r = clip_request(&t).unwrap();
        let OperationParams::Clip(p) = r.params else { panic!("not a clip") };
        assert_eq!(p.end_seconds, Some(119.6));
    }

    #[test]
    fn clip_start_at_duration_is_rejected_even_inside_slack() {
        let mut t = clip_tab(10.0);
        t.start_secs = 10.0;
        t.end_secs   = Some(11.0);
        assert_eq!(
            clip_request(&t),
            Err(ValidationError::EndNotAfterStart { start: 10.0, end: 10.0 }),
        );

        t.end_secs = None;
        assert!(matches!(clip_request(&t), Err(ValidationError::EndNotAfterStart { .. })));
    }

    #[test]
    fn clip_without_probe_leaves_end_to_worker() {
        let mut t = ClipTabState::default();
        t.load(PathBuf::from("/v/a.mp4"));
        let r = clip_request(&t).unwrap();
        let OperationParams::Clip(p) = r.params else { panic!("not a clip") };
        assert_eq!(p.end_seconds, None);
    }

    #[test]
    fn clip_needs_input_and_output() {
        assert_eq!(clip_request(&ClipTabState::default()), Err(ValidationError::NoInput));
        let mut t = clip_tab(10.0);
        t.output = "  ".into();
        assert_eq!(clip_request(&t), Err(ValidationError::NoOutput));
    }

    #[test]
    fn merge_rejects_mixed_formats() {
        let mut m = MergeTabState::default();
        m.add(vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/b.avi")]);
        m.output_name = "out".into();
        match merge_request(&m) {
            Err(ValidationError::MixedContainers { found }) => {
                assert_eq!(found, vec!["MP4".to_string(), "AVI".to_string()]);
            }
            other => panic!("expected mixed containers, got {other:?}"),
        }
    }

    #[test]
    fn merge_compares_extensions_case_insensitively() {
        let mut m = MergeTabState::default();
        m.add(vec![PathBuf::from("/v/a.MP4"), PathBuf::from("/v/b.mp4")]);
        m.output_name = "joined".into();
        let r = merge_request(&m).unwrap();
        assert_eq!(r.output_path, PathBuf::from("/v/joined.mp4"));
        assert_eq!(r.inputs.len(), 2);
    }

    #[test]
    fn merge_needs_files_and_name() {
        let mut m = MergeTabState::default();
        assert_eq!(merge_request(&m), Err(ValidationError::NoMergeInputs));
        m.add(vec![PathBuf::from("/v/a.mp4")]);
        assert_eq!(merge_request(&m), Err(ValidationError::NoOutput));
    }

    #[test]
    fn merge_uses_checked_rows_only() {
        let mut m = MergeTabState::default();
        let ids = m.add(vec![
            PathBuf::from("/v/a.mp4"),
            PathBuf::from("/v/b.avi"),
            PathBuf::from("/v/c.mp4"),
        ]);
        m.output_name = "joined".into();
        m.set_included(ids[1].0, false);

        let r = merge_request(&m).unwrap();
        assert_eq!(r.inputs, vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/c.mp4")]);

        m.set_included(ids[0].0, false);
        m.set_included(ids[2].0, false);
        assert_eq!(merge_request(&m), Err(ValidationError::NoMergeInputs));
    }

    fn convert_tab() -> ConvertTabState {
        let mut c = ConvertTabState::default();
        c.load(PathBuf::from("/v/a.mov"));
        c
    }

    #[test]
    fn convert_builds_settings() {
        let mut c = convert_tab();
        c.options.container = Container::Mkv;
        c.output = "/out/final".into();
        let r = convert_request(&c).unwrap();
        assert_eq!(r.output_path, PathBuf::from("/out/final.mkv"));
        let OperationParams::Convert(p) = r.params else { panic!("not a convert") };
        assert_eq!(p.video_bitrate, Bitrate(2_000_000));
        assert_eq!(p.audio_bitrate, Bitrate(128_000));
        assert!(p.resize);
    }

    #[test]
    fn convert_rejects_bad_settings() {
        let mut c = convert_tab();
        c.options.frame_rate = 0.0;
        assert_eq!(convert_request(&c), Err(ValidationError::InvalidFrameRate));

        let mut c = convert_tab();
        c.options.video_bitrate = "fast".into();
        assert!(matches!(convert_request(&c), Err(ValidationError::VideoBitrate(_))));

        let mut c = convert_tab();
        c.options.width = 0;
        assert!(matches!(convert_request(&c), Err(ValidationError::InvalidResolution { .. })));

        // Zero size is irrelevant when keeping the source resolution.
        c.options.keep_resolution = true;
        assert!(convert_request(&c).is_ok());
    }
}
