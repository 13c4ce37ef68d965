// crates/clipdesk-core/src/timeline.rs
//
// Lazy edit description handed to MediaEngine::write.
//
// Opening a file yields a one-segment Timeline. Time-range extraction,
// concatenation and resizing are pure transformations of that description;
// nothing is decoded until the engine writes it out. Segments are played in
// order, back to back, and every segment is scaled to (width, height).

use std::path::PathBuf;

use thiserror::Error;

/// A contiguous range of one source file.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub path:          PathBuf,
    /// Seconds into the source at which this segment starts.
    pub source_offset: f64,
    pub duration:      f64,
    /// Sources without audio contribute silence for their duration.
    pub has_audio:     bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    pub segments:   Vec<Segment>,
    pub width:      u32,
    pub height:     u32,
    pub frame_rate: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("start ({start:.2}s) must be before end ({end:.2}s)")]
    EmptyRange { start: f64, end: f64 },
    #[error("range {start:.2}s–{end:.2}s is outside the {duration:.2}s source")]
    OutOfBounds { start: f64, end: f64, duration: f64 },
    #[error("nothing to concatenate")]
    NothingToConcatenate,
    #[error("invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Ranges may overshoot the source by this much (one frame at 20 fps) to
/// absorb rounding in probed durations.
const END_TOLERANCE: f64 = 0.05;

impl Timeline {
    /// Whole-file timeline, as returned by MediaEngine::open.
    pub fn single(segment: Segment, width: u32, height: u32, frame_rate: f64) -> Self {
        Self { segments: vec![segment], width, height, frame_rate }
    }

    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn has_audio(&self) -> bool {
        self.segments.iter().any(|s| s.has_audio)
    }

    /// Time-range extraction over `[start, end)` of this timeline.
    ///
    /// Ranges may cross segment boundaries; the result keeps only the covered
    /// parts of each segment. `end` is clamped to the duration when it
    /// overshoots by less than `END_TOLERANCE`.
    pub fn subclip(&self, start: f64, end: f64) -> Result<Timeline, EditError> {
        let duration = self.duration();
        if !(start < end) {
            return Err(EditError::EmptyRange { start, end });
        }
        if start < 0.0 || start >= duration || end > duration + END_TOLERANCE {
            return Err(EditError::OutOfBounds { start, end, duration });
        }
        let end = end.min(duration);

        let mut segments = Vec::new();
        let mut seg_start = 0.0;
        for seg in &self.segments {
            let seg_end = seg_start + seg.duration;
            let lo = start.max(seg_start);
            let hi = end.min(seg_end);
            if hi > lo {
                segments.push(Segment {
                    path:          seg.path.clone(),
                    source_offset: seg.source_offset + (lo - seg_start),
                    duration:      hi - lo,
                    has_audio:     seg.has_audio,
                });
            }
            seg_start = seg_end;
        }

        Ok(Timeline { segments, ..self.clone_header() })
    }

    /// Play `parts` back to back. Geometry and frame rate come from the
    /// first part; later parts are scaled to match.
    pub fn concatenate(parts: &[Timeline]) -> Result<Timeline, EditError> {
        let first = parts.first().ok_or(EditError::NothingToConcatenate)?;
        Ok(Timeline {
            segments: parts.iter().flat_map(|p| p.segments.iter().cloned()).collect(),
            ..first.clone_header()
        })
    }

    /// Scale every segment to `width x height`.
    pub fn resized(self, width: u32, height: u32) -> Result<Timeline, EditError> {
        if width == 0 || height == 0 {
            return Err(EditError::InvalidSize { width, height });
        }
        Ok(Timeline { width, height, ..self })
    }

    fn clone_header(&self) -> Timeline {
        Timeline {
            segments:   Vec::new(),
            width:      self.width,
            height:     self.height,
            frame_rate: self.frame_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, secs: f64) -> Timeline {
        Timeline::single(
            Segment {
                path:          PathBuf::from(name),
                source_offset: 0.0,
                duration:      secs,
                has_audio:     true,
            },
            1920, 1080, 30.0,
        )
    }

    #[test]
    fn subclip_of_single_file() {
        let t = file("a.mp4", 120.0).subclip(10.0, 40.0).unwrap();
        assert_eq!(t.segments.len(), 1);
        assert_eq!(t.segments[0].source_offset, 10.0);
        assert!((t.duration() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn subclip_across_concatenated_parts() {
        let joined = Timeline::concatenate(&[file("a", 5.0), file("b", 5.0)]).unwrap();
        let t = joined.subclip(3.0, 7.0).unwrap();
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].path, PathBuf::from("a"));
        assert_eq!(t.segments[0].source_offset, 3.0);
        assert_eq!(t.segments[1].path, PathBuf::from("b"));
        assert_eq!(t.segments[1].source_offset, 0.0);
        assert!((t.duration() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn subclip_rejects_inverted_and_out_of_range() {
        let f = file("a", 10.0);
        assert!(matches!(f.subclip(5.0, 5.0), Err(EditError::EmptyRange { .. })));
        assert!(matches!(f.subclip(2.0, 11.0), Err(EditError::OutOfBounds { .. })));
        assert!(matches!(f.subclip(-1.0, 3.0), Err(EditError::OutOfBounds { .. })));
    }

    #[test]
    fn subclip_tolerates_rounding_at_end() {
        let t = file("a", 10.0).subclip(0.0, 10.02).unwrap();
        assert_eq!(t.duration(), 10.0);
    }

    #[test]
    fn concatenate_keeps_order_and_first_geometry() {
        let mut small = file("c", 5.0);
        small.width = 640;
        small.height = 360;
        let t = Timeline::concatenate(&[file("a", 5.0), file("b", 5.0), small]).unwrap();
        let names: Vec<_> = t.segments.iter().map(|s| s.path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]);
        assert_eq!((t.width, t.height), (1920, 1080));
        assert!((t.duration() - 15.0).abs() < 1e-9);
        assert_eq!(Timeline::concatenate(&[]), Err(EditError::NothingToConcatenate));
    }

    #[test]
    fn resize_rejects_zero() {
        let t = file("a", 1.0).resized(1280, 720).unwrap();
        assert_eq!((t.width, t.height), (1280, 720));
        assert!(file("a", 1.0).resized(0, 720).is_err());
    }
}
