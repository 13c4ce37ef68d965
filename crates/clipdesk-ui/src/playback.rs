// crates/clipdesk-ui/src/playback.rs
//
// Wall-clock pacing for Clip preview playback.
//
// The preview thread decodes ahead into a bounded channel. Each UI frame the
// app pulls from it until it meets a frame that is not due yet; that one is
// held in `pending` and shown on a later frame. While paused every frame is
// due at once (scrub results).

use std::path::Path;
use std::time::Instant;

use clipdesk_media::PreviewFrame;

/// A frame this close ahead of the clock is shown now (one 60 Hz frame).
const DUE_SLACK_SECS: f64 = 1.0 / 60.0;

#[derive(Default)]
pub struct Playback {
    /// Wall time and media time when playback (re)started.
    clock:   Option<(Instant, f64)>,
    pending: Option<PreviewFrame>,
}

impl Playback {
    pub fn start(&mut self, from_secs: f64, now: Instant) {
        self.clock   = Some((now, from_secs));
        self.pending = None;
    }

    pub fn stop(&mut self) {
        self.clock   = None;
        self.pending = None;
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_some()
    }

    /// Media time the clock has reached, while running.
    pub fn position(&self, now: Instant) -> Option<f64> {
        self.clock.map(|(t0, from)| from + now.saturating_duration_since(t0).as_secs_f64())
    }

    /// Newest frame that is due by `now`. Frames for any other file than
    /// `path` are dropped.
    pub fn take_due(
        &mut self,
        mut next: impl FnMut() -> Option<PreviewFrame>,
        path:     Option<&Path>,
        now:      Instant,
    ) -> Option<PreviewFrame> {
        let limit = self.position(now).map(|p| p + DUE_SLACK_SECS);
        let mut due = None;
        while let Some(frame) = self.pending.take().or_else(&mut next) {
            if path != Some(frame.path.as_path()) {
                continue;
            }
            if limit.is_some_and(|l| frame.secs > l) {
                self.pending = Some(frame);
                break;
            }
            due = Some(frame);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::time::Duration;

    fn frame(path: &str, secs: f64) -> PreviewFrame {
        PreviewFrame { path: PathBuf::from(path), secs, width: 2, height: 2, rgba: vec![0; 16] }
    }

    #[test]
    fn paused_shows_the_newest_frame() {
        let mut pb = Playback::default();
        let mut q: VecDeque<_> = [frame("/a", 1.0), frame("/a", 5.0)].into();
        let got = pb.take_due(|| q.pop_front(), Some(Path::new("/a")), Instant::now());
        assert_eq!(got.map(|f| f.secs), Some(5.0));
        assert!(q.is_empty());
    }

    #[test]
    fn playing_holds_frames_until_their_time() {
        let t0 = Instant::now();
        let mut pb = Playback::default();
        pb.start(2.0, t0);
        let mut q: VecDeque<_> = (0..10).map(|i| frame("/a", 2.0 + f64::from(i) * 0.1)).collect();
        let path = Some(Path::new("/a"));

        let got = pb.take_due(|| q.pop_front(), path, t0);
        assert_eq!(got.map(|f| f.secs), Some(2.0));
        assert_eq!(q.len(), 8, "one shown, one held");

        let got = pb.take_due(|| q.pop_front(), path, t0 + Duration::from_millis(250));
        assert!((got.map_or(0.0, |f| f.secs) - 2.2).abs() < 1e-9);

        // Nothing new is due yet.
        assert!(pb.take_due(|| q.pop_front(), path, t0 + Duration::from_millis(260)).is_none());
        assert!((pb.position(t0 + Duration::from_secs(1)).unwrap_or(0.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn frames_from_another_file_are_dropped() {
        let mut pb = Playback::default();
        let mut q: VecDeque<_> = [frame("/a", 1.0), frame("/b", 0.0)].into();
        let got = pb.take_due(|| q.pop_front(), Some(Path::new("/b")), Instant::now());
        assert_eq!(got.map(|f| f.path), Some(PathBuf::from("/b")));

        let mut q: VecDeque<_> = [frame("/a", 1.0)].into();
        assert!(pb.take_due(|| q.pop_front(), None, Instant::now()).is_none());
    }

    #[test]
    fn stop_forgets_the_held_frame() {
        let t0 = Instant::now();
        let mut pb = Playback::default();
        pb.start(0.0, t0);
        let mut q: VecDeque<_> = [frame("/a", 3.0)].into();
        assert!(pb.take_due(|| q.pop_front(), Some(Path::new("/a")), t0).is_none());
        pb.stop();
        assert!(!pb.is_running());
        assert!(pb.take_due(|| None, Some(Path::new("/a")), t0).is_none());
    }
}
