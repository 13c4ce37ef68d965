// crates/clipdesk-media/src/fake.rs
//
// In-memory MediaEngine for worker and controller tests. Records every call;
// `write` never touches the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use clipdesk_core::encoding::WriteSettings;
use clipdesk_core::timeline::{Segment, Timeline};

use crate::engine::{Cancelled, MediaEngine};

#[derive(Debug, Clone)]
pub enum Call {
    Open(PathBuf),
    Write { timeline: Timeline, output: PathBuf, settings: WriteSettings },
}

#[derive(Default)]
pub struct FakeEngine {
    pub calls:     Mutex<Vec<Call>>,
    durations:     HashMap<PathBuf, f64>,
    size:          Option<(u32, u32)>,
    fail_open:     Option<PathBuf>,
    fail_write:    Option<String>,
    panic_write:   bool,
    /// Spin in `write` until cancelled.
    hold_write:    bool,
    /// Raise the cancel flag just as a successful write returns.
    late_cancel:   bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, path: &str, secs: f64) -> Self {
        self.durations.insert(PathBuf::from(path), secs);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn failing_open(mut self, path: &str) -> Self {
        self.fail_open = Some(PathBuf::from(path));
        self
    }

    pub fn failing_write(mut self, msg: &str) -> Self {
        self.fail_write = Some(msg.to_string());
        self
    }

    pub fn panicking_write(mut self) -> Self {
        self.panic_write = true;
        self
    }

    pub fn holding_write(mut self) -> Self {
        self.hold_write = true;
        self
    }

    pub fn cancelling_after_write(mut self) -> Self {
        self.late_cancel = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn writes(&self) -> Vec<(Timeline, PathBuf, WriteSettings)> {
        self.calls().into_iter()
            .filter_map(|c| match c {
                Call::Write { timeline, output, settings } => Some((timeline, output, settings)),
                Call::Open(_) => None,
            })
            .collect()
    }
}

impl MediaEngine for FakeEngine {
    fn open(&self, path: &Path) -> Result<Timeline> {
        self.calls.lock().push(Call::Open(path.to_path_buf()));
        if self.fail_open.as_deref() == Some(path) {
            return Err(anyhow!("cannot open '{}'", path.display()));
        }
        let duration = self.durations.get(path).copied().unwrap_or(10.0);
        let (w, h) = self.size.unwrap_or((1920, 1080));
        Ok(Timeline::single(
            Segment { path: path.to_path_buf(), source_offset: 0.0, duration, has_audio: true },
            w,
            h,
            30.0,
        ))
    }

    fn write(
        &self,
        timeline: &Timeline,
        output:   &Path,
        settings: &WriteSettings,
        cancel:   &AtomicBool,
        progress: &mut dyn FnMut(f32),
    ) -> Result<()> {
        self.calls.lock().push(Call::Write {
            timeline: timeline.clone(),
            output:   output.to_path_buf(),
            settings: settings.clone(),
        });
        if self.panic_write {
            panic!("encoder exploded");
        }
        if let Some(msg) = &self.fail_write {
            progress(0.3);
            return Err(anyhow!("{msg}"));
        }
        if self.hold_write {
            while !cancel.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(2));
            }
            return Err(Cancelled.into());
        }
        for step in 1..=4 {
            progress(step as f32 / 4.0);
        }
        if self.late_cancel {
            cancel.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}
