// crates/clipdesk-ui/src/helpers/env.rs
//
// Environment-driven settings. Everything else the user can change lives in
// Preferences and is persisted through eframe storage.

use std::path::PathBuf;

/// Overrides the directory used for the log file, the instance lock and the
/// temporary audio side-files.
pub const TEMP_DIR_VAR: &str = "CLIPDESK_TEMP_DIR";

/// Set to "1" to leave temporary audio side-files behind for inspection.
pub const KEEP_TEMP_AUDIO_VAR: &str = "CLIPDESK_KEEP_TEMP_AUDIO";

/// Resolved work directory. Logging is not up yet when this is decided, so
/// a fallback is handed back for the caller to report.
#[derive(Debug)]
pub struct WorkDir {
    pub path:     PathBuf,
    /// Why the configured directory could not be used.
    pub fallback: Option<String>,
}

pub fn work_dir() -> WorkDir {
    resolve_work_dir(std::env::var_os(TEMP_DIR_VAR).map(PathBuf::from))
}

fn resolve_work_dir(configured: Option<PathBuf>) -> WorkDir {
    match configured {
        Some(dir) if !dir.as_os_str().is_empty() => match std::fs::create_dir_all(&dir) {
            Ok(()) => WorkDir { path: dir, fallback: None },
            Err(e) => WorkDir {
                path:     std::env::temp_dir(),
                fallback: Some(format!("{TEMP_DIR_VAR}={}: {e}", dir.display())),
            },
        },
        _ => WorkDir { path: std::env::temp_dir(), fallback: None },
    }
}

pub fn keep_temp_audio() -> bool {
    std::env::var(KEEP_TEMP_AUDIO_VAR).is_ok_and(|v| v == "1")
}
