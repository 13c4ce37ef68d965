// crates/clipdesk-ui/src/helpers/log.rs
//
// Logging setup for the whole process.
//
// Release builds on Windows have no console attached, so every event also
// goes to an append-only file in the work dir:
//
//   <work dir>/clipdesk.log
//
// Debug builds additionally log to stderr. RUST_LOG overrides the default
// filter, e.g. `RUST_LOG=clipdesk_media=trace`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILE: &str = "clipdesk.log";

const DEFAULT_FILTER: &str = "warn,clipdesk=info,clipdesk_media=info,clipdesk_core=info";

/// Install the global subscriber. Never panics; a log file that cannot be
/// opened just leaves the console layer (or nothing) in place.
pub fn init(dir: &Path) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = match OpenOptions::new().create(true).append(true).open(dir.join(LOG_FILE)) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        ),
        Err(e) => {
            eprintln!("[log] cannot open {}: {e}", dir.join(LOG_FILE).display());
            None
        }
    };

    let console_layer = cfg!(debug_assertions).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    // try_init: a second call (tests) must not panic.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
}
