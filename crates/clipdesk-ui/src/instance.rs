// crates/clipdesk-ui/src/instance.rs
//
// Single-instance guard.
//
// The first process to start takes an exclusive OS lock on
// `<work dir>/clipdesk.lock` and writes its PID into it. The lock belongs to
// the open file handle, so it disappears with the process even after a
// crash; a leftover file with no lock holder is simply reclaimed.
//
// The file is never deleted. A launch that opened it just before we exit
// then locks the same file every later launch opens, so at most one of
// them wins.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const LOCK_FILE: &str = "clipdesk.lock";

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("another ClipDesk instance is already running")]
    AlreadyRunning { pid: Option<u32> },
    #[error("instance lock '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    // Keeps the OS lock alive.
    file: File,
}

impl InstanceGuard {
    pub fn acquire(dir: &Path) -> Result<Self, InstanceError> {
        let path = dir.join(LOCK_FILE);
        let io_err = |source| InstanceError::Io { path: path.clone(), source };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(InstanceError::AlreadyRunning { pid: read_pid(&mut file) });
            }
            Err(TryLockError::Error(e)) => return Err(io_err(e)),
        }

        // Either a fresh file or a stale one from a process that died.
        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        write!(file, "{}", std::process::id()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        tracing::debug!("[instance] lock taken at {}", path.display());
        Ok(Self { path, file })
    }
}

impl Drop for InstanceGuard {
    /// Clears the PID while the lock is still held; closing the handle then
    /// releases the lock.
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            tracing::debug!("[instance] clear {}: {e}", self.path.display());
        }
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}
