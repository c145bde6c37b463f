//! Advisory lock on a local mirror tree
//!
//! Workers never share a file within one run, but two runs pointed at the
//! same tree would. The CLI takes an exclusive `fd-lock` on a lock file in
//! the local root for the whole run and refuses to start if another process
//! holds it.

use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the lock file created in the local root
pub const LOCK_FILE_NAME: &str = ".himawari-downloader.lock";

/// Lock errors
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock file could not be opened
    #[error("failed to open lock file {path}: {reason}")]
    OpenFailed {
        /// Lock file path
        path: PathBuf,
        /// OS error
        reason: String,
    },

    /// Another process holds the lock
    #[error("{path} is locked by another run: {reason}")]
    Held {
        /// Lock file path
        path: PathBuf,
        /// OS error
        reason: String,
    },
}

/// Lock file for one local root
///
/// Call [`RunLock::try_hold`] and keep the guard alive for as long as the
/// tree is being written; the lock is released when the guard drops.
pub struct RunLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl RunLock {
    /// Open (creating if needed) the lock file inside `local_root`
    pub fn open(local_root: &Path) -> Result<Self, LockError> {
        let path = local_root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::OpenFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive lock without blocking
    pub fn try_hold(&mut self) -> Result<RwLockWriteGuard<'_, File>, LockError> {
        let path = self.path.clone();
        self.lock.try_write().map_err(|e| LockError::Held {
            path,
            reason: e.to_string(),
        })
    }
}
