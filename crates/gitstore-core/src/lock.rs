//! Per-tiddler write locks
//!
//! Writers take an advisory OS lock on a hidden sibling file
//! (`.<name>.lock`) before touching a tiddler. Acquisition is a bounded
//! polling loop rather than a queue: there is no fairness between waiters.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of acquisition attempts before giving up
pub const DEFAULT_LOCK_ATTEMPTS: u32 = 5;

/// Default pause between acquisition attempts
pub const DEFAULT_LOCK_BACKOFF: Duration = Duration::from_millis(100);

/// A single failed lock attempt
#[derive(Error, Debug)]
pub enum LockError {
    /// Another writer holds the lock
    #[error("'{path}' is locked by another writer")]
    Held { path: PathBuf },

    /// The lock file could not be opened
    #[error("Failed to open lock file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The lock could not be acquired within the retry budget
#[derive(Error, Debug)]
#[error("Could not lock '{path}' after {attempts} attempts: {source}")]
pub struct StoreLockError {
    /// The tiddler file that was being locked
    pub path: PathBuf,
    /// How many attempts were made
    pub attempts: u32,
    /// The failure from the last attempt
    #[source]
    pub source: LockError,
}

/// Bounded retry settings for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Fixed sleep between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOCK_ATTEMPTS,
            backoff: DEFAULT_LOCK_BACKOFF,
        }
    }
}

/// Scoped mutual exclusion on a file path
pub trait Locker: Send + Sync {
    /// Try once to lock `path`, without blocking
    fn acquire(&self, path: &Path) -> Result<LockGuard, LockError>;
}

/// A held lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    /// The path this guard protects
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting any unlock failure
    pub fn release(mut self) -> Result<(), LockError> {
        match self.file.take() {
            Some(file) => FileExt::unlock(&file).map_err(|source| LockError::Io {
                path: self.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

/// Advisory file locks backed by `flock`/`LockFileEx`
///
/// Locks conflict between processes and between separate acquisitions in
/// the same process.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLocker;

impl FileLocker {
    /// The lock file that guards `path`
    pub fn lock_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.lock", name))
    }
}

impl Locker for FileLocker {
    fn acquire(&self, path: &Path) -> Result<LockGuard, LockError> {
        let lock_path = Self::lock_path(path);

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: lock_path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| LockError::Io {
                path: lock_path.clone(),
                source,
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(LockGuard {
                path: path.to_path_buf(),
                file: Some(file),
            }),
            Err(err) if is_contended(&err) => Err(LockError::Held { path: lock_path }),
            Err(source) => Err(LockError::Io {
                path: lock_path,
                source,
            }),
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Acquire a lock on `path`, polling with a fixed backoff
///
/// Tries immediately, then up to `policy.attempts - 1` more times with
/// `policy.backoff` between tries.
pub fn acquire_with_retry(
    locker: &dyn Locker,
    path: &Path,
    policy: &RetryPolicy,
) -> Result<LockGuard, StoreLockError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match locker.acquire(path) {
            Ok(guard) => {
                debug!(path = %path.display(), attempt, "acquired write lock");
                return Ok(guard);
            }
            Err(source) if attempt >= attempts => {
                warn!(path = %path.display(), attempts, "giving up on write lock");
                return Err(StoreLockError {
                    path: path.to_path_buf(),
                    attempts,
                    source,
                });
            }
            Err(err) => {
                debug!(path = %path.display(), attempt, error = %err, "write lock busy, retrying");
                thread::sleep(policy.backoff);
            }
        }
    }
}
