//! Storage error handling
//!
//! Provides typed errors for store operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::lock::StoreLockError;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The per-tiddler write lock could not be obtained
    #[error(transparent)]
    Lock(#[from] StoreLockError),

    /// Tiddler file does not exist
    #[error("Tiddler '{title}' not found in bag '{bag}'")]
    NoTiddler { bag: String, title: String },

    /// Bag directory does not exist
    #[error("Bag '{name}' not found")]
    NoBag { name: String },

    /// The file exists but no commit in the history touches it
    #[error("'{path}' exists on disk but has no revision history")]
    HistoryInconsistency { path: String },

    /// A requested revision does not contain the tiddler
    #[error("Revision {revision} has no content for '{path}'")]
    RevisionNotFound { revision: String, path: String },

    /// Bag or tiddler name cannot be stored
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Tiddler text could not be parsed
    #[error("Cannot deserialize tiddler: {details}")]
    Serialization { details: String },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File not found (when expected to exist)
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Repository error from the revision backend
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StoreError::NotFound { path },
            _ if is_disk_full_error(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Like `from_io`, but unclassified failures are reported as reads
    pub fn from_read(error: io::Error, path: PathBuf) -> Self {
        match StoreError::from_io(error, path) {
            StoreError::WriteError { path, source } => StoreError::ReadError { path, source },
            other => other,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::Lock(_) => {
                Some("Another writer is holding the tiddler. Retry the write shortly.")
            }
            StoreError::DiskFull { .. } => Some("Free up disk space and try again."),
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions on the store root.")
            }
            StoreError::HistoryInconsistency { .. } => {
                Some("The file was written without a commit. Put the tiddler again to record it.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
