//! Error types for dock_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using dock_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during spacedock operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A digest or reference does not resolve.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// A required file or directory is missing or malformed, or a starlog
    /// references a blob the object store does not have.
    #[error("Corrupt repository at {path}: {reason}")]
    CorruptRepository { path: PathBuf, reason: String },

    /// Stored starlog bytes do not parse into a starlog record.
    #[error("Corrupt starlog: {reason}")]
    CorruptStarlog { reason: String },

    /// Invalid digest format or encoding.
    #[error("Invalid digest: {reason}")]
    InvalidDigest { reason: String },

    /// Invalid course name.
    #[error("Invalid course name: {reason}")]
    InvalidCourseName { reason: String },

    /// A course with this name already exists.
    #[error("Course already exists: {name}")]
    AlreadyExists { name: String },

    /// The requested course does not exist.
    #[error("Unknown course: {name}")]
    UnknownCourse { name: String },

    /// The operation was rejected before any mutation happened.
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Warping would discard staged, modified or untracked work.
    #[error(
        "Unsafe warp: {} staged, {} modified, {} untracked path(s) would be lost",
        .staged.len(),
        .modified.len(),
        .untracked.len()
    )]
    UnsafeWarp {
        staged: Vec<String>,
        modified: Vec<String>,
        untracked: Vec<String>,
    },

    /// There is nothing to record in a starlog.
    #[error("Nothing to commit: {reason}")]
    NothingToCommit { reason: String },
}

impl Error {
    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Create a CorruptRepository error.
    pub fn corrupt_repository(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptRepository {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a CorruptStarlog error.
    pub fn corrupt_starlog(reason: impl Into<String>) -> Self {
        Error::CorruptStarlog {
            reason: reason.into(),
        }
    }

    /// Create an InvalidDigest error.
    pub fn invalid_digest(reason: impl Into<String>) -> Self {
        Error::InvalidDigest {
            reason: reason.into(),
        }
    }

    /// Create an InvalidCourseName error.
    pub fn invalid_course_name(reason: impl Into<String>) -> Self {
        Error::InvalidCourseName {
            reason: reason.into(),
        }
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Error::AlreadyExists { name: name.into() }
    }

    /// Create an UnknownCourse error.
    pub fn unknown_course(name: impl Into<String>) -> Self {
        Error::UnknownCourse { name: name.into() }
    }

    /// Create an InvalidOperation error.
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create a NothingToCommit error.
    pub fn nothing_to_commit(reason: impl Into<String>) -> Self {
        Error::NothingToCommit {
            reason: reason.into(),
        }
    }

    /// True for errors that leave the repository untouched and can simply be retried
    /// or reported.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::CorruptRepository { .. } | Error::Io { .. })
    }
}

// Additional From implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Io {
            source: std::io::Error::other(err),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}
