//! Error types for archive-unlock
//!
//! This module provides the error taxonomy for the library:
//! - A top-level [`Error`] returned by fallible public operations
//! - [`ExtractError`], the structured outcome reported by archive backends, which the
//!   trial runner converts into a [`TrialOutcome`](crate::types::TrialOutcome)
//! - [`PasswordListError`] for reading and appending the persisted password list
//!
//! Trial-level errors never unwind past the trial runner; they are converted into
//! outcomes and interpreted by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archive-unlock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive-unlock
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "brute_force.max_length")
        key: Option<String>,
    },

    /// Archive extraction error reported by a backend
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Password list could not be read or written
    #[error("password list error: {0}")]
    PasswordList(#[from] PasswordListError),

    /// The archive extension is not one of the supported container formats
    #[error("unsupported archive format: {path}")]
    UnsupportedFormat {
        /// The archive whose extension was not recognised
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (configuration files, events)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Structured errors reported by an [`ArchiveBackend`](crate::extraction::ArchiveBackend)
///
/// Backends classify the codec library's own error types into these variants, so callers
/// never need to inspect error text to tell a rejected password from a broken archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive rejected the supplied password (or needs one and none was given)
    #[error("wrong password for encrypted archive {archive}")]
    WrongPassword {
        /// The encrypted archive that could not be opened
        archive: PathBuf,
    },

    /// Archive extraction failed for a reason other than the password
    #[error("extraction failed for {archive}: {reason}")]
    ExtractionFailed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// An extracted entry resolved outside of the destination directory
    #[error("unsafe entry path in {archive}: {entry}")]
    UnsafePath {
        /// The archive that contained the entry
        archive: PathBuf,
        /// The offending entry path
        entry: PathBuf,
    },

    /// The blocking extraction task panicked or was cancelled by the runtime
    #[error("extraction task for {archive} failed: {reason}")]
    TaskFailed {
        /// The archive the task was extracting
        archive: PathBuf,
        /// The join error reported by the runtime
        reason: String,
    },
}

/// Errors reading or appending the persisted password list
#[derive(Debug, Error)]
pub enum PasswordListError {
    /// The list file exists but could not be read
    #[error("failed to read password list {path}: {source}")]
    Unreadable {
        /// Path of the password list
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The list file could not be created or appended to
    #[error("failed to write password list {path}: {source}")]
    Unwritable {
        /// Path of the password list
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// No list is configured and no default location could be resolved
    #[error("no password list configured and the home directory could not be determined")]
    NoDefaultLocation,
}

impl Error {
    /// Returns `true` if this error is a rejected password rather than a hard failure
    pub fn is_wrong_password(&self) -> bool {
        matches!(self, Error::Extract(ExtractError::WrongPassword { .. }))
    }

    /// Shorthand for building an [`ExtractError::ExtractionFailed`]
    pub(crate) fn extraction_failed(archive: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::Extract(ExtractError::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        })
    }

    /// Shorthand for building an [`ExtractError::WrongPassword`]
    pub(crate) fn wrong_password(archive: &std::path::Path) -> Self {
        Error::Extract(ExtractError::WrongPassword {
            archive: archive.to_path_buf(),
        })
    }
}
