//! # Design
//!
//! - Centralize coordinator-side error context without using `anyhow`.
//! - Keep error messages constant; store operational context in fields.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the durable checkpoint and session-state stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store IO operation failed.
    #[error("store IO failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Failures parsing a user-supplied submit source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The magnet URI carried no recognizable content hash.
    #[error("magnet URI carries no content hash")]
    MissingInfoHash {
        /// Offending URI.
        uri: String,
    },
    /// The magnet content hash did not parse.
    #[error("magnet content hash is malformed")]
    InvalidInfoHash {
        /// Offending hash text.
        value: String,
    },
    /// The source was neither a magnet URI nor an existing file.
    #[error("source file does not exist")]
    FileNotFound {
        /// Path that was probed.
        path: PathBuf,
    },
}

/// Failures building or writing an authored descriptor.
#[derive(Debug, Error)]
pub enum AuthorError {
    /// The source folder could not be walked.
    #[error("author source walk failed")]
    Walk {
        /// Folder being walked.
        path: PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
    /// The source folder contained no files to share.
    #[error("author source folder is empty")]
    EmptyFolder {
        /// Folder that was walked.
        path: PathBuf,
    },
    /// The source folder name could not be derived.
    #[error("author source folder has no name")]
    UnnamedFolder {
        /// Folder that was probed.
        path: PathBuf,
    },
    /// Writing the descriptor failed.
    #[error("author descriptor write failed")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
