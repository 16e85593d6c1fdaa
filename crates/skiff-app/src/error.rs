//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was missing.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: &'static str,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Store initialization failed.
    #[error("store operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Source store error.
        source: skiff_session::StoreError,
    },
    /// Logging initialization failed.
    #[error("logging initialization failed")]
    Logging {
        /// Source subscriber installation error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// The coordinator task ended abnormally.
    #[error("session worker join failed")]
    Worker {
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn store(
        operation: &'static str,
        source: skiff_session::StoreError,
    ) -> Self {
        Self::Store { operation, source }
    }
}
