//! # Design
//!
//! - Centralize engine-facing error context without using `anyhow`.
//! - Keep error messages constant; store operational context in fields.

use thiserror::Error;

use crate::model::JobId;

/// Failures reported by a transfer engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine refused a submit or remove request.
    #[error("engine rejected the request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Engine-supplied reason.
        reason: String,
    },
    /// The referenced job is unknown to the engine.
    #[error("job not found")]
    NotFound {
        /// Missing job identifier.
        job_id: JobId,
    },
    /// Operation is not supported by the underlying engine.
    #[error("engine operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
}

/// Failures parsing a job identity from its hex form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobIdError {
    /// Input was not exactly forty hex characters.
    #[error("job id must be 40 hex characters")]
    Length {
        /// Observed character count.
        len: usize,
    },
    /// Input contained a non-hex character.
    #[error("job id contains a non-hex character")]
    InvalidChar {
        /// Byte offset of the offending character.
        index: usize,
    },
}

/// Failures parsing a block filter range from its textual form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockRangeError {
    /// Input was empty after trimming.
    #[error("block range is empty")]
    Empty,
    /// One of the endpoints was not a valid IP address.
    #[error("block range endpoint is not an IP address")]
    InvalidAddress {
        /// Offending endpoint text.
        value: String,
    },
    /// Endpoints belong to different address families.
    #[error("block range mixes address families")]
    MixedFamilies,
    /// The start endpoint sorts after the end endpoint.
    #[error("block range start exceeds end")]
    Inverted,
}
