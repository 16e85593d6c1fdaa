//! The engine trait the session coordinator drives.

use anyhow::bail;
use async_trait::async_trait;

use crate::model::{AuthorRequest, BlockRange, EngineEvent, JobDescriptor, JobId};

/// Asynchronous transfer engine consumed by the coordinator.
///
/// The coordinator owns the engine exclusively and drives it from a single
/// task, so the methods take `&mut self`. All protocol work (peers, piece
/// scheduling, trackers, DHT) lives behind this boundary; the coordinator
/// only submits, removes, polls, and requests checkpoint flushes.
#[async_trait]
pub trait TransferEngine: Send {
    /// Admit a job and return its stable content identity.
    async fn submit_job(&mut self, descriptor: JobDescriptor) -> anyhow::Result<JobId>;

    /// Remove a job; the engine later confirms with `EngineEvent::JobRemoved`.
    async fn remove_job(&mut self, id: JobId) -> anyhow::Result<()>;

    /// Drain every event emitted since the previous poll, in emission order.
    async fn poll_events(&mut self) -> anyhow::Result<Vec<EngineEvent>>;

    /// Ask the engine to produce resume data for a job. The request settles
    /// later with `FlushDone` or `FlushFailed`; with `only_if_modified` an
    /// unmodified job settles immediately as a failed (no-op) flush.
    async fn request_flush(&mut self, id: JobId, only_if_modified: bool) -> anyhow::Result<()>;

    /// Serialize the global engine configuration for persistence.
    async fn export_session_state(&mut self) -> anyhow::Result<Vec<u8>>;

    /// Restore a previously exported engine configuration.
    async fn import_session_state(&mut self, blob: &[u8]) -> anyhow::Result<()>;

    /// Replace the peer block filter; default implementation reports lack of support.
    async fn set_block_filter(&mut self, ranges: Vec<BlockRange>) -> anyhow::Result<()> {
        let _ = ranges;
        bail!("block filter updates not supported by this engine");
    }

    /// Read the current peer block filter; default implementation reports lack of support.
    async fn block_filter(&mut self) -> anyhow::Result<Vec<BlockRange>> {
        bail!("block filter inspection not supported by this engine");
    }

    /// Author an opaque shareable descriptor from a file listing; default
    /// implementation reports lack of support.
    async fn author_descriptor(&mut self, request: AuthorRequest) -> anyhow::Result<Vec<u8>> {
        let _ = request;
        bail!("descriptor authoring not supported by this engine");
    }
}
