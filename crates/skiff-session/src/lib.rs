#![deny(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Session coordinator core: the long-lived loop mediating between the
//! transfer engine and the presentation layer.
//!
//! Layout: `command.rs` (per-kind command queues), `registry.rs` (job
//! directory), `store.rs` (checkpoint and session persistence),
//! `source.rs` (submit descriptor parsing), `author.rs` (descriptor
//! authoring helpers), `shutdown.rs` (graceful-termination state machine),
//! `worker.rs` (the coordinator loop), `sim.rs` (in-memory engine double).

/// Descriptor authoring helpers.
pub mod author;
/// Command value objects and per-kind FIFO queues.
pub mod command;
/// Error types for coordinator-side operations.
pub mod error;
/// In-memory job directory published to the presentation layer.
pub mod registry;
/// Graceful-shutdown state machine.
pub mod shutdown;
/// Simulated in-memory engine used by tests and default binary wiring.
pub mod sim;
/// Submit source descriptor parsing.
pub mod source;
/// Durable checkpoint and session-state stores.
pub mod store;
/// The coordinator poll loop.
pub mod worker;

pub use command::{
    BlocklistAction, BlocklistCommand, CommandQueues, CommandSink, CreateCommand, RemoveCommand,
    SubmitCommand, command_queues,
};
pub use error::{AuthorError, SourceError, StoreError};
pub use registry::JobRegistry;
pub use sim::SimEngine;
pub use store::{CheckpointStore, SessionStateStore};
pub use worker::{SessionConfig, SessionWorker, spawn};
