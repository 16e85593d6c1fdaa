#![forbid(unsafe_code)]
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

//! skiff application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (CLI, storage, service wiring, signal handling),
//! `render.rs` (console presentation of published snapshots).

/// Application bootstrap and CLI surface.
pub mod bootstrap;
/// Application-level error type.
pub mod error;
/// Console presenter for published events.
pub mod render;

pub use bootstrap::{Args, run_app};
pub use error::{AppError, AppResult};
