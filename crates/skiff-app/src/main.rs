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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that wires the skiff session coordinator together and
//! blocks until the graceful-shutdown sequence completes.

use clap::Parser;
use skiff_app::{AppResult, Args, run_app};

/// Bootstraps the skiff session and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app(Args::parse()).await
}
