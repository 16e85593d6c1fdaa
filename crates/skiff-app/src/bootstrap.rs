//! Application bootstrap: CLI surface, storage layout, service wiring, and
//! signal-driven termination.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use skiff_engine_core::TransferEngine;
use skiff_events::EventBus;
use skiff_session::{
    CheckpointStore, SessionConfig, SessionStateStore, SimEngine, SubmitCommand, command_queues,
    spawn,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{AppError, AppResult};
use crate::render;

/// Default logging target when `RUST_LOG` is not provided.
const DEFAULT_LOG_LEVEL: &str = "info";
/// Storage directory name under the home directory.
const HOME_DIR_NAME: &str = ".skiff";

/// Command-line surface of the skiff session.
#[derive(Debug, Parser)]
#[command(name = "skiff", about = "Torrent session coordinator", version)]
pub struct Args {
    /// Magnet URI or metainfo file to submit at startup.
    pub source: Option<String>,

    /// Directory downloads are written to; current directory when omitted.
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Storage root for checkpoints and session state.
    #[arg(long, env = "SKIFF_HOME")]
    pub storage_root: Option<PathBuf>,

    /// Periodic checkpoint flush interval, in seconds.
    #[arg(long, default_value_t = 10)]
    pub flush_interval_secs: u64,

    /// Terminate the whole session when the engine reports a job error.
    #[arg(long)]
    pub exit_on_job_error: bool,
}

/// Entry point for the skiff boot sequence.
///
/// Wires stores, queues, event bus, and the coordinator task, then blocks
/// until an interrupt drives the shutdown sequence to completion.
///
/// # Errors
///
/// Returns an error if logging, storage, or the coordinator task itself
/// fails to come up cleanly.
pub async fn run_app(args: Args) -> AppResult<()> {
    init_logging()?;
    info!("skiff session bootstrap starting");

    let storage_root = resolve_storage_root(args.storage_root)?;
    fs::create_dir_all(&storage_root)
        .map_err(|source| AppError::io("create_dir", storage_root.clone(), source))?;

    let checkpoints = CheckpointStore::new(storage_root.join("checkpoints"));
    checkpoints
        .ensure_initialized()
        .map_err(|source| AppError::store("ensure_initialized", source))?;
    let session_store = SessionStateStore::new(storage_root.join("session.state"));
    info!(storage_root = %storage_root.display(), "storage ready");

    let events = EventBus::new();
    let (sink, queues) = command_queues();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let config = SessionConfig {
        flush_interval: Duration::from_secs(args.flush_interval_secs),
        exit_on_job_error: args.exit_on_job_error,
        ..SessionConfig::default()
    };
    // The simulated engine stands in until a protocol adapter implementing
    // `TransferEngine` is plugged in here.
    let engine: Box<dyn TransferEngine> = Box::new(SimEngine::new());

    let worker = spawn(
        engine,
        events.clone(),
        queues,
        checkpoints,
        session_store,
        config,
        shutdown_rx,
    );
    let presenter = render::spawn_console(&events);

    if let Some(source) = args.source {
        sink.submit(SubmitCommand {
            source,
            destination: args.save_dir,
        });
    }

    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; beginning graceful shutdown");
            let _ = shutdown_tx.send(true);
        }
    });

    let joined = worker.await;

    if !signal_task.is_finished() {
        signal_task.abort();
    }
    if !presenter.is_finished() {
        presenter.abort();
    }
    if let Err(err) = presenter.await {
        if !err.is_cancelled() {
            warn!(error = %err, "presenter task join failed");
        }
    }

    joined.map_err(|source| AppError::Worker { source })?;
    info!("skiff shutdown complete");
    Ok(())
}

fn init_logging() -> AppResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish()
        .try_init()
        .map_err(|source| AppError::Logging { source })
}

/// Storage root resolution: explicit flag (or `SKIFF_HOME`), then
/// `$HOME/.skiff`.
fn resolve_storage_root(explicit: Option<PathBuf>) -> AppResult<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(HOME_DIR_NAME))
        .ok_or(AppError::MissingEnv { name: "HOME" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_source_and_flags() {
        let args = Args::parse_from([
            "skiff",
            "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567",
            "--save-dir",
            "/downloads",
            "--flush-interval-secs",
            "5",
            "--exit-on-job-error",
        ]);
        assert!(args.source.as_deref().unwrap_or("").starts_with("magnet:"));
        assert_eq!(args.save_dir, Some(PathBuf::from("/downloads")));
        assert_eq!(args.flush_interval_secs, 5);
        assert!(args.exit_on_job_error);
    }

    #[test]
    fn args_default_flush_interval() {
        let args = Args::parse_from(["skiff"]);
        assert!(args.source.is_none());
        assert_eq!(args.flush_interval_secs, 10);
        assert!(!args.exit_on_job_error);
    }

    #[test]
    fn explicit_storage_root_wins() {
        let root = resolve_storage_root(Some(PathBuf::from("/var/lib/skiff"))).expect("resolves");
        assert_eq!(root, PathBuf::from("/var/lib/skiff"));
    }

    #[test]
    fn storage_root_falls_back_to_home() {
        if std::env::var_os("HOME").is_some() {
            let root = resolve_storage_root(None).expect("resolves");
            assert!(root.ends_with(HOME_DIR_NAME));
        }
    }
}
