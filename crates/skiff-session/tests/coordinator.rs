//! End-to-end coordinator tests: a spawned worker driven only through the
//! public surface (command sink, event bus, termination channel), backed by
//! the simulated engine and real on-disk stores.

use std::time::Duration;

use skiff_events::{Event, EventBus, EventStream, JobState, JobView};
use skiff_session::{
    CheckpointStore, SessionConfig, SessionStateStore, SimEngine, SubmitCommand, command_queues,
    spawn,
};
use tempfile::TempDir;
use tokio::sync::watch;

const HASH_HEX: &str = "0123456789abcdef0123456789abcdef01234567";
const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> SessionConfig {
    SessionConfig {
        tick_interval: Duration::from_millis(10),
        flush_interval: Duration::from_millis(25),
        ..SessionConfig::default()
    }
}

struct Session {
    bus: EventBus,
    sink: skiff_session::CommandSink,
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

fn launch(temp: &TempDir) -> Session {
    let bus = EventBus::with_capacity(1_024);
    let (sink, queues) = command_queues();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = spawn(
        Box::new(SimEngine::new()),
        bus.clone(),
        queues,
        CheckpointStore::new(temp.path().join("checkpoints")),
        SessionStateStore::new(temp.path().join("session.state")),
        fast_config(),
        shutdown_rx,
    );
    Session {
        bus,
        sink,
        shutdown,
        handle,
    }
}

/// Wait until a published snapshot contains a job matching the predicate.
async fn wait_for_job(
    stream: &mut EventStream,
    mut predicate: impl FnMut(&JobView) -> bool,
) -> JobView {
    tokio::time::timeout(WAIT, async {
        loop {
            let envelope = stream.next().await.expect("event stream stayed open");
            if let Event::Snapshot { jobs } = envelope.event {
                if let Some(job) = jobs.iter().find(|job| predicate(job)) {
                    return job.clone();
                }
            }
        }
    })
    .await
    .expect("timed out waiting for matching snapshot")
}

async fn terminate(session: Session) {
    session.shutdown.send(true).expect("worker still listening");
    tokio::time::timeout(WAIT, session.handle)
        .await
        .expect("worker terminated in time")
        .expect("worker task did not panic");
}

#[tokio::test]
async fn magnet_submit_downloads_flushes_and_resumes_across_restart() {
    let temp = TempDir::new().expect("tempdir");
    let checkpoints = CheckpointStore::new(temp.path().join("checkpoints"));
    let session_state = SessionStateStore::new(temp.path().join("session.state"));

    // First run: submit a magnet with no destination and let it finish.
    let session = launch(&temp);
    let mut stream = session.bus.subscribe(None);
    session.sink.submit(SubmitCommand {
        source: format!("magnet:?xt=urn:btih:{HASH_HEX}&dn=demo"),
        destination: None,
    });

    let submitted = wait_for_job(&mut stream, |job| job.state == JobState::Submitted).await;
    assert_eq!(submitted.id, HASH_HEX);
    assert_eq!(
        submitted.save_path,
        std::env::current_dir().expect("cwd").display().to_string(),
        "empty destination defaults to the current directory"
    );

    wait_for_job(&mut stream, |job| job.state == JobState::DownloadingMetadata).await;
    let finished = wait_for_job(&mut stream, |job| job.state == JobState::Finished).await;
    assert_eq!(finished.bytes_done, finished.bytes_total);
    assert!(finished.bytes_total > 0);

    terminate(session).await;

    // Durable state survived the shutdown sequence.
    let stored = checkpoints.load_all().expect("checkpoint store readable");
    assert_eq!(stored.len(), 1, "finished job left exactly one checkpoint");
    assert_eq!(stored[0].0.to_string(), HASH_HEX);
    assert!(
        session_state.load().expect("session store readable").is_some(),
        "session blob persisted at clean shutdown"
    );

    // Second run: the checkpointed job reappears with its byte counts
    // restored rather than starting from zero.
    let session = launch(&temp);
    let mut stream = session.bus.subscribe(None);
    let resumed = wait_for_job(&mut stream, |job| {
        job.id == HASH_HEX && job.bytes_done > 0
    })
    .await;
    assert_eq!(resumed.bytes_done, finished.bytes_total);

    terminate(session).await;
}

#[tokio::test]
async fn shutdown_with_no_jobs_terminates_cleanly() {
    let temp = TempDir::new().expect("tempdir");
    let session = launch(&temp);

    // Give the loop a tick or two, then terminate with an empty registry.
    tokio::time::sleep(Duration::from_millis(30)).await;
    terminate(session).await;

    assert!(
        SessionStateStore::new(temp.path().join("session.state"))
            .load()
            .expect("session store readable")
            .is_some(),
        "session blob is written even when no jobs ran"
    );
}

#[tokio::test]
async fn errored_job_stays_visible_and_loop_survives() {
    let temp = TempDir::new().expect("tempdir");

    // Manual engine scripted to fail the job right after admission.
    let mut engine = SimEngine::manual();
    let bus = EventBus::with_capacity(256);
    let (sink, queues) = command_queues();
    let (shutdown, shutdown_rx) = watch::channel(false);

    let job_id: skiff_engine_core::JobId = HASH_HEX.parse().expect("valid hash");
    engine.script_event(skiff_engine_core::EngineEvent::JobError {
        id: job_id,
        message: "tracker unreachable".to_string(),
    });

    let handle = spawn(
        Box::new(engine),
        bus.clone(),
        queues,
        CheckpointStore::new(temp.path().join("checkpoints")),
        SessionStateStore::new(temp.path().join("session.state")),
        fast_config(),
        shutdown_rx,
    );
    let mut stream = bus.subscribe(None);
    sink.submit(SubmitCommand {
        source: format!("magnet:?xt=urn:btih:{HASH_HEX}&dn=demo"),
        destination: None,
    });

    let errored = wait_for_job(&mut stream, |job| {
        matches!(job.state, JobState::Errored { .. })
    })
    .await;
    assert_eq!(errored.id, HASH_HEX, "errored job is not auto-removed");

    // The loop keeps running and still shuts down gracefully.
    shutdown.send(true).expect("worker still listening");
    tokio::time::timeout(WAIT, handle)
        .await
        .expect("worker terminated in time")
        .expect("worker task did not panic");
}
