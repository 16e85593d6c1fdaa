//! The session coordinator loop.
//!
//! One task owns the engine, the registry, and both stores. Each tick it
//! reads the termination flag, drains the command queues, polls the engine
//! and dispatches every event in delivery order, and issues the periodic
//! checkpoint flushes. Engine and IO failures are converted to no-ops,
//! registry transitions, or presentation-layer notifications; the only way
//! out of the loop is the graceful-shutdown sequence.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use skiff_engine_core::{
    BlockRange, EngineEvent, JobDescriptor, JobId, JobSnapshot, JobSource, TransferEngine,
};
use skiff_events::{Event, EventBus, JobState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::author;
use crate::command::{
    BlocklistAction, BlocklistCommand, CommandQueues, CreateCommand, RemoveCommand, SubmitCommand,
};
use crate::registry::JobRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::source;
use crate::store::{CheckpointStore, SessionStateStore};

/// Tunables for the coordinator loop.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Poll loop cadence.
    pub tick_interval: Duration,
    /// Cadence of the periodic only-if-modified checkpoint flush.
    pub flush_interval: Duration,
    /// Resubmit every loaded checkpoint at startup.
    pub resume_on_start: bool,
    /// Begin the shutdown sequence when the engine reports a job error.
    pub exit_on_job_error: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            flush_interval: Duration::from_secs(10),
            resume_on_start: true,
            exit_on_job_error: false,
        }
    }
}

/// Spawn the coordinator loop on its own task.
///
/// The task runs until the termination channel flips to `true` and the
/// shutdown sequence completes.
#[must_use]
pub fn spawn(
    engine: Box<dyn TransferEngine>,
    events: EventBus,
    queues: CommandQueues,
    checkpoints: CheckpointStore,
    session_store: SessionStateStore,
    config: SessionConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        SessionWorker::new(
            engine,
            events,
            queues,
            checkpoints,
            session_store,
            config,
            shutdown_rx,
        )
        .run()
        .await;
    })
}

/// State owned by the coordinator task.
pub struct SessionWorker {
    engine: Box<dyn TransferEngine>,
    events: EventBus,
    queues: CommandQueues,
    registry: JobRegistry,
    checkpoints: CheckpointStore,
    session_store: SessionStateStore,
    config: SessionConfig,
    /// Checkpoints found at startup, kept for resume-supersedes matching
    /// and refreshed on every successful flush.
    loaded: HashMap<JobId, Vec<u8>>,
    /// Jobs with an outstanding flush request; a new flush is never issued
    /// for a member of this set.
    inflight: HashSet<JobId>,
    shutdown: ShutdownCoordinator,
    shutdown_rx: watch::Receiver<bool>,
    last_flush: Instant,
}

impl SessionWorker {
    /// Construct a worker, hydrating the checkpoint cache from disk.
    #[must_use]
    pub fn new(
        engine: Box<dyn TransferEngine>,
        events: EventBus,
        queues: CommandQueues,
        checkpoints: CheckpointStore,
        session_store: SessionStateStore,
        config: SessionConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let mut loaded = HashMap::new();
        match checkpoints.load_all() {
            Ok(entries) => {
                for (id, payload) in entries {
                    loaded.insert(id, payload);
                }
            }
            Err(err) => {
                warn!(error = %err, "checkpoint store unavailable at startup");
            }
        }

        Self {
            engine,
            events,
            queues,
            registry: JobRegistry::new(),
            checkpoints,
            session_store,
            config,
            loaded,
            inflight: HashSet::new(),
            shutdown: ShutdownCoordinator::new(),
            shutdown_rx,
            last_flush: Instant::now(),
        }
    }

    /// Drive the loop until the shutdown sequence reaches `Terminated`.
    pub async fn run(mut self) {
        self.restore_session_state().await;
        if self.config.resume_on_start {
            self.resume_loaded_checkpoints().await;
        }

        let mut tick = tokio::time::interval(self.config.tick_interval);
        loop {
            tick.tick().await;

            // Termination flag is read once per tick, at this fixed point.
            if *self.shutdown_rx.borrow()
                && !self.shutdown.in_progress()
                && !self.shutdown.is_terminated()
            {
                self.begin_shutdown().await;
            }

            if !self.shutdown.in_progress() {
                self.apply_commands().await;
            }
            self.pump_engine().await;
            self.maybe_periodic_flush().await;

            if self.shutdown.ready_to_persist() {
                self.persist_session().await;
                self.shutdown.mark_terminated();
                break;
            }
        }
        info!("session coordinator terminated");
    }

    async fn restore_session_state(&mut self) {
        match self.session_store.load() {
            Ok(Some(blob)) => {
                if let Err(err) = self.engine.import_session_state(&blob).await {
                    warn!(error = %err, "session state rejected by engine; using defaults");
                }
            }
            Ok(None) => debug!("no persisted session state; using engine defaults"),
            Err(err) => {
                warn!(error = %err, "session state unreadable; using engine defaults");
            }
        }
    }

    async fn resume_loaded_checkpoints(&mut self) {
        let entries: Vec<(JobId, Vec<u8>)> = self
            .loaded
            .iter()
            .map(|(id, payload)| (*id, payload.clone()))
            .collect();
        for (id, payload) in entries {
            info!(job_id = %id, "resubmitting checkpointed job");
            let descriptor = JobDescriptor {
                source: JobSource::checkpoint(payload),
                save_path: default_save_path(),
                name_hint: None,
            };
            self.submit_descriptor(descriptor, None).await;
        }
    }

    async fn apply_commands(&mut self) {
        for command in self.queues.drain_submit() {
            self.apply_submit(command).await;
        }
        for command in self.queues.drain_remove() {
            self.apply_remove(command).await;
        }
        for command in self.queues.drain_create() {
            self.apply_create(command).await;
        }
        for command in self.queues.drain_blocklist() {
            self.apply_blocklist(command).await;
        }
    }

    async fn apply_submit(&mut self, command: SubmitCommand) {
        let save_path = command
            .destination
            .clone()
            .unwrap_or_else(default_save_path);
        let parsed = match source::parse_source(&command.source) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.publish_error(format!("invalid source \"{}\": {err}", command.source));
                return;
            }
        };

        // A checkpoint loaded at startup supersedes the freshly parsed
        // descriptor for the same content identity.
        let source = parsed
            .id_hint
            .and_then(|id| self.loaded.get(&id))
            .map_or(parsed.source, |payload| {
                JobSource::checkpoint(payload.clone())
            });

        let descriptor = JobDescriptor {
            source,
            save_path,
            name_hint: parsed.name_hint.clone(),
        };
        self.submit_descriptor(descriptor, parsed.name_hint).await;
    }

    async fn submit_descriptor(&mut self, descriptor: JobDescriptor, name_hint: Option<String>) {
        let save_path = descriptor.save_path.clone();
        match self.engine.submit_job(descriptor).await {
            Ok(id) => {
                if !self.registry.contains(id) {
                    let name = name_hint.unwrap_or_else(|| id.to_string());
                    self.registry
                        .upsert(JobSnapshot::submitted(id, name, save_path));
                }
                self.publish_snapshot();
            }
            Err(err) => {
                self.publish_error(format!("engine rejected submit: {err}"));
            }
        }
    }

    async fn apply_remove(&mut self, command: RemoveCommand) {
        if !self.registry.contains(command.id) {
            // Unknown identity: not an error, nothing to publish.
            debug!(job_id = %command.id, "remove ignored for unknown job");
            return;
        }
        if let Err(err) = self.engine.remove_job(command.id).await {
            self.publish_error(format!("engine rejected remove: {err}"));
        }
    }

    async fn apply_create(&mut self, command: CreateCommand) {
        let request = match author::build_request(&command.source_folder, command.tracker.clone())
        {
            Ok(request) => request,
            Err(err) => {
                self.publish_error(format!(
                    "descriptor authoring failed for {}: {err}",
                    command.source_folder.display()
                ));
                return;
            }
        };
        let destination = command
            .destination
            .clone()
            .unwrap_or_else(|| author::default_destination(&command.source_folder));

        let payload = match self.engine.author_descriptor(request).await {
            Ok(payload) => payload,
            Err(err) => {
                self.publish_error(format!("engine rejected descriptor authoring: {err}"));
                return;
            }
        };
        match author::write_descriptor(&destination, &payload) {
            Ok(()) => info!(destination = %destination.display(), "descriptor written"),
            Err(err) => {
                self.publish_error(format!(
                    "descriptor write failed for {}: {err}",
                    destination.display()
                ));
            }
        }
    }

    async fn apply_blocklist(&mut self, command: BlocklistCommand) {
        let range: BlockRange = match command.address.parse() {
            Ok(range) => range,
            Err(err) => {
                self.publish_error(format!(
                    "invalid block range \"{}\": {err}",
                    command.address
                ));
                return;
            }
        };

        let mut ranges = match self.engine.block_filter().await {
            Ok(ranges) => ranges,
            Err(err) => {
                self.publish_error(format!("block filter read failed: {err}"));
                return;
            }
        };
        match command.action {
            BlocklistAction::Add => {
                if !ranges.contains(&range) {
                    ranges.push(range);
                }
            }
            BlocklistAction::Remove => ranges.retain(|existing| existing != &range),
        }
        if let Err(err) = self.engine.set_block_filter(ranges).await {
            self.publish_error(format!("block filter update failed: {err}"));
            return;
        }

        // Publish the full effective list, re-read from the engine.
        match self.engine.block_filter().await {
            Ok(current) => {
                let rendered = current.iter().map(ToString::to_string).collect();
                let _ = self.events.publish(Event::Blocklist { ranges: rendered });
            }
            Err(err) => {
                self.publish_error(format!("block filter read failed: {err}"));
            }
        }
    }

    async fn pump_engine(&mut self) {
        let events = match self.engine.poll_events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "engine poll failed");
                return;
            }
        };
        for event in events {
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::JobAdded {
                id,
                name,
                save_path,
            } => self.record_job_added(id, name, save_path),
            EngineEvent::JobRemoved { id } => self.record_job_removed(id),
            EngineEvent::Status {
                id,
                state,
                bytes_done,
                bytes_total,
                download_bps,
                peer_count,
            } => {
                self.record_status(id, state, bytes_done, bytes_total, download_bps, peer_count);
            }
            EngineEvent::Finished { id } => {
                if let Some(entry) = self.registry.get_mut(id) {
                    entry.state = JobState::Finished;
                    entry.last_updated = Utc::now();
                }
                self.request_guarded_flush(id).await;
                self.publish_snapshot();
            }
            EngineEvent::JobError { id, message } => self.record_job_error(id, message).await,
            EngineEvent::FlushDone { id, payload } => self.record_flush_done(id, payload),
            EngineEvent::FlushFailed { id, message } => {
                // Terminal for this flush; never retried.
                debug!(job_id = %id, reason = %message, "checkpoint flush settled as failed");
                self.settle_flush(id);
            }
        }
    }

    fn record_job_added(&mut self, id: JobId, name: String, save_path: PathBuf) {
        if let Some(entry) = self.registry.get_mut(id) {
            entry.name = name;
            entry.save_path = save_path;
            entry.last_updated = Utc::now();
        } else {
            self.registry
                .upsert(JobSnapshot::submitted(id, name, save_path));
        }
        self.publish_snapshot();
    }

    fn record_job_removed(&mut self, id: JobId) {
        if let Err(err) = self.checkpoints.delete(id) {
            self.publish_error(format!("checkpoint delete failed for {id}: {err}"));
        }
        self.loaded.remove(&id);
        let _ = self.registry.remove(id);
        // A removed job has nothing left to flush.
        self.settle_flush(id);
        self.publish_snapshot();
    }

    fn record_status(
        &mut self,
        id: JobId,
        state: JobState,
        bytes_done: u64,
        bytes_total: u64,
        download_bps: u64,
        peer_count: u32,
    ) {
        if !self.registry.contains(id) {
            self.registry.upsert(JobSnapshot::submitted(
                id,
                id.to_string(),
                default_save_path(),
            ));
        }
        if let Some(entry) = self.registry.get_mut(id) {
            entry.state = state;
            entry.bytes_done = bytes_done;
            entry.bytes_total = bytes_total;
            entry.download_bps = download_bps;
            entry.peer_count = peer_count;
            entry.last_updated = Utc::now();
        }
        self.publish_snapshot();
    }

    async fn record_job_error(&mut self, id: JobId, message: String) {
        if !self.registry.contains(id) {
            // Surface errors even for jobs the engine knows and we do not yet.
            self.registry.upsert(JobSnapshot::submitted(
                id,
                id.to_string(),
                default_save_path(),
            ));
        }
        let name = self
            .registry
            .get(id)
            .map_or_else(|| id.to_string(), |entry| entry.name.clone());
        if let Some(entry) = self.registry.get_mut(id) {
            entry.state = JobState::Errored {
                message: message.clone(),
            };
            entry.last_updated = Utc::now();
        }
        self.publish_error(format!("job {name} failed: {message}"));
        self.request_guarded_flush(id).await;
        self.publish_snapshot();
        if self.config.exit_on_job_error && !self.shutdown.in_progress() {
            self.begin_shutdown().await;
        }
    }

    fn record_flush_done(&mut self, id: JobId, payload: Vec<u8>) {
        if let Err(err) = self.checkpoints.save(id, &payload) {
            self.publish_error(format!("checkpoint write failed for {id}: {err}"));
        } else {
            debug!(job_id = %id, bytes = payload.len(), "checkpoint persisted");
            self.loaded.insert(id, payload);
        }
        self.settle_flush(id);
    }

    fn settle_flush(&mut self, id: JobId) {
        self.inflight.remove(&id);
        if self.shutdown.in_progress() {
            self.shutdown.settle(id);
        }
    }

    /// Issue an only-if-modified flush unless one is already in flight.
    async fn request_guarded_flush(&mut self, id: JobId) {
        if !self.inflight.insert(id) {
            return;
        }
        if let Err(err) = self.engine.request_flush(id, true).await {
            warn!(job_id = %id, error = %err, "checkpoint flush request failed");
            self.inflight.remove(&id);
        }
    }

    async fn maybe_periodic_flush(&mut self) {
        if self.shutdown.in_progress() || self.last_flush.elapsed() < self.config.flush_interval
        {
            return;
        }
        self.last_flush = Instant::now();
        for id in self.registry.ids() {
            self.request_guarded_flush(id).await;
        }
    }

    async fn begin_shutdown(&mut self) {
        info!(
            jobs = self.registry.len(),
            "termination requested; draining checkpoint flushes"
        );
        let mut awaiting = Vec::new();
        for id in self.registry.ids() {
            if self.inflight.contains(&id) {
                awaiting.push(id);
                continue;
            }
            self.inflight.insert(id);
            if let Err(err) = self.engine.request_flush(id, true).await {
                // No settle event will arrive for a failed request.
                warn!(job_id = %id, error = %err, "shutdown flush request failed");
                self.inflight.remove(&id);
                continue;
            }
            awaiting.push(id);
        }
        self.shutdown.begin(awaiting);
    }

    async fn persist_session(&mut self) {
        match self.engine.export_session_state().await {
            Ok(blob) => match self.session_store.save(&blob) {
                Ok(()) => info!(bytes = blob.len(), "session state persisted"),
                Err(err) => {
                    self.publish_error(format!("session state write failed: {err}"));
                }
            },
            Err(err) => {
                self.publish_error(format!("session state export failed: {err}"));
            }
        }
    }

    fn publish_snapshot(&self) {
        let _ = self.events.publish(Event::Snapshot {
            jobs: self.registry.snapshot(),
        });
    }

    fn publish_error(&self, message: String) {
        warn!(%message, "surfacing error to presentation layer");
        let _ = self.events.publish(Event::Error { message });
    }
}

fn default_save_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
