//! Presentation-facing event bus for the skiff coordinator.
//!
//! The coordinator never mutates presentation state directly; every
//! UI-visible change is published here as an owned, immutable envelope and
//! delivered on the subscriber's own task. Internally the bus wraps
//! `tokio::broadcast` with a bounded replay ring so late subscribers (or a
//! reconnecting display) can catch up from a known event id; when the
//! channel overflows, the oldest events are dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Lifecycle states a transfer job moves through, as shown to the display.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted by the engine, nothing observed yet.
    Submitted,
    /// Validating previously checkpointed data on disk.
    CheckingResume,
    /// Fetching metadata before payload transfer can begin.
    DownloadingMetadata,
    /// Payload transfer in progress.
    Downloading,
    /// Payload complete, uploading to peers.
    Seeding,
    /// All wanted bytes present.
    Finished,
    /// Absorbing error state; the job stays visible until removed.
    Errored {
        /// Human-readable failure description from the engine.
        message: String,
    },
}

impl JobState {
    /// Whether the state admits no further transfer progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Errored { .. })
    }
}

/// Immutable per-job row handed to the presentation layer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct JobView {
    /// Stable content identity, lowercase hex.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Bytes transferred so far.
    pub bytes_done: u64,
    /// Total wanted bytes (zero until metadata is known).
    pub bytes_total: u64,
    /// Directory the payload is written to.
    pub save_path: String,
    /// Connected peer count.
    pub peer_count: u32,
    /// Current download rate in bytes per second.
    pub download_bps: u64,
}

/// Typed events surfaced to the presentation layer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Full job directory snapshot, published after every registry mutation.
    Snapshot {
        /// Sorted job rows.
        jobs: Vec<JobView>,
    },
    /// Full blocked-range list, published after every filter update.
    Blocklist {
        /// Rendered address ranges.
        ranges: Vec<String>,
    },
    /// A recoverable failure the user should see.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for stream consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Event::Snapshot { .. } => "snapshot",
            Event::Blocklist { .. } => "blocklist",
            Event::Error { .. } => "error",
        }
    }
}

/// Metadata wrapper tracking the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the replay buffer so
    /// dropped events impact both structures consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event, assigning it a sequential identifier.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn publish(&self, event: Event) -> EventId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer.lock().expect("event buffer mutex poisoned");
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.buffer.lock().expect("event buffer mutex poisoned");
            for item in buffer.iter() {
                if item.id > since {
                    backlog.push_back(item.clone());
                }
            }
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Returns the last assigned identifier, if any events have been published.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().expect("event buffer mutex poisoned");
        buffer.back().map(|event| event.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper yielding events from the replay backlog first, then the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
