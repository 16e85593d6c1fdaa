//! Command value objects and the per-kind FIFO queues feeding the
//! coordinator.
//!
//! One queue per command kind; each is multi-producer (any presentation
//! thread may enqueue) and single-consumer (the coordinator drains once per
//! tick). Enqueue never blocks and never drops; ordering is FIFO within a
//! kind and unspecified across kinds.

use std::path::PathBuf;

use skiff_engine_core::JobId;
use tokio::sync::mpsc;

/// Request to admit a new job from a magnet URI or metainfo file.
#[derive(Debug, Clone)]
pub struct SubmitCommand {
    /// Raw user-supplied source text.
    pub source: String,
    /// Optional save directory; current working directory when absent.
    pub destination: Option<PathBuf>,
}

/// Request to remove a job by identity.
#[derive(Debug, Clone, Copy)]
pub struct RemoveCommand {
    /// Job to remove.
    pub id: JobId,
}

/// Request to author a shareable descriptor from a folder.
#[derive(Debug, Clone)]
pub struct CreateCommand {
    /// Folder whose contents are shared.
    pub source_folder: PathBuf,
    /// Optional output path; sibling `<folder>.torrent` when absent.
    pub destination: Option<PathBuf>,
    /// Optional announce URL.
    pub tracker: Option<String>,
}

/// Direction of a blocklist update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlocklistAction {
    /// Add the range to the filter.
    Add,
    /// Remove the range from the filter.
    Remove,
}

/// Request to update the engine's peer block filter.
#[derive(Debug, Clone)]
pub struct BlocklistCommand {
    /// Address or inclusive address range, textual form.
    pub address: String,
    /// Whether to add or remove the range.
    pub action: BlocklistAction,
}

/// Cloneable producer handle given to the presentation layer.
#[derive(Debug, Clone)]
pub struct CommandSink {
    submit: mpsc::UnboundedSender<SubmitCommand>,
    remove: mpsc::UnboundedSender<RemoveCommand>,
    create: mpsc::UnboundedSender<CreateCommand>,
    blocklist: mpsc::UnboundedSender<BlocklistCommand>,
}

impl CommandSink {
    /// Enqueue a submit command. Never blocks; silently ignored only after
    /// the coordinator has shut down and dropped its queues.
    pub fn submit(&self, command: SubmitCommand) {
        let _ = self.submit.send(command);
    }

    /// Enqueue a remove command.
    pub fn remove(&self, command: RemoveCommand) {
        let _ = self.remove.send(command);
    }

    /// Enqueue a create command.
    pub fn create(&self, command: CreateCommand) {
        let _ = self.create.send(command);
    }

    /// Enqueue a blocklist update command.
    pub fn blocklist(&self, command: BlocklistCommand) {
        let _ = self.blocklist.send(command);
    }
}

/// Single-consumer ends drained by the coordinator once per tick.
#[derive(Debug)]
pub struct CommandQueues {
    submit: mpsc::UnboundedReceiver<SubmitCommand>,
    remove: mpsc::UnboundedReceiver<RemoveCommand>,
    create: mpsc::UnboundedReceiver<CreateCommand>,
    blocklist: mpsc::UnboundedReceiver<BlocklistCommand>,
}

impl CommandQueues {
    /// Drain every pending submit command in FIFO order.
    pub fn drain_submit(&mut self) -> Vec<SubmitCommand> {
        drain(&mut self.submit)
    }

    /// Drain every pending remove command in FIFO order.
    pub fn drain_remove(&mut self) -> Vec<RemoveCommand> {
        drain(&mut self.remove)
    }

    /// Drain every pending create command in FIFO order.
    pub fn drain_create(&mut self) -> Vec<CreateCommand> {
        drain(&mut self.create)
    }

    /// Drain every pending blocklist command in FIFO order.
    pub fn drain_blocklist(&mut self) -> Vec<BlocklistCommand> {
        drain(&mut self.blocklist)
    }
}

fn drain<T>(receiver: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut batch = Vec::new();
    while let Ok(command) = receiver.try_recv() {
        batch.push(command);
    }
    batch
}

/// Build a connected sink/queues pair.
#[must_use]
pub fn command_queues() -> (CommandSink, CommandQueues) {
    let (submit_tx, submit_rx) = mpsc::unbounded_channel();
    let (remove_tx, remove_rx) = mpsc::unbounded_channel();
    let (create_tx, create_rx) = mpsc::unbounded_channel();
    let (blocklist_tx, blocklist_rx) = mpsc::unbounded_channel();
    (
        CommandSink {
            submit: submit_tx,
            remove: remove_tx,
            create: create_tx,
            blocklist: blocklist_tx,
        },
        CommandQueues {
            submit: submit_rx,
            remove: remove_rx,
            create: create_rx,
            blocklist: blocklist_rx,
        },
    )
}
