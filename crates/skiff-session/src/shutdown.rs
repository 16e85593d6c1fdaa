//! Graceful-shutdown state machine.
//!
//! Sequencing: `Running → Draining → AwaitingFlushes → PersistingSession →
//! Terminated`. The machine advances out of `AwaitingFlushes` only once
//! **every** recorded job's flush has settled — succeeded or conclusively
//! failed — so no job's unflushed progress is silently abandoned.

use std::collections::BTreeSet;

use skiff_engine_core::JobId;

/// Phases of the graceful-termination sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation.
    Running,
    /// Termination requested; flush requests being issued.
    Draining,
    /// Waiting for every outstanding flush to settle.
    AwaitingFlushes,
    /// All flushes settled; the session blob may now be persisted.
    PersistingSession,
    /// Shutdown complete; the loop returns to its caller.
    Terminated,
}

/// Tracks the termination sequence and the set of unsettled jobs.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    phase: ShutdownPhase,
    awaiting: BTreeSet<JobId>,
}

impl ShutdownCoordinator {
    /// A coordinator in the `Running` phase.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: ShutdownPhase::Running,
            awaiting: BTreeSet::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    /// Whether termination has been requested but not completed.
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        !matches!(
            self.phase,
            ShutdownPhase::Running | ShutdownPhase::Terminated
        )
    }

    /// Whether the sequence has completed.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self.phase, ShutdownPhase::Terminated)
    }

    /// Begin the sequence with the set of jobs whose flushes must settle.
    ///
    /// Draining is instantaneous from the machine's perspective (the caller
    /// issues the flush requests before calling this), so the phase moves
    /// straight to `AwaitingFlushes`, or to `PersistingSession` when there
    /// is nothing to await. A second request is ignored.
    pub fn begin(&mut self, awaiting: impl IntoIterator<Item = JobId>) {
        if self.phase != ShutdownPhase::Running {
            return;
        }
        self.phase = ShutdownPhase::Draining;
        self.awaiting = awaiting.into_iter().collect();
        self.phase = ShutdownPhase::AwaitingFlushes;
        self.advance_if_drained();
    }

    /// Record that a job's flush settled (success or conclusive failure).
    ///
    /// Also used when a job disappears mid-shutdown: a removed job has
    /// nothing left to flush. Unknown identities are ignored.
    pub fn settle(&mut self, id: JobId) {
        self.awaiting.remove(&id);
        self.advance_if_drained();
    }

    /// Whether the session blob may now be persisted.
    #[must_use]
    pub const fn ready_to_persist(&self) -> bool {
        matches!(self.phase, ShutdownPhase::PersistingSession)
    }

    /// Record that the session blob was persisted (or its persistence
    /// conclusively failed) and the sequence is complete.
    pub fn mark_terminated(&mut self) {
        if self.phase == ShutdownPhase::PersistingSession {
            self.phase = ShutdownPhase::Terminated;
        }
    }

    fn advance_if_drained(&mut self) {
        if self.phase == ShutdownPhase::AwaitingFlushes && self.awaiting.is_empty() {
            self.phase = ShutdownPhase::PersistingSession;
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
