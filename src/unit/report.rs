//! What happened during a run.
//!
//! The error returned by a run only carries the primary failure. Anything
//! that goes wrong while cleaning up after it (a rollback that itself fails)
//! is logged and kept here instead.

use std::fmt;

use crate::transaction::{BoxError, ContextKey};
use crate::unit::error::UnitOfWorkResult;
use crate::unit::state::RunState;

/// A rollback that failed while cleaning up a failed run.
#[derive(Debug)]
pub struct RollbackFailure {
    pub key: ContextKey,
    pub error: BoxError,
}

impl fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rollback of {} failed: {}", self.key, self.error)
    }
}

/// Record of a single run.
#[derive(Debug)]
pub struct RunReport {
    /// Unique run ID.
    pub run_id: String,
    /// Name of the unit of work.
    pub name: String,
    /// When the run started.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// When the run reached a terminal state.
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Last state reached.
    pub state: RunState,
    /// Keys begun, in begin order.
    pub begun: Vec<ContextKey>,
    /// Keys whose commit succeeded.
    pub committed: Vec<ContextKey>,
    /// Keys rolled back, whether or not the rollback succeeded.
    pub rolled_back: Vec<ContextKey>,
    pub rollback_failures: Vec<RollbackFailure>,
}

impl RunReport {
    pub(crate) fn new(run_id: String, name: String) -> Self {
        Self {
            run_id,
            name,
            started_at: chrono::Utc::now(),
            finished_at: None,
            state: RunState::Idle,
            begun: Vec::new(),
            committed: Vec::new(),
            rolled_back: Vec::new(),
            rollback_failures: Vec::new(),
        }
    }

    /// Move to the next state of the run.
    pub(crate) fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(chrono::Utc::now());
        }
    }

    /// Check if every transaction committed.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// Check if any rollback failed during cleanup.
    pub fn has_rollback_failures(&self) -> bool {
        !self.rollback_failures.is_empty()
    }

    /// Time between start and the terminal state, if reached.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} [{}]: {} (begun {}, committed {}, rolled back {}, rollback failures {})",
            self.name,
            self.run_id,
            self.state,
            self.begun.len(),
            self.committed.len(),
            self.rolled_back.len(),
            self.rollback_failures.len()
        )
    }
}

/// Result of a run together with its report.
#[derive(Debug)]
pub struct RunOutcome<T> {
    pub result: UnitOfWorkResult<T>,
    pub report: RunReport,
}

impl<T> RunOutcome<T> {
    /// Discard the report.
    pub fn into_result(self) -> UnitOfWorkResult<T> {
        self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
