//! Run states.
//!
//! Every run walks the same machine:
//!
//! ```text
//! Idle ─▶ Beginning ─▶ Executing ─▶ Committing ─▶ Done
//!             │            │             │
//!             └────────────┴─────────────┴──▶ RollingBack ─▶ Failed
//! ```

use std::fmt;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Transactions are being begun.
    Beginning,
    /// The unit-of-work closure is running.
    Executing,
    /// Transactions are being committed.
    Committing,
    /// A failure occurred and transactions are being rolled back.
    RollingBack,
    /// Every transaction committed.
    Done,
    /// The run failed; its error has been returned.
    Failed,
}

impl RunState {
    /// Check if the run has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Check if moving to `next` follows the run state machine.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Beginning)
                | (Beginning, Executing)
                | (Beginning, RollingBack)
                | (Executing, Committing)
                | (Executing, RollingBack)
                | (Committing, Done)
                | (Committing, RollingBack)
                | (RollingBack, Failed)
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Beginning => "beginning",
            RunState::Executing => "executing",
            RunState::Committing => "committing",
            RunState::RollingBack => "rolling back",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(RunState::default(), RunState::Idle);
        assert!(!RunState::Idle.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::RollingBack.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(RunState::Idle.can_transition_to(RunState::Beginning));
        assert!(RunState::Beginning.can_transition_to(RunState::RollingBack));
        assert!(RunState::Committing.can_transition_to(RunState::RollingBack));
        assert!(!RunState::Beginning.can_transition_to(RunState::Committing));
        assert!(!RunState::Done.can_transition_to(RunState::RollingBack));
        assert!(!RunState::Failed.can_transition_to(RunState::Beginning));
    }

    #[test]
    fn test_display() {
        assert_eq!(RunState::RollingBack.to_string(), "rolling back");
        assert_eq!(RunState::Done.to_string(), "done");
        assert_eq!(format!("{}", RunState::default()), "idle");
    }
}
