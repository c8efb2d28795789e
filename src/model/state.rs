//! Scan lifecycle state machine
//!
//! Pure validation over (current, requested) state pairs. The machine holds no
//! storage or concurrency responsibility: the orchestrator drives the edges
//! and the store re-checks them inside its write transactions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ScanError};

/// Lifecycle state of one scan job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Pending => "pending",
            ScanState::Running => "running",
            ScanState::Completed => "completed",
            ScanState::Failed => "failed",
            ScanState::Cancelled => "cancelled",
        }
    }

    /// Completed, Failed and Cancelled accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// True if `next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanState::Pending),
            "running" => Ok(ScanState::Running),
            "completed" => Ok(ScanState::Completed),
            "failed" => Ok(ScanState::Failed),
            "cancelled" => Ok(ScanState::Cancelled),
            other => Err(format!("unknown scan state '{other}'")),
        }
    }
}

/// Validates a single requested edge of the lifecycle graph.
pub fn validate_transition(from: ScanState, to: ScanState) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ScanError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_edges_are_accepted() {
        assert!(ScanState::Pending.can_transition_to(ScanState::Running));
        assert!(ScanState::Pending.can_transition_to(ScanState::Cancelled));
        assert!(ScanState::Running.can_transition_to(ScanState::Completed));
        assert!(ScanState::Running.can_transition_to(ScanState::Failed));
        assert!(ScanState::Running.can_transition_to(ScanState::Cancelled));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for terminal in [
            ScanState::Completed,
            ScanState::Failed,
            ScanState::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                ScanState::Pending,
                ScanState::Running,
                ScanState::Completed,
                ScanState::Failed,
                ScanState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for state in [ScanState::Pending, ScanState::Running] {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn pending_cannot_skip_to_completed_or_failed() {
        assert!(!ScanState::Pending.can_transition_to(ScanState::Completed));
        assert!(!ScanState::Pending.can_transition_to(ScanState::Failed));
        assert!(!ScanState::Running.can_transition_to(ScanState::Pending));
    }

    #[test]
    fn validate_reports_the_offending_edge() {
        let err = validate_transition(ScanState::Completed, ScanState::Running).unwrap_err();
        match err {
            ScanError::InvalidTransition { from, to } => {
                assert_eq!(from, ScanState::Completed);
                assert_eq!(to, ScanState::Running);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn display_and_parse_round_trip() {
        for state in [
            ScanState::Pending,
            ScanState::Running,
            ScanState::Completed,
            ScanState::Failed,
            ScanState::Cancelled,
        ] {
            assert_eq!(state.as_str().parse::<ScanState>().unwrap(), state);
        }
        assert!("paused".parse::<ScanState>().is_err());
    }
}
