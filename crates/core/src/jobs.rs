//! Job types, directions, and the job/issue state machines.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the repository layer and the engine without either depending on
//! the other.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Job type and direction
// ---------------------------------------------------------------------------

/// Direction of data movement between the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Training/staging -> production. Sanitization disabled; a critical
    /// validation issue aborts the table.
    Up,
    /// Production -> training/staging. Sanitization enabled.
    Down,
}

/// The kind of work a sync job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullSync,
    IncrementalSync,
    UpSync,
    DownSync,
    PropertyExport,
}

impl JobType {
    /// String representation for display and database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullSync => "full_sync",
            Self::IncrementalSync => "incremental_sync",
            Self::UpSync => "up_sync",
            Self::DownSync => "down_sync",
            Self::PropertyExport => "property_export",
        }
    }

    /// Direction of data movement. Full and incremental syncs move data
    /// toward the training replica, same as an explicit down-sync.
    pub fn direction(self) -> Direction {
        match self {
            Self::UpSync => Direction::Up,
            Self::FullSync | Self::IncrementalSync | Self::DownSync | Self::PropertyExport => {
                Direction::Down
            }
        }
    }

    /// Whether pulls are bounded by the per-table watermark.
    /// Full syncs scan every row and are the only job type that deletes.
    pub fn uses_watermark(self) -> bool {
        matches!(self, Self::IncrementalSync | Self::DownSync | Self::UpSync)
    }

    /// Whether rows present in the target but absent in the source are
    /// soft-deleted. Only full syncs converge deletions.
    pub fn deletes_missing_rows(self) -> bool {
        matches!(self, Self::FullSync)
    }

    /// Whether PII sanitization applies. Only down-direction syncs
    /// sanitize; exports read production data verbatim.
    pub fn sanitizes(self) -> bool {
        matches!(self, Self::FullSync | Self::IncrementalSync | Self::DownSync)
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_sync" => Ok(Self::FullSync),
            "incremental_sync" => Ok(Self::IncrementalSync),
            "up_sync" => Ok(Self::UpSync),
            "down_sync" => Ok(Self::DownSync),
            "property_export" => Ok(Self::PropertyExport),
            other => Err(format!("Unknown job type: {other}")),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job state machine
// ---------------------------------------------------------------------------

/// Job status IDs matching `sync.job_statuses` seed data (1-based SMALLINT).
pub mod state_machine {
    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Succeeded=3, Failed=4, Cancelled=5) return an empty
    /// slice because terminal states are write-once.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Pending -> Running, Cancelled
            1 => &[2, 5],
            // Running -> Succeeded, Failed, Cancelled, Paused
            2 => &[3, 4, 5, 6],
            // Paused -> Running, Cancelled
            6 => &[2, 5],
            // Terminal states: Succeeded, Failed, Cancelled
            3 | 4 | 5 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Whether a status ID is terminal (no outgoing transitions).
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, 3 | 4 | 5)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Running",
            3 => "Succeeded",
            4 => "Failed",
            5 => "Cancelled",
            6 => "Paused",
            _ => "Unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Issue state machine
// ---------------------------------------------------------------------------

/// Lifecycle of a data-quality issue:
/// `open -> acknowledged? -> resolved | suppressed`.
///
/// Only `open` issues count toward quality scores. Suppression silences
/// future identical issues (same rule, record, and field).
pub mod issue_lifecycle {
    /// Returns the set of valid target statuses reachable from `from`.
    pub fn valid_transitions(from: &str) -> &'static [&'static str] {
        match from {
            "open" => &["acknowledged", "resolved", "suppressed"],
            "acknowledged" => &["resolved", "suppressed"],
            // Resolved and suppressed are terminal.
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: &str, to: &str) -> bool {
        valid_transitions(from).contains(&to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Job type semantics
    // -----------------------------------------------------------------------

    #[test]
    fn up_sync_moves_up_without_sanitization() {
        assert_eq!(JobType::UpSync.direction(), Direction::Up);
        assert!(!JobType::UpSync.sanitizes());
    }

    #[test]
    fn down_direction_jobs_sanitize() {
        assert!(JobType::DownSync.sanitizes());
        assert!(JobType::FullSync.sanitizes());
        assert!(JobType::IncrementalSync.sanitizes());
    }

    #[test]
    fn only_full_sync_deletes() {
        assert!(JobType::FullSync.deletes_missing_rows());
        assert!(!JobType::IncrementalSync.deletes_missing_rows());
        assert!(!JobType::DownSync.deletes_missing_rows());
    }

    #[test]
    fn full_sync_ignores_watermark() {
        assert!(!JobType::FullSync.uses_watermark());
        assert!(JobType::IncrementalSync.uses_watermark());
    }

    #[test]
    fn export_reads_production_verbatim() {
        assert!(!JobType::PropertyExport.sanitizes());
    }

    #[test]
    fn job_type_roundtrip() {
        for t in [
            JobType::FullSync,
            JobType::IncrementalSync,
            JobType::UpSync,
            JobType::DownSync,
            JobType::PropertyExport,
        ] {
            assert_eq!(t.as_str().parse::<JobType>().unwrap(), t);
        }
    }

    // -----------------------------------------------------------------------
    // Job state machine
    // -----------------------------------------------------------------------

    use super::state_machine::*;

    #[test]
    fn pending_to_running() {
        assert!(can_transition(1, 2));
    }

    #[test]
    fn running_to_paused_and_back() {
        assert!(can_transition(2, 6));
        assert!(can_transition(6, 2));
    }

    #[test]
    fn paused_to_cancelled() {
        assert!(can_transition(6, 5));
    }

    #[test]
    fn terminal_states_are_write_once() {
        assert!(valid_transitions(3).is_empty());
        assert!(valid_transitions(4).is_empty());
        assert!(valid_transitions(5).is_empty());
    }

    #[test]
    fn pending_cannot_succeed_directly() {
        assert!(!can_transition(1, 3));
    }

    #[test]
    fn terminal_check() {
        assert!(is_terminal(3));
        assert!(is_terminal(4));
        assert!(is_terminal(5));
        assert!(!is_terminal(1));
        assert!(!is_terminal(2));
        assert!(!is_terminal(6));
    }

    #[test]
    fn validate_transition_err_names_states() {
        let err = validate_transition(3, 2).unwrap_err();
        assert!(err.contains("Succeeded"));
        assert!(err.contains("Running"));
    }

    // -----------------------------------------------------------------------
    // Issue lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn issue_open_to_acknowledged_to_resolved() {
        assert!(issue_lifecycle::can_transition("open", "acknowledged"));
        assert!(issue_lifecycle::can_transition("acknowledged", "resolved"));
    }

    #[test]
    fn issue_open_directly_to_suppressed() {
        assert!(issue_lifecycle::can_transition("open", "suppressed"));
    }

    #[test]
    fn resolved_issue_is_terminal() {
        assert!(issue_lifecycle::valid_transitions("resolved").is_empty());
        assert!(!issue_lifecycle::can_transition("resolved", "open"));
    }
}
