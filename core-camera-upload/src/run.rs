//! # Run State Machine
//!
//! Phases of one synchronization pass and the outcome it reports.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Gating → Indexing → Diffing → Executing
//!   ↑       │         │          │          │
//!   └───────┴─────────┴──────────┴──────────┘
//! ```
//!
//! Every phase may return to `Idle`; gate failures and index errors end the
//! pass early.

use crate::error::{CameraUploadError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// No pass in flight
    #[default]
    Idle,
    /// Checking login, configuration, network and permissions
    Gating,
    /// Building the local and remote indexes
    Indexing,
    /// Computing deltas
    Diffing,
    /// Materializing and queueing uploads
    Executing,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Gating => "gating",
            RunPhase::Indexing => "indexing",
            RunPhase::Diffing => "diffing",
            RunPhase::Executing => "executing",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, RunPhase::Idle)
    }

    /// Whether `next` may follow this phase
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (RunPhase::Idle, RunPhase::Gating)
                | (RunPhase::Gating, RunPhase::Indexing)
                | (RunPhase::Indexing, RunPhase::Diffing)
                | (RunPhase::Diffing, RunPhase::Executing)
                | (RunPhase::Gating, RunPhase::Idle)
                | (RunPhase::Indexing, RunPhase::Idle)
                | (RunPhase::Diffing, RunPhase::Idle)
                | (RunPhase::Executing, RunPhase::Idle)
        )
    }

    /// Validated transition
    pub fn transition(self, next: RunPhase) -> Result<RunPhase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CameraUploadError::InvalidPhaseTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl FromStr for RunPhase {
    type Err = CameraUploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(RunPhase::Idle),
            "gating" => Ok(RunPhase::Gating),
            "indexing" => Ok(RunPhase::Indexing),
            "diffing" => Ok(RunPhase::Diffing),
            "executing" => Ok(RunPhase::Executing),
            _ => Err(CameraUploadError::InvalidPhase(s.to_string())),
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Precondition that stopped a pass, in checking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFailure {
    NotLoggedIn,
    Disabled,
    NoDestination,
    Offline,
    WifiRequired,
    PermissionsMissing,
    /// The destination folder was deleted or trashed; camera upload was
    /// disabled and reset.
    DestinationGone,
}

impl GateFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateFailure::NotLoggedIn => "not_logged_in",
            GateFailure::Disabled => "disabled",
            GateFailure::NoDestination => "no_destination",
            GateFailure::Offline => "offline",
            GateFailure::WifiRequired => "wifi_required",
            GateFailure::PermissionsMissing => "permissions_missing",
            GateFailure::DestinationGone => "destination_gone",
        }
    }
}

impl std::fmt::Display for GateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters for a pass that reached execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Deltas computed
    pub deltas: u64,
    /// Assets whose files were queued
    pub uploaded: u64,
    /// Assets found unchanged by the upload task
    pub skipped: u64,
    /// Assets that failed to materialize
    pub failed: u64,
    /// Size of the local index
    pub total: u64,
}

/// What a call to `run_once` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The previous pass finished less than the cooldown ago
    CoolingDown,
    Skipped(GateFailure),
    Completed(RunSummary),
    /// Indexing or another run-level step failed
    Failed(String),
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let phase = RunPhase::Idle
            .transition(RunPhase::Gating)
            .and_then(|p| p.transition(RunPhase::Indexing))
            .and_then(|p| p.transition(RunPhase::Diffing))
            .and_then(|p| p.transition(RunPhase::Executing))
            .and_then(|p| p.transition(RunPhase::Idle))
            .unwrap();
        assert_eq!(phase, RunPhase::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(RunPhase::Idle.transition(RunPhase::Executing).is_err());
        assert!(RunPhase::Executing.transition(RunPhase::Gating).is_err());
        assert!(RunPhase::Idle.transition(RunPhase::Idle).is_err());
        assert!(RunPhase::Gating.transition(RunPhase::Idle).is_ok());
    }

    #[test]
    fn test_phase_string_round_trip() {
        for phase in [
            RunPhase::Idle,
            RunPhase::Gating,
            RunPhase::Indexing,
            RunPhase::Diffing,
            RunPhase::Executing,
        ] {
            assert_eq!(phase.as_str().parse::<RunPhase>().unwrap(), phase);
        }
        assert!("uploading".parse::<RunPhase>().is_err());
        assert!(RunPhase::Diffing.is_active());
    }

    #[test]
    fn test_outcome_summary() {
        let summary = RunSummary {
            deltas: 2,
            uploaded: 1,
            skipped: 0,
            failed: 1,
            total: 10,
        };
        assert_eq!(RunOutcome::Completed(summary).summary(), Some(&summary));
        assert_eq!(RunOutcome::CoolingDown.summary(), None);
        assert_eq!(GateFailure::WifiRequired.to_string(), "wifi_required");
    }
}
