//! Restore jobs
//!
//! A restore pulls a snapshot from the backup host into a local dataset. Each job
//! runs on its own task and walks through:
//!
//! `starting → safety_check → (awaiting_confirmation | verifying) → preparing →
//! restoring → verifying → completed`, with `failed` reachable from any
//! non-terminal state.
//!
//! A target that holds data written since its latest snapshot (or that has no
//! snapshot at all) parks the job in `awaiting_confirmation` until an operator
//! confirms the destructive overwrite. Confirmation re-runs the whole procedure
//! from the safety check.
//!
//! Jobs live in memory only and are evicted a fixed time after they finish.

pub mod manager;

pub use manager::RestoreManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    Starting,
    SafetyCheck,
    AwaitingConfirmation,
    Verifying,
    Preparing,
    Restoring,
    Completed,
    Failed,
}

impl RestoreStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RestoreStatus::Completed | RestoreStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RestoreStatus::Starting => "starting",
            RestoreStatus::SafetyCheck => "safety_check",
            RestoreStatus::AwaitingConfirmation => "awaiting_confirmation",
            RestoreStatus::Verifying => "verifying",
            RestoreStatus::Preparing => "preparing",
            RestoreStatus::Restoring => "restoring",
            RestoreStatus::Completed => "completed",
            RestoreStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreJob {
    pub id: String,
    pub snapshot_name: String,
    /// None means the configured default remote dataset
    pub source_dataset: Option<String>,
    pub target_dataset: String,
    pub status: RestoreStatus,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub requires_confirmation: bool,
    pub safety_warning: Option<String>,
    pub force_confirmed: bool,
}

impl RestoreJob {
    pub fn new(
        id: String,
        source_dataset: Option<String>,
        snapshot_name: String,
        target_dataset: String,
    ) -> Self {
        Self {
            id,
            snapshot_name,
            source_dataset,
            target_dataset,
            status: RestoreStatus::Starting,
            progress_percent: 0,
            started_at: Utc::now(),
            ended_at: None,
            last_error: None,
            requires_confirmation: false,
            safety_warning: None,
            force_confirmed: false,
        }
    }

    /// Whether the job has been terminal for at least `retention`
    pub fn is_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        match (self.status.is_terminal(), self.ended_at) {
            (true, Some(ended_at)) => now - ended_at >= retention,
            _ => false,
        }
    }
}
