//! Replication scheduling
//!
//! This module drives snapshot replication to the backup host:
//! - Periodic and on-demand snapshot + send runs
//! - Full vs. incremental send planning against the remote snapshot set
//! - A single-flight gate so only one send is ever in flight
//! - A pending queue of snapshots whose transfer failed, retried on later runs
//! - Periodic pool scrubs, independent of the send gate
//!
//! # Configuration
//!
//! Schedules use 6-field cron expressions (sec min hour day month dow):
//!
//! ```toml
//! [schedule]
//! snapshot_cron = "0 0 2 * * *"    # Daily at 2 AM
//! scrub_cron = "0 0 3 * * Sun"     # Weekly on Sunday at 3 AM
//! retry_cron = "0 */30 * * * *"    # Every 30 minutes
//! retention_count = 30
//! ```

pub mod cron;
pub mod queue;
pub mod replication;

pub use cron::CronScheduler;
pub use queue::PendingSendQueue;
pub use replication::{scheduled_snapshot_name, ReplicationScheduler, ScrubSummary, SyncOutcome};

use serde::Serialize;
use std::collections::HashSet;

use crate::errors::ReplicationError;
use crate::zfs::{sort_by_creation, Snapshot};

/// What to transfer for one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendPlan {
    Full { snapshot: String },
    Incremental { from: String, to: String },
    /// Remote already holds the snapshot, nothing to send
    AlreadyReplicated { snapshot: String },
}

impl SendPlan {
    pub fn snapshot(&self) -> &str {
        match self {
            SendPlan::Full { snapshot } | SendPlan::AlreadyReplicated { snapshot } => snapshot,
            SendPlan::Incremental { to, .. } => to,
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, SendPlan::Incremental { .. })
    }
}

/// Decide how to send `target` given the local snapshots and the remote snapshot names.
///
/// The incremental base is the most recently created local snapshot that is older than
/// `target` and also present remotely. With no such snapshot (or an empty remote) the
/// plan is a full send. A remote that already holds a local snapshot newer than
/// `target` makes the target `Superseded`.
pub fn compute_send_plan(
    local: &[Snapshot],
    remote: &[String],
    target: &str,
) -> Result<SendPlan, ReplicationError> {
    let mut ordered = local.to_vec();
    sort_by_creation(&mut ordered);

    let target_index = ordered
        .iter()
        .position(|s| s.name == target)
        .ok_or_else(|| ReplicationError::SnapshotMissing {
            snapshot: target.to_string(),
        })?;

    let remote_names: HashSet<&str> = remote.iter().map(String::as_str).collect();

    if remote_names.contains(target) {
        return Ok(SendPlan::AlreadyReplicated {
            snapshot: target.to_string(),
        });
    }

    if let Some(newer) = ordered[target_index + 1..]
        .iter()
        .rev()
        .find(|s| remote_names.contains(s.name.as_str()))
    {
        return Err(ReplicationError::Superseded {
            snapshot: target.to_string(),
            newer: newer.name.clone(),
        });
    }

    let base = ordered[..target_index]
        .iter()
        .rev()
        .find(|s| remote_names.contains(s.name.as_str()));

    Ok(match base {
        Some(base) => SendPlan::Incremental {
            from: base.name.clone(),
            to: target.to_string(),
        },
        None => SendPlan::Full {
            snapshot: target.to_string(),
        },
    })
}
