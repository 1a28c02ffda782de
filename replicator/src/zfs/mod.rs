//! Local snapshot management
//!
//! The [`SnapshotStore`] trait is what the replication scheduler and restore manager
//! consume; [`ZfsSnapshotStore`] implements it over the `zfs` command line tool.
//!
//! Snapshot lists are always ordered by creation time ascending, with the snapshot
//! name as a tiebreak. That ordering drives both pruning (oldest first) and the
//! search for the most recent snapshot shared with the remote side.

pub mod pool;
pub mod store;
pub mod stream;

pub use pool::{PoolScrubber, ZpoolScrubber};
pub use store::ZfsSnapshotStore;
pub use stream::SendStream;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::SnapshotError;

/// One point-in-time capture of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub name: String,
    pub dataset: String,
    pub created_at: DateTime<Utc>,
    pub used_bytes: u64,
    pub referenced_bytes: u64,
}

impl Snapshot {
    /// `dataset@name` form used on zfs command lines
    pub fn full_name(&self) -> String {
        format!("{}@{}", self.dataset, self.name)
    }
}

/// Sort by creation time ascending, then name
pub fn sort_by_creation(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Dataset this store manages
    fn dataset(&self) -> &str;

    async fn create_snapshot(&self, name: &str) -> Result<(), SnapshotError>;

    /// Snapshots of the managed dataset, oldest first
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, SnapshotError> {
        self.list_snapshots_for(self.dataset()).await
    }

    /// Snapshots of any local dataset, oldest first
    async fn list_snapshots_for(&self, dataset: &str) -> Result<Vec<Snapshot>, SnapshotError>;

    async fn destroy_snapshot(&self, name: &str) -> Result<(), SnapshotError>;

    async fn open_send_stream(&self, snapshot: &str) -> Result<SendStream, SnapshotError>;

    async fn open_incremental_send_stream(
        &self,
        from: &str,
        to: &str,
    ) -> Result<SendStream, SnapshotError>;

    async fn dataset_exists(&self, dataset: &str) -> Result<bool, SnapshotError>;

    /// Whether `dataset` has changed since `dataset@snapshot`
    async fn has_changes_since(&self, dataset: &str, snapshot: &str)
        -> Result<bool, SnapshotError>;
}
