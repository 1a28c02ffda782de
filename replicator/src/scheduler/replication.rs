// File: replicator/src/scheduler/replication.rs
use chrono::{DateTime, Local};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::{compute_send_plan, PendingSendQueue, SendPlan};
use crate::constants::snapshots::{SCHEDULED_PREFIX, TIMESTAMP_FORMAT};
use crate::errors::{ReplicationError, SnapshotError};
use crate::services::SyncNotifier;
use crate::transport::Transport;
use crate::zfs::{sort_by_creation, PoolScrubber, Snapshot, SnapshotStore};

pub type SnapshotNamer = Arc<dyn Fn() -> String + Send + Sync>;

/// `autosnap_<YYYY-MM-DD_HH-MM-SS>` in local wall-clock time
pub fn scheduled_snapshot_name(at: DateTime<Local>) -> String {
    format!("{}_{}", SCHEDULED_PREFIX, at.format(TIMESTAMP_FORMAT))
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub snapshot: String,
    pub plan: SendPlan,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrubSummary {
    pub started: Vec<String>,
    pub failed: Vec<String>,
}

/// Exclusive right to send, holding the pending queue. Clears the busy flag on drop.
struct SendPermit {
    queue: OwnedMutexGuard<PendingSendQueue>,
    busy: Arc<AtomicBool>,
}

impl Deref for SendPermit {
    type Target = PendingSendQueue;

    fn deref(&self) -> &PendingSendQueue {
        &self.queue
    }
}

impl DerefMut for SendPermit {
    fn deref_mut(&mut self) -> &mut PendingSendQueue {
        &mut self.queue
    }
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct ReplicationScheduler {
    store: Arc<dyn SnapshotStore>,
    transport: Arc<dyn Transport>,
    scrubber: Arc<dyn PoolScrubber>,
    notifier: Arc<dyn SyncNotifier>,
    remote_dataset: String,
    retention_count: usize,
    send_gate: Arc<Mutex<PendingSendQueue>>,
    busy: Arc<AtomicBool>,
    pending_view: watch::Sender<Vec<String>>,
    accepting: AtomicBool,
    namer: SnapshotNamer,
}

impl ReplicationScheduler {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
        scrubber: Arc<dyn PoolScrubber>,
        notifier: Arc<dyn SyncNotifier>,
        remote_dataset: impl Into<String>,
        retention_count: usize,
    ) -> Self {
        let (pending_view, _) = watch::channel(Vec::new());

        Self {
            store,
            transport,
            scrubber,
            notifier,
            remote_dataset: remote_dataset.into(),
            retention_count: retention_count.max(1),
            send_gate: Arc::new(Mutex::new(PendingSendQueue::new())),
            busy: Arc::new(AtomicBool::new(false)),
            pending_view,
            accepting: AtomicBool::new(true),
            namer: Arc::new(|| scheduled_snapshot_name(Local::now())),
        }
    }

    /// Replace the snapshot name generator
    pub fn with_snapshot_namer<F>(mut self, namer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.namer = Arc::new(namer);
        self
    }

    pub fn dataset(&self) -> &str {
        self.store.dataset()
    }

    pub fn remote_dataset(&self) -> &str {
        &self.remote_dataset
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, SnapshotError> {
        self.store.list_snapshots().await
    }

    pub fn pending_send_count(&self) -> usize {
        self.pending_view.borrow().len()
    }

    pub fn pending_sends(&self) -> Vec<String> {
        self.pending_view.borrow().clone()
    }

    pub fn is_send_in_progress(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    fn acquire_permit(&self) -> Result<SendPermit, ReplicationError> {
        if !self.is_accepting() {
            return Err(ReplicationError::ShuttingDown);
        }

        let queue = self
            .send_gate
            .clone()
            .try_lock_owned()
            .map_err(|_| ReplicationError::AlreadyInProgress)?;
        self.busy.store(true, Ordering::SeqCst);

        Ok(SendPermit {
            queue,
            busy: self.busy.clone(),
        })
    }

    fn publish_pending(&self, queue: &PendingSendQueue) {
        self.pending_view.send_replace(queue.names());
    }

    /// One replication run; declines immediately if another send holds the gate
    #[instrument(skip(self))]
    pub async fn perform_snapshot(&self) -> Result<SyncOutcome, ReplicationError> {
        let permit = self.acquire_permit()?;
        self.run_snapshot(permit).await
    }

    /// Start a run in the background. The gate is taken before spawning.
    pub fn trigger_snapshot_now(self: &Arc<Self>) -> Result<(), ReplicationError> {
        let permit = self.acquire_permit()?;
        let scheduler = Arc::clone(self);

        tokio::spawn(async move {
            match scheduler.run_snapshot(permit).await {
                Ok(outcome) => info!(
                    "Triggered snapshot {} replicated in {:?}",
                    outcome.snapshot, outcome.duration
                ),
                Err(e) => error!("Triggered snapshot run failed: {}", e),
            }
        });

        Ok(())
    }

    /// Cron entry point for snapshot runs
    pub async fn perform_scheduled_snapshot(&self) {
        info!("Starting scheduled snapshot");
        match self.perform_snapshot().await {
            Ok(outcome) => info!(
                "Scheduled snapshot {} replicated in {:?}",
                outcome.snapshot, outcome.duration
            ),
            Err(e) if e.is_policy_rejection() => {
                warn!("Skipping scheduled snapshot: {}", e)
            }
            Err(e) => error!("Scheduled snapshot failed: {}", e),
        }
    }

    async fn run_snapshot(&self, mut permit: SendPermit) -> Result<SyncOutcome, ReplicationError> {
        if !permit.is_empty() {
            info!("Attempting to retry {} pending snapshots", permit.len());
            if let Err(e) = self.drain_pending(&mut permit).await {
                warn!("Pending sends not fully drained before new snapshot: {}", e);
            }
        }

        let snapshot = (self.namer)();
        let started = Instant::now();

        if let Err(source) = self.store.create_snapshot(&snapshot).await {
            let err = ReplicationError::SnapshotCreate {
                snapshot: snapshot.clone(),
                source,
            };
            error!("Failed to create snapshot {}: {}", snapshot, err);
            self.notify_failure(&snapshot, &err).await;
            return Err(err);
        }
        info!("Created snapshot: {}", snapshot);

        match self.send_snapshot(&snapshot).await {
            Ok(plan) => {
                let duration = started.elapsed();
                info!("Successfully sent snapshot: {} (took {:?})", snapshot, duration);
                self.notify_success(&snapshot, duration).await;
                self.prune_old_snapshots().await;

                Ok(SyncOutcome {
                    snapshot,
                    plan,
                    duration,
                })
            }
            Err(err) => {
                error!("Failed to send snapshot {}: {}", snapshot, err);
                self.notify_failure(&snapshot, &err).await;

                if matches!(err, ReplicationError::Superseded { .. }) {
                    return Err(err);
                }
                if permit.push(&snapshot) {
                    info!(
                        "Added snapshot {} to retry queue ({} pending)",
                        snapshot,
                        permit.len()
                    );
                }
                self.publish_pending(&permit);
                Err(err)
            }
        }
    }

    /// Plan and transfer one snapshot. Remote enumeration happens first and any
    /// failure there aborts before a stream is opened.
    async fn send_snapshot(&self, snapshot: &str) -> Result<SendPlan, ReplicationError> {
        let remote = self
            .transport
            .list_remote_snapshot_names(&self.remote_dataset)
            .await
            .map_err(|source| ReplicationError::RemoteEnumeration {
                dataset: self.remote_dataset.clone(),
                source,
            })?;

        let local = self
            .store
            .list_snapshots()
            .await
            .map_err(|source| ReplicationError::LocalEnumeration { source })?;

        let plan = compute_send_plan(&local, &remote, snapshot)?;

        let opened = match &plan {
            SendPlan::AlreadyReplicated { snapshot } => {
                info!("Remote already holds {}, nothing to send", snapshot);
                return Ok(plan);
            }
            SendPlan::Full { snapshot } => {
                info!("Full send of {}", snapshot);
                self.store.open_send_stream(snapshot).await
            }
            SendPlan::Incremental { from, to } => {
                info!("Incremental send {} -> {}", from, to);
                self.store.open_incremental_send_stream(from, to).await
            }
        };

        let mut stream = opened.map_err(|source| ReplicationError::StreamOpen {
            snapshot: snapshot.to_string(),
            source,
        })?;

        if let Err(source) = self
            .transport
            .send_stream(&mut stream, plan.is_incremental())
            .await
        {
            stream.abort().await;
            return Err(ReplicationError::Transfer {
                snapshot: snapshot.to_string(),
                source,
            });
        }

        stream
            .finish()
            .await
            .map_err(|source| ReplicationError::Producer {
                snapshot: snapshot.to_string(),
                source,
            })?;

        Ok(plan)
    }

    /// Retry every queued snapshot once, with a freshly computed plan each
    async fn drain_pending(&self, queue: &mut PendingSendQueue) -> Result<(), ReplicationError> {
        for snapshot in queue.names() {
            match self.send_snapshot(&snapshot).await {
                Ok(plan) => {
                    queue.remove(&snapshot);
                    info!("Retried snapshot {} delivered ({:?})", snapshot, plan);
                    self.notify_success(&snapshot, Duration::ZERO).await;
                }
                Err(err @ ReplicationError::SnapshotMissing { .. }) => {
                    queue.remove(&snapshot);
                    error!("Dropping pending snapshot {}: {}", snapshot, err);
                    self.notify_failure(&snapshot, &err).await;
                }
                Err(err @ ReplicationError::Superseded { .. }) => {
                    queue.remove(&snapshot);
                    warn!("Dropping pending snapshot {}: {}", snapshot, err);
                    self.notify_failure(&snapshot, &err).await;
                }
                Err(err) => {
                    warn!("Retry of snapshot {} failed: {}", snapshot, err);
                }
            }
            self.publish_pending(queue);
        }

        if queue.is_empty() {
            Ok(())
        } else {
            Err(ReplicationError::PendingRemaining {
                remaining: queue.len(),
            })
        }
    }

    /// Drain the pending queue now; fails fast if a send is running
    #[instrument(skip(self))]
    pub async fn retry_pending_sends(&self) -> Result<(), ReplicationError> {
        let mut permit = self.acquire_permit()?;
        if permit.is_empty() {
            debug!("No pending snapshots to retry");
            return Ok(());
        }

        info!("Retrying {} pending snapshots", permit.len());
        self.drain_pending(&mut permit).await
    }

    /// Cron entry point for retries
    pub async fn perform_retry(&self) {
        match self.retry_pending_sends().await {
            Ok(()) => debug!("Scheduled retry finished"),
            Err(e) if e.is_policy_rejection() => info!("Skipping scheduled retry: {}", e),
            Err(e) => warn!("Scheduled retry: {}", e),
        }
    }

    async fn prune_old_snapshots(&self) {
        let mut snapshots = match self.store.list_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!("Failed to list snapshots for pruning: {}", e);
                return;
            }
        };

        if snapshots.len() <= self.retention_count {
            return;
        }
        sort_by_creation(&mut snapshots);

        let excess = snapshots.len() - self.retention_count;
        for snapshot in &snapshots[..excess] {
            match self.store.destroy_snapshot(&snapshot.name).await {
                Ok(()) => info!("Deleted old snapshot: {}", snapshot.name),
                Err(e) => warn!("Failed to delete old snapshot {}: {}", snapshot.name, e),
            }
        }
    }

    /// Start a scrub on every pool; per-pool failures are logged and skipped
    #[instrument(skip(self))]
    pub async fn perform_scrub(&self) -> Result<ScrubSummary, SnapshotError> {
        let pools = self.scrubber.list_pools().await?;
        let mut summary = ScrubSummary::default();

        for pool in pools {
            info!("Starting scrub for pool: {}", pool);
            match self.scrubber.start_scrub(&pool).await {
                Ok(()) => summary.started.push(pool),
                Err(e) => {
                    warn!("Failed to start scrub for pool {}: {}", pool, e);
                    summary.failed.push(pool);
                }
            }
        }

        Ok(summary)
    }

    pub fn trigger_scrub_now(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.perform_scheduled_scrub().await;
        });
    }

    /// Cron entry point for scrubs
    pub async fn perform_scheduled_scrub(&self) {
        match self.perform_scrub().await {
            Ok(summary) => info!(
                "Scrub started on {} pools ({} failed)",
                summary.started.len(),
                summary.failed.len()
            ),
            Err(e) => error!("Failed to get pools: {}", e),
        }
    }

    /// Stop accepting new runs; in-flight work is left alone
    pub fn begin_shutdown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            info!("Replication scheduler no longer accepting new work");
        }
    }

    /// Wait up to `grace` for an in-flight send; true if the gate is free
    pub async fn wait_for_idle(&self, grace: Duration) -> bool {
        match timeout(grace, self.send_gate.lock()).await {
            Ok(_guard) => true,
            Err(_) => {
                warn!("In-flight send still running after {:?}", grace);
                false
            }
        }
    }

    async fn notify_success(&self, snapshot: &str, duration: Duration) {
        if let Err(e) = self
            .notifier
            .on_sync_success(snapshot, self.store.dataset(), duration)
            .await
        {
            warn!("Failed to deliver success notification for {}: {}", snapshot, e);
        }
    }

    async fn notify_failure(&self, snapshot: &str, err: &ReplicationError) {
        if let Err(e) = self
            .notifier
            .on_sync_failure(snapshot, self.store.dataset(), &err.to_string())
            .await
        {
            warn!("Failed to deliver failure notification for {}: {}", snapshot, e);
        }
    }
}
