// File: replicator/src/restore/manager.rs
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{RestoreJob, RestoreStatus};
use crate::constants::restore::{progress, JOB_RETENTION_MINUTES};
use crate::errors::RestoreError;
use crate::transport::Transport;
use crate::validation::{validate_dataset_name, validate_snapshot_name};
use crate::zfs::{sort_by_creation, SnapshotStore};

pub struct RestoreManager {
    store: Arc<dyn SnapshotStore>,
    transport: Arc<dyn Transport>,
    default_source_dataset: String,
    jobs: Arc<RwLock<HashMap<String, RestoreJob>>>,
    job_retention: chrono::Duration,
    active_workers: Arc<watch::Sender<usize>>,
}

/// Counts a worker as active until dropped
struct ActiveWorker {
    active: Arc<watch::Sender<usize>>,
}

impl ActiveWorker {
    fn register(active: &Arc<watch::Sender<usize>>) -> Self {
        active.send_modify(|n| *n += 1);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl RestoreManager {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
        default_source_dataset: impl Into<String>,
    ) -> Self {
        let (active_workers, _) = watch::channel(0);

        Self {
            store,
            transport,
            default_source_dataset: default_source_dataset.into(),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            job_retention: chrono::Duration::minutes(JOB_RETENTION_MINUTES),
            active_workers: Arc::new(active_workers),
        }
    }

    /// How long finished jobs stay visible
    pub fn with_job_retention(mut self, retention: chrono::Duration) -> Self {
        self.job_retention = retention;
        self
    }

    /// Validate the request, record a job and start its worker
    #[instrument(skip(self))]
    pub async fn start_restore(
        self: &Arc<Self>,
        source_dataset: Option<String>,
        snapshot_name: String,
        target_dataset: String,
    ) -> Result<RestoreJob, RestoreError> {
        let source_dataset = source_dataset.filter(|s| !s.trim().is_empty());

        validate_snapshot_name(&snapshot_name)
            .map_err(|reason| RestoreError::InvalidRequest { reason })?;
        validate_dataset_name(&target_dataset)
            .map_err(|reason| RestoreError::InvalidRequest { reason })?;
        if let Some(source) = &source_dataset {
            validate_dataset_name(source)
                .map_err(|reason| RestoreError::InvalidRequest { reason })?;
        }

        let job = RestoreJob::new(generate_job_id(), source_dataset, snapshot_name, target_dataset);
        self.jobs.write().await.insert(job.id.clone(), job.clone());

        info!(
            "Starting restore job {}: {}@{} -> {}",
            job.id,
            job.source_dataset.as_deref().unwrap_or("default remote dataset"),
            job.snapshot_name,
            job.target_dataset
        );

        self.spawn_worker(job.id.clone());
        Ok(job)
    }

    /// Confirm a job parked in `awaiting_confirmation` and re-run it from the safety check
    #[instrument(skip(self))]
    pub async fn confirm_destructive_restore(
        self: &Arc<Self>,
        job_id: &str,
    ) -> Result<RestoreJob, RestoreError> {
        let confirmed = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(job_id)
                .filter(|job| !job.is_expired(Utc::now(), self.job_retention))
                .ok_or_else(|| RestoreError::JobNotFound {
                    job_id: job_id.to_string(),
                })?;

            if job.status != RestoreStatus::AwaitingConfirmation {
                return Err(RestoreError::NotAwaitingConfirmation {
                    job_id: job_id.to_string(),
                    status: job.status.to_string(),
                });
            }
            if !job.requires_confirmation {
                return Err(RestoreError::ConfirmationNotRequired {
                    job_id: job_id.to_string(),
                });
            }

            job.force_confirmed = true;
            job.requires_confirmation = false;
            job.safety_warning = None;
            job.clone()
        };

        warn!(
            "Destructive restore confirmed for job {}, uncommitted data on {} will be lost",
            job_id, confirmed.target_dataset
        );

        self.spawn_worker(job_id.to_string());
        Ok(confirmed)
    }

    pub async fn get_job(&self, job_id: &str) -> Option<RestoreJob> {
        let now = Utc::now();
        self.jobs
            .read()
            .await
            .get(job_id)
            .filter(|job| !job.is_expired(now, self.job_retention))
            .cloned()
    }

    pub async fn list_jobs(&self) -> Vec<RestoreJob> {
        let now = Utc::now();
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| !job.is_expired(now, self.job_retention))
            .cloned()
            .collect()
    }

    /// Drop finished jobs whose retention window has passed
    pub async fn cleanup_finished_jobs(&self) -> u32 {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        let initial_count = jobs.len();

        jobs.retain(|job_id, job| {
            let keep = !job.is_expired(now, self.job_retention);
            if !keep {
                info!("Cleaned up finished restore job: {} ({})", job_id, job.status);
            }
            keep
        });

        (initial_count - jobs.len()) as u32
    }

    /// Workers currently running a restore; parked jobs are not counted
    pub fn active_worker_count(&self) -> usize {
        *self.active_workers.borrow()
    }

    /// Wait up to `grace` for running restore workers; true once none are left
    pub async fn wait_for_idle(&self, grace: Duration) -> bool {
        let mut active = self.active_workers.subscribe();
        let idle = timeout(grace, active.wait_for(|n| *n == 0)).await.is_ok();
        if !idle {
            warn!(
                "{} restore workers still running after {:?}",
                self.active_worker_count(),
                grace
            );
        }
        idle
    }

    fn spawn_worker(self: &Arc<Self>, job_id: String) {
        let manager = Arc::clone(self);
        let active = ActiveWorker::register(&self.active_workers);
        tokio::spawn(async move {
            let _active = active;
            manager.run_worker(job_id).await;
        });
    }

    /// Fault boundary: errors and panics both end the job as `failed`
    async fn run_worker(&self, job_id: String) {
        let outcome = AssertUnwindSafe(self.perform_restore(&job_id))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fail_job(&job_id, &e).await,
            Err(panic) => {
                let err = RestoreError::WorkerPanic {
                    reason: panic_message(panic.as_ref()),
                };
                error!("Restore job {} panicked", job_id);
                self.fail_job(&job_id, &err).await;
            }
        }
    }

    async fn perform_restore(&self, job_id: &str) -> Result<(), RestoreError> {
        let job = self
            .jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| RestoreError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        let target = job.target_dataset.as_str();

        // Safety check
        self.advance(job_id, RestoreStatus::SafetyCheck, progress::SAFETY_CHECK)
            .await;

        let exists = self
            .store
            .dataset_exists(target)
            .await
            .map_err(|e| RestoreError::SafetyCheck {
                dataset: target.to_string(),
                reason: e.to_string(),
            })?;

        if exists && self.has_uncommitted_data(target).await? {
            if !job.force_confirmed {
                self.await_confirmation(job_id, safety_warning(target)).await;
                return Ok(());
            }
            warn!(
                "Restore job {}: proceeding over uncommitted data on {} (confirmed)",
                job_id, target
            );
        }

        // Source verification
        self.advance(job_id, RestoreStatus::Verifying, progress::VERIFYING_SOURCE)
            .await;

        let source = job
            .source_dataset
            .clone()
            .unwrap_or_else(|| self.default_source_dataset.clone());

        let remote_snapshots = self
            .transport
            .list_remote_snapshot_names(&source)
            .await
            .map_err(|e| RestoreError::SourceEnumeration {
                dataset: source.clone(),
                reason: e.to_string(),
            })?;

        if !remote_snapshots.iter().any(|s| *s == job.snapshot_name) {
            return Err(RestoreError::SnapshotNotFound {
                snapshot: job.snapshot_name.clone(),
                dataset: source,
            });
        }

        // Preparation
        self.advance(job_id, RestoreStatus::Preparing, progress::PREPARING)
            .await;

        match self.store.dataset_exists(target).await {
            Ok(true) => info!("Target dataset {} exists, receiving into it", target),
            Ok(false) => info!("Target dataset {} will be created", target),
            Err(e) => warn!("Could not check target dataset {}: {}", target, e),
        }

        // Transfer
        self.advance(job_id, RestoreStatus::Restoring, progress::RESTORING)
            .await;

        info!(
            "Restore job {}: using {} mode",
            job_id,
            if job.force_confirmed { "DESTRUCTIVE (confirmed)" } else { "SAFE" }
        );

        self.transport
            .restore_from_remote(&source, &job.snapshot_name, target, job.force_confirmed)
            .await
            .map_err(|e| RestoreError::Transfer {
                reason: e.to_string(),
            })?;

        // Post-transfer verification
        self.advance(job_id, RestoreStatus::Verifying, progress::VERIFYING_TARGET)
            .await;

        let restored = self
            .store
            .list_snapshots_for(target)
            .await
            .map_err(|e| RestoreError::SourceEnumeration {
                dataset: target.to_string(),
                reason: e.to_string(),
            })?;

        if !restored.iter().any(|s| s.name == job.snapshot_name) {
            return Err(RestoreError::VerificationFailed {
                snapshot: job.snapshot_name.clone(),
                dataset: target.to_string(),
            });
        }

        self.complete_job(job_id).await;
        Ok(())
    }

    /// A target without any snapshot counts as holding uncommitted data
    async fn has_uncommitted_data(&self, dataset: &str) -> Result<bool, RestoreError> {
        let mut snapshots = self
            .store
            .list_snapshots_for(dataset)
            .await
            .map_err(|e| RestoreError::SafetyCheck {
                dataset: dataset.to_string(),
                reason: e.to_string(),
            })?;
        sort_by_creation(&mut snapshots);

        let Some(latest) = snapshots.last() else {
            return Ok(true);
        };

        self.store
            .has_changes_since(dataset, &latest.name)
            .await
            .map_err(|e| RestoreError::SafetyCheck {
                dataset: dataset.to_string(),
                reason: format!("failed to check for uncommitted data: {}", e),
            })
    }

    async fn advance(&self, job_id: &str, status: RestoreStatus, progress: u8) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = status;
            job.progress_percent = job.progress_percent.max(progress);
        }
    }

    async fn await_confirmation(&self, job_id: &str, warning: String) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = RestoreStatus::AwaitingConfirmation;
            job.requires_confirmation = true;
            job.safety_warning = Some(warning);
            warn!(
                "Restore job {} requires manual confirmation, target dataset {} has uncommitted data",
                job_id, job.target_dataset
            );
        }
    }

    async fn complete_job(&self, job_id: &str) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = RestoreStatus::Completed;
            job.progress_percent = progress::COMPLETED;
            job.ended_at = Some(Utc::now());
            info!("Restore job {} completed successfully", job_id);
        }
    }

    async fn fail_job(&self, job_id: &str, err: &RestoreError) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = RestoreStatus::Failed;
            job.last_error = Some(err.to_string());
            job.ended_at = Some(Utc::now());
            error!("Restore job {} failed: {}", job_id, err);
        }
    }
}

fn generate_job_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("restore_{}_{}", nanos, &suffix[..8])
}

fn safety_warning(dataset: &str) -> String {
    format!(
        "DESTRUCTIVE OPERATION WARNING\n\n\
         Target dataset '{dataset}' contains data that will be PERMANENTLY LOST.\n\
         Restoring rolls the dataset back to the snapshot, destroying any changes made after its last snapshot.\n\n\
         Do NOT proceed while applications are writing to this filesystem.\n\n\
         To proceed:\n\
         1. Stop all applications writing to {dataset}\n\
         2. Confirm that uncommitted data may be lost\n\
         3. Confirm the restore job\n\n\
         This action cannot be undone."
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
