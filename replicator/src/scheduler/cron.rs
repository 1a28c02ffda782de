// File: replicator/src/scheduler/cron.rs
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument, warn};

use super::ReplicationScheduler;
use crate::config::ScheduleConfig;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Debug, Clone, Copy)]
enum CronJobKind {
    Snapshot,
    Scrub,
    Retry,
}

impl CronJobKind {
    fn label(self) -> &'static str {
        match self {
            CronJobKind::Snapshot => "snapshot",
            CronJobKind::Scrub => "scrub",
            CronJobKind::Retry => "retry",
        }
    }
}

/// Registers the snapshot, scrub and retry jobs with tokio-cron-scheduler
pub struct CronScheduler {
    replication: Arc<ReplicationScheduler>,
    schedule: ScheduleConfig,
    scheduler: JobScheduler,
}

impl CronScheduler {
    pub async fn new(
        replication: Arc<ReplicationScheduler>,
        schedule: ScheduleConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            replication,
            schedule,
            scheduler,
        })
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        info!("Starting replication scheduler with 6-field cron format (sec min hour day month dow)");

        let jobs = [
            (CronJobKind::Snapshot, self.schedule.snapshot_cron.clone()),
            (CronJobKind::Scrub, self.schedule.scrub_cron.clone()),
            (CronJobKind::Retry, self.schedule.retry_cron.clone()),
        ];

        for (kind, schedule) in &jobs {
            let kind = *kind;
            self.schedule_job(kind, schedule).await.map_err(|e| {
                error!("✗ Failed to schedule {} job: {} (schedule: {})", kind.label(), e, schedule);
                e
            })?;
            info!("✓ Scheduled {} job: {}", kind.label(), schedule);
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start JobScheduler: {}", e))?;
        info!("✓ Replication scheduler started with {} jobs", jobs.len());

        Ok(())
    }

    async fn schedule_job(&self, kind: CronJobKind, schedule: &str) -> Result<()> {
        validate_6_field_cron(schedule)
            .map_err(|e| anyhow!("Invalid 6-field cron schedule '{}': {}", schedule, e))?;

        let replication = self.replication.clone();

        let job = Job::new_async(schedule, move |_uuid, _scheduler| {
            let replication = replication.clone();

            Box::pin(async move {
                match kind {
                    CronJobKind::Snapshot => replication.perform_scheduled_snapshot().await,
                    CronJobKind::Scrub => {
                        info!("🔍 Starting scheduled scrub");
                        replication.perform_scheduled_scrub().await
                    }
                    CronJobKind::Retry => {
                        if replication.pending_send_count() > 0 {
                            info!(
                                "Scheduled retry: attempting to send {} pending snapshots",
                                replication.pending_send_count()
                            );
                        }
                        replication.perform_retry().await
                    }
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create {} job for '{}': {}", kind.label(), schedule, e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add {} job to scheduler: {}", kind.label(), e))?;

        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut scheduler = self.scheduler.clone();
        if let Err(e) = scheduler.shutdown().await {
            warn!("Cron scheduler did not shut down cleanly: {}", e);
        } else {
            info!("Cron scheduler stopped");
        }
    }
}

pub fn validate_6_field_cron(schedule: &str) -> Result<()> {
    let parts: Vec<&str> = schedule.split_whitespace().collect();

    if parts.len() != 6 {
        return Err(anyhow!("tokio-cron-scheduler requires exactly 6 fields: second minute hour day month dayofweek. Got {} fields: '{}'", parts.len(), schedule));
    }

    validate_cron_field(parts[0], "second", 0, 59)?;
    validate_cron_field(parts[1], "minute", 0, 59)?;
    validate_cron_field(parts[2], "hour", 0, 23)?;
    validate_cron_field(parts[3], "day", 1, 31)?;
    validate_cron_field(parts[4], "month", 1, 12)?;
    validate_cron_field(parts[5], "dayofweek", 0, 7)?;

    Ok(())
}

fn validate_cron_field(field: &str, name: &str, min: u32, max: u32) -> Result<()> {
    if field == "*" || field == "?" {
        return Ok(());
    }

    if field.contains(',') {
        for part in field.split(',') {
            validate_cron_field(part, name, min, max)?;
        }
        return Ok(());
    }

    if let Some((base, step_str)) = field.split_once('/') {
        let step = step_str
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} step value: {}", name, step_str))?;
        if step == 0 {
            return Err(anyhow!("{} step value cannot be 0", name));
        }
        return validate_cron_field(base, name, min, max);
    }

    if let Some((start, end)) = field.split_once('-') {
        let start = field_value(start, name)
            .map_err(|_| anyhow!("Invalid {} range start: {}", name, start))?;
        let end =
            field_value(end, name).map_err(|_| anyhow!("Invalid {} range end: {}", name, end))?;

        if start < min || start > max || end < min || end > max {
            return Err(anyhow!(
                "{} range {}-{} is outside valid range {}-{}",
                name,
                start,
                end,
                min,
                max
            ));
        }
        return Ok(());
    }

    let value = field_value(field, name)?;
    if value < min || value > max {
        return Err(anyhow!(
            "{} value {} is outside valid range {}-{}",
            name,
            value,
            min,
            max
        ));
    }

    Ok(())
}

/// Numeric value of a field, accepting month and weekday names
fn field_value(value: &str, name: &str) -> Result<u32> {
    if let Ok(number) = value.parse::<u32>() {
        return Ok(number);
    }

    let lower = value.to_ascii_lowercase();
    let names: &[&str] = match name {
        "month" => &MONTH_NAMES,
        "dayofweek" => &WEEKDAY_NAMES,
        _ => &[],
    };
    let offset = if name == "month" { 1 } else { 0 };

    names
        .iter()
        .position(|n| *n == lower)
        .map(|i| i as u32 + offset)
        .ok_or_else(|| anyhow!("Invalid {} value: {}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0 0 2 * * *" ; "daily")]
    #[test_case("0 0 3 * * Sun" ; "weekly by name")]
    #[test_case("0 */30 * * * *" ; "every thirty minutes")]
    #[test_case("0 0 1 1,15 Jan-Jun Mon-Fri" ; "lists and named ranges")]
    #[test_case("0 0/15 8-18 * * 1-5" ; "stepped base")]
    fn test_valid_schedules(schedule: &str) {
        assert!(validate_6_field_cron(schedule).is_ok());
    }

    #[test_case("0 2 * * *" ; "five fields")]
    #[test_case("0 0 24 * * *" ; "hour out of range")]
    #[test_case("0 */0 * * * *" ; "zero step")]
    #[test_case("0 0 2 * * Funday" ; "unknown weekday")]
    #[test_case("0 0 2 32 * *" ; "day out of range")]
    fn test_invalid_schedules(schedule: &str) {
        assert!(validate_6_field_cron(schedule).is_err());
    }
}
