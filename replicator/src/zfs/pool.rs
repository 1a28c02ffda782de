use async_trait::async_trait;
use tracing::info;

use crate::commands::run_command;
use crate::errors::SnapshotError;

/// Storage pool integrity scanning
#[async_trait]
pub trait PoolScrubber: Send + Sync {
    async fn list_pools(&self) -> Result<Vec<String>, SnapshotError>;
    async fn start_scrub(&self, pool: &str) -> Result<(), SnapshotError>;
}

pub struct ZpoolScrubber;

#[async_trait]
impl PoolScrubber for ZpoolScrubber {
    async fn list_pools(&self) -> Result<Vec<String>, SnapshotError> {
        let args = vec!["list".to_string(), "-H".to_string(), "-o".to_string(), "name".to_string()];
        let output = run_command("zpool", &args)
            .await
            .map_err(|e| SnapshotError::Command {
                command: e.command.clone(),
                reason: e.reason(),
            })?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn start_scrub(&self, pool: &str) -> Result<(), SnapshotError> {
        let args = vec!["scrub".to_string(), pool.to_string()];
        run_command("zpool", &args)
            .await
            .map_err(|e| SnapshotError::Command {
                command: e.command.clone(),
                reason: e.reason(),
            })?;

        info!("Scrub started on pool {}", pool);
        Ok(())
    }
}
