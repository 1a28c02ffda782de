use async_trait::async_trait;
use std::sync::Mutex;

use replicator::errors::SnapshotError;
use replicator::zfs::PoolScrubber;

/// Pool scrubber with a fixed pool list; listed pools in `failing` refuse to scrub
pub struct MockScrubber {
    pools: Vec<String>,
    failing: Vec<String>,
    started: Mutex<Vec<String>>,
}

impl MockScrubber {
    pub fn new(pools: &[&str]) -> Self {
        Self {
            pools: pools.iter().map(|p| p.to_string()).collect(),
            failing: Vec::new(),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failing(mut self, pools: &[&str]) -> Self {
        self.failing = pools.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl PoolScrubber for MockScrubber {
    async fn list_pools(&self) -> Result<Vec<String>, SnapshotError> {
        Ok(self.pools.clone())
    }

    async fn start_scrub(&self, pool: &str) -> Result<(), SnapshotError> {
        if self.failing.iter().any(|p| p == pool) {
            return Err(SnapshotError::Command {
                command: format!("zpool scrub {}", pool),
                reason: "currently scrubbing".to_string(),
            });
        }
        self.started.lock().unwrap().push(pool.to_string());
        Ok(())
    }
}
