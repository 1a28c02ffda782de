//! Common test data and constants

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use replicator::restore::{RestoreJob, RestoreManager, RestoreStatus};

/// Common dataset names
pub mod datasets {
    pub const LOCAL: &str = "tank/data";
    pub const REMOTE: &str = "backup/data";
    pub const RESTORE_TARGET: &str = "tank/restore";
}

pub mod hosts {
    pub const BACKUP: &str = "backup.example.com";
}

/// Names like `autosnap_test_001`, `autosnap_test_002`, ...
pub fn sequential_namer() -> impl Fn() -> String + Send + Sync + 'static {
    let counter = Arc::new(AtomicUsize::new(0));
    move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("autosnap_test_{:03}", n)
    }
}

/// Always the same name
pub fn fixed_namer(name: &'static str) -> impl Fn() -> String + Send + Sync + 'static {
    move || name.to_string()
}

/// Poll until `check` holds or five seconds pass
pub async fn wait_until<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Poll a restore job until it reaches `status`
pub async fn wait_for_job_status(
    manager: &RestoreManager,
    job_id: &str,
    status: RestoreStatus,
) -> RestoreJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = manager
            .get_job(job_id)
            .await
            .expect("job should be visible while polling");
        if job.status == status {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "job {} stuck in {} (expected {}), last error: {:?}",
                job_id, job.status, status, job.last_error
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub const TEST_CONFIG: &str = r#"
host = "127.0.0.1"
port = 18095

[zfs]
dataset = "tank/data"

[ssh]
remote_host = "backup.example.com"
remote_user = "replicator"
private_key = "/etc/replicator/id_ed25519"
remote_dataset = "backup/data"
"#;

pub fn test_config() -> Arc<replicator::Config> {
    Arc::new(toml::from_str(TEST_CONFIG).expect("test config parses"))
}
