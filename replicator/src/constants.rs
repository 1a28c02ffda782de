//! Central repository for timeouts, limits, and naming constants
//!
//! Organized by category so the replication, restore, and transport code share a
//! single source of truth for the values that shape their behavior.

/// Snapshot naming and retention
pub mod snapshots {
    /// Prefix for snapshots created by the scheduler
    pub const SCHEDULED_PREFIX: &str = "autosnap";

    /// chrono format for the timestamp part of scheduled snapshot names
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

    /// Number of local snapshots kept after a successful send
    pub const DEFAULT_RETENTION_COUNT: usize = 30;
}

/// Restore job bookkeeping
pub mod restore {
    /// Minutes a finished job stays visible before eviction
    pub const JOB_RETENTION_MINUTES: i64 = 60;

    /// Interval of the background job cleanup loop
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 300;

    pub mod progress {
        pub const STARTING: u8 = 0;
        pub const SAFETY_CHECK: u8 = 5;
        pub const VERIFYING_SOURCE: u8 = 10;
        pub const PREPARING: u8 = 20;
        pub const RESTORING: u8 = 30;
        pub const VERIFYING_TARGET: u8 = 90;
        pub const COMPLETED: u8 = 100;
    }
}

/// Remote transport constants
pub mod transport {
    /// Default mbuffer memory size on the receiving side
    pub const DEFAULT_MBUFFER_SIZE: &str = "1G";

    /// mbuffer block size
    pub const MBUFFER_BLOCK_SIZE: &str = "128k";

    /// Exit status the ssh client uses for its own (non-remote) failures
    pub const SSH_CLIENT_FAILURE_STATUS: i32 = 255;
}

/// Alert delivery
pub mod alerts {
    /// Webhook request timeout
    pub const WEBHOOK_TIMEOUT_SECONDS: u64 = 10;
}

/// Default configuration values
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8095;
    pub const CONFIG_PATH: &str = "config/main.toml";
    pub const CONFIG_PATH_ENV: &str = "REPLICATOR_CONFIG";
    pub const SEND_COMPRESSION: &str = "lz4";
    pub const SNAPSHOT_CRON: &str = "0 0 2 * * *";
    pub const SCRUB_CRON: &str = "0 0 3 * * Sun";
    pub const RETRY_CRON: &str = "0 */30 * * * *";
    pub const SHUTDOWN_GRACE_SECONDS: u64 = 30;
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 30;
}

/// Local binaries the service shells out to
pub const REQUIRED_COMMANDS: &[&str] = &["zfs", "zpool", "ssh"];
