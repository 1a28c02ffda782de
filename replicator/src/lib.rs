pub mod commands;
pub mod config;
pub mod constants;
pub mod errors;
pub mod restore;
pub mod scheduler;
pub mod services;
pub mod transport;
pub mod validation;
pub mod web;
pub mod zfs;

// Re-export commonly used types
pub use config::{Config, ConfigManager};
pub use errors::{ReplicationError, RestoreError, SnapshotError, TransportError};
pub use restore::{RestoreJob, RestoreManager, RestoreStatus};
pub use scheduler::{CronScheduler, ReplicationScheduler, SendPlan};
pub use services::{AlertService, SyncNotifier};
pub use transport::{SshTransport, Transport};
pub use zfs::{PoolScrubber, Snapshot, SnapshotStore, ZfsSnapshotStore, ZpoolScrubber};
