// File: replicator/src/services/mod.rs

pub mod alert_service;

pub use alert_service::{AlertPayload, AlertService, AlertSeverity, AlertType};

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Receives replication outcomes. Delivery is fire-and-forget: callers log
/// errors and never branch on them.
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn on_sync_success(&self, snapshot: &str, dataset: &str, duration: Duration) -> Result<()>;
    async fn on_sync_failure(&self, snapshot: &str, dataset: &str, error: &str) -> Result<()>;
}

