// File: replicator/src/services/alert_service.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use super::SyncNotifier;
use crate::config::AlertsConfig;
use crate::constants::alerts::WEBHOOK_TIMEOUT_SECONDS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AlertType {
    Replication,
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub dataset: String,
    pub snapshot: Option<String>,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

/// Webhook notification sink
#[derive(Clone)]
pub struct AlertService {
    webhook_url: String,
    alert_on_success: bool,
    client: Client,
}

impl AlertService {
    pub fn new(config: &AlertsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client for AlertService: {}", e))?;

        Ok(Self {
            webhook_url: config.webhook_url.trim().to_string(),
            alert_on_success: config.alert_on_success,
            client,
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    pub fn get_webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Send an alert right away
    pub async fn send_immediate_alert(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        dataset: &str,
        snapshot: Option<&str>,
        message: String,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let payload = AlertPayload {
            timestamp: Utc::now(),
            alert_type,
            severity,
            dataset: dataset.to_string(),
            snapshot: snapshot.map(str::to_string),
            message,
            details,
        };

        self.send_webhook(&payload).await
    }

    /// Post a test alert; fails when the endpoint is unreachable or rejects it
    pub async fn test_webhook(&self) -> Result<()> {
        if !self.is_enabled() {
            return Err(anyhow!("No webhook URL configured"));
        }

        self.send_immediate_alert(
            AlertType::Test,
            AlertSeverity::Info,
            "replicator",
            None,
            "Replicator webhook test".to_string(),
            None,
        )
        .await
    }

    async fn send_webhook(&self, payload: &AlertPayload) -> Result<()> {
        if self.webhook_url.is_empty() {
            debug!("No webhook URL configured, skipping alert");
            return Ok(());
        }

        let response = timeout(
            Duration::from_secs(WEBHOOK_TIMEOUT_SECONDS),
            self.client.post(&self.webhook_url).json(payload).send(),
        )
        .await
        .map_err(|_| anyhow!("Alert webhook timeout for {}", payload.dataset))?
        .map_err(|e| anyhow!("Failed to send alert for {}: {}", payload.dataset, e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Alert webhook returned status {} for {}",
                response.status(),
                payload.dataset
            ));
        }

        info!(
            "Alert sent successfully for {}: {:?}",
            payload.dataset, payload.alert_type
        );
        Ok(())
    }
}

#[async_trait]
impl SyncNotifier for AlertService {
    async fn on_sync_success(&self, snapshot: &str, dataset: &str, duration: Duration) -> Result<()> {
        if !self.alert_on_success {
            debug!("Success alerts disabled, not reporting {}", snapshot);
            return Ok(());
        }

        self.send_immediate_alert(
            AlertType::Replication,
            AlertSeverity::Info,
            dataset,
            Some(snapshot),
            format!("Snapshot {} replicated successfully", snapshot),
            Some(json!({ "duration_seconds": duration.as_secs_f64() })),
        )
        .await
    }

    async fn on_sync_failure(&self, snapshot: &str, dataset: &str, error: &str) -> Result<()> {
        self.send_immediate_alert(
            AlertType::Replication,
            AlertSeverity::Critical,
            dataset,
            Some(snapshot),
            format!("Replication of snapshot {} failed", snapshot),
            Some(json!({ "error": error })),
        )
        .await
    }
}
