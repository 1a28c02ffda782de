// File: replicator/src/config/mod.rs
pub mod manager;
use serde::{Deserialize, Serialize};
use std::path::Path;
pub use manager::ConfigManager;

use crate::constants::{defaults, snapshots, transport};
use crate::errors::ConfigError;
use crate::scheduler::cron::validate_6_field_cron;
use crate::validation::validate_dataset_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    pub zfs: ZfsConfig,
    pub ssh: SshConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZfsConfig {
    pub dataset: String,
    // Empty string disables compressed sends
    #[serde(default = "default_send_compression")]
    pub send_compression: String,
    #[serde(default = "default_true")]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub remote_host: String,
    pub remote_user: String,
    pub private_key: String,
    pub remote_dataset: String,
    #[serde(default = "default_mbuffer_size")]
    pub mbuffer_size: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_snapshot_cron")]
    pub snapshot_cron: String,
    #[serde(default = "default_scrub_cron")]
    pub scrub_cron: String,
    #[serde(default = "default_retry_cron")]
    pub retry_cron: String,
    #[serde(default = "default_retention_count")]
    pub retention_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_true")]
    pub alert_on_success: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            snapshot_cron: default_snapshot_cron(),
            scrub_cron: default_scrub_cron(),
            retry_cron: default_retry_cron(),
            retention_count: default_retention_count(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            alert_on_success: true,
        }
    }
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_shutdown_grace() -> u64 {
    defaults::SHUTDOWN_GRACE_SECONDS
}

fn default_send_compression() -> String {
    defaults::SEND_COMPRESSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_mbuffer_size() -> String {
    transport::DEFAULT_MBUFFER_SIZE.to_string()
}

fn default_connect_timeout() -> u64 {
    defaults::CONNECT_TIMEOUT_SECONDS
}

fn default_snapshot_cron() -> String {
    defaults::SNAPSHOT_CRON.to_string()
}

fn default_scrub_cron() -> String {
    defaults::SCRUB_CRON.to_string()
}

fn default_retry_cron() -> String {
    defaults::RETRY_CRON.to_string()
}

fn default_retention_count() -> usize {
    snapshots::DEFAULT_RETENTION_COUNT
}

impl Config {
    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                reason: "port must be between 1 and 65535".to_string(),
            });
        }

        require("zfs.dataset", &self.zfs.dataset)?;
        validate_dataset_name(&self.zfs.dataset).map_err(|reason| ConfigError::InvalidValue {
            field: "zfs.dataset".to_string(),
            reason,
        })?;

        require("ssh.remote_host", &self.ssh.remote_host)?;
        require("ssh.remote_user", &self.ssh.remote_user)?;
        require("ssh.private_key", &self.ssh.private_key)?;
        require("ssh.remote_dataset", &self.ssh.remote_dataset)?;
        validate_dataset_name(&self.ssh.remote_dataset).map_err(|reason| {
            ConfigError::InvalidValue {
                field: "ssh.remote_dataset".to_string(),
                reason,
            }
        })?;

        let key_path = Path::new(&self.ssh.private_key);
        if !key_path.is_absolute() || self.ssh.private_key.contains("..") {
            return Err(ConfigError::InvalidValue {
                field: "ssh.private_key".to_string(),
                reason: "must be an absolute path without '..'".to_string(),
            });
        }

        if self.ssh.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ssh.connect_timeout_seconds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.schedule.retention_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "schedule.retention_count".to_string(),
                reason: "must keep at least one snapshot".to_string(),
            });
        }

        for (field, expression) in [
            ("schedule.snapshot_cron", &self.schedule.snapshot_cron),
            ("schedule.scrub_cron", &self.schedule.scrub_cron),
            ("schedule.retry_cron", &self.schedule.retry_cron),
        ] {
            validate_6_field_cron(expression).map_err(|e| ConfigError::InvalidValue {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}
