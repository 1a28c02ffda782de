use super::Config;
use crate::constants::defaults;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_path: String) -> Result<Self> {
        let config = Self::load_configuration(&config_path).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    /// Path from `REPLICATOR_CONFIG`, falling back to `config/main.toml`
    pub fn default_path() -> String {
        std::env::var(defaults::CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| defaults::CONFIG_PATH.to_string())
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_path: &str) -> Result<Config> {
        let content = fs::read_to_string(config_path)
            .await
            .map_err(|e| anyhow!("Failed to read config {}: {}", config_path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config {}: {}", config_path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config {}: {}", config_path, e))?;

        info!(
            "Loaded config: dataset {} -> {}@{}:{}",
            config.zfs.dataset, config.ssh.remote_user, config.ssh.remote_host, config.ssh.remote_dataset
        );

        Ok(config)
    }
}
