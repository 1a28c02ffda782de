// File: replicator/src/main.rs
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use replicator::commands::check_dependencies;
use replicator::constants::{restore, REQUIRED_COMMANDS};
use replicator::services::AlertService;
use replicator::web::{start_web_server, AppState};
use replicator::{
    ConfigManager, CronScheduler, ReplicationScheduler, RestoreManager, SshTransport, Transport,
    ZfsSnapshotStore, ZpoolScrubber,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("replicator=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting ZFS replicator");

    // Load configuration
    let config_manager = ConfigManager::new(ConfigManager::default_path()).await?;
    let config = config_manager.get_current_config();

    check_dependencies(REQUIRED_COMMANDS)?;
    info!("Required commands found: {}", REQUIRED_COMMANDS.join(", "));

    let store = Arc::new(ZfsSnapshotStore::new(&config.zfs));
    let transport = Arc::new(SshTransport::new(&config.ssh));
    let scrubber = Arc::new(ZpoolScrubber);

    let alert_service = Arc::new(AlertService::new(&config.alerts)?);
    if alert_service.is_enabled() {
        info!(
            "Alert service enabled with webhook: {}",
            alert_service.get_webhook_url()
        );

        // Test webhook connectivity on startup
        match alert_service.test_webhook().await {
            Ok(()) => info!("Alert webhook test successful!"),
            Err(e) => {
                error!("Alert webhook test failed: {}", e);
                warn!("Alerts may not work properly. Check your webhook URL and network connectivity.");
            }
        }
    } else {
        warn!("⚠️  ALERT SERVICE DISABLED ⚠️");
        warn!("No webhook URL configured under [alerts]");
        warn!("Set 'webhook_url = \"your-webhook-url\"' to enable alerts");
    }

    let scheduler = Arc::new(ReplicationScheduler::new(
        store.clone(),
        transport.clone(),
        scrubber,
        alert_service,
        config.ssh.remote_dataset.clone(),
        config.schedule.retention_count,
    ));
    info!(
        "Replication scheduler initialized: {} -> {}",
        config.zfs.dataset, config.ssh.remote_dataset
    );

    let restore_manager = Arc::new(RestoreManager::new(
        store,
        transport.clone(),
        config.ssh.remote_dataset.clone(),
    ));
    info!("Restore manager initialized");

    let cron = CronScheduler::new(scheduler.clone(), config.schedule.clone()).await?;
    cron.start().await?;

    // Evict finished restore jobs periodically
    let restore_manager_clone = restore_manager.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(restore::CLEANUP_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            let cleaned = restore_manager_clone.cleanup_finished_jobs().await;
            if cleaned > 0 {
                info!("Cleaned up {} finished restore jobs", cleaned);
            }
        }
    });

    let state = AppState::new(
        config.clone(),
        scheduler.clone(),
        restore_manager.clone(),
        transport.clone(),
    );

    info!("Starting web server on {}:{}", config.host, config.port);
    if let Err(e) = start_web_server(state, shutdown_signal()).await {
        error!("Web server failed: {}", e);
    }

    info!("Shutting down");
    scheduler.begin_shutdown();
    cron.shutdown().await;

    let grace = Duration::from_secs(config.shutdown_grace_seconds);
    let (sends_idle, restores_idle) = tokio::join!(
        scheduler.wait_for_idle(grace),
        restore_manager.wait_for_idle(grace)
    );
    if sends_idle {
        info!("No send in progress");
    } else {
        warn!("Exiting with a send still in progress");
    }
    if restores_idle {
        info!("No restore in progress");
    } else {
        warn!("Exiting with a restore still in progress");
    }

    if let Err(e) = transport.close().await {
        warn!("Failed to close SSH session: {}", e);
    }

    info!("Replicator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
