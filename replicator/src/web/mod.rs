// File: replicator/src/web/mod.rs
pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::restore::RestoreManager;
use crate::scheduler::ReplicationScheduler;
use crate::transport::Transport;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scheduler: Arc<ReplicationScheduler>,
    pub restore_manager: Arc<RestoreManager>,
    // Used directly only to list restore sources
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        scheduler: Arc<ReplicationScheduler>,
        restore_manager: Arc<RestoreManager>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            scheduler,
            restore_manager,
            transport,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicationStatus {
    pub dataset: String,
    pub remote_host: String,
    pub remote_dataset: String,
    pub pending_sends: usize,
    pub pending_snapshot_names: Vec<String>,
    pub send_in_progress: bool,
    pub accepting_work: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingSends {
    pub count: usize,
    pub snapshots: Vec<String>,
}
