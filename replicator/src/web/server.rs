// File: replicator/src/web/server.rs
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::web::{handlers, AppState};

/// Serve the API until `shutdown` resolves
pub async fn start_web_server<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Web server stopped");
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // === REPLICATION ROUTES ===
        .route("/api/status", get(handlers::get_status))
        .route("/api/snapshots", get(handlers::list_snapshots))
        .route("/api/pending", get(handlers::get_pending_sends))
        .route("/api/trigger/snapshot", post(handlers::trigger_snapshot))
        .route("/api/trigger/scrub", post(handlers::trigger_scrub))
        .route("/api/trigger/retry", post(handlers::trigger_retry))
        // === RESTORE ROUTES ===
        .route("/api/restore", post(handlers::start_restore))
        .route("/api/restore/sources", get(handlers::list_restore_sources))
        .route("/api/restore/jobs", get(handlers::list_restore_jobs))
        .route("/api/restore/jobs/{job_id}", get(handlers::get_restore_job))
        .route(
            "/api/restore/jobs/{job_id}/confirm",
            post(handlers::confirm_restore),
        )
        // Add middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
