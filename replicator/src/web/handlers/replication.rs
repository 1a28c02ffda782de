// Replication status and manual trigger endpoints

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::common::{accepted, error_response, AcceptedResult, ApiResponse, ApiResult};
use crate::errors::ReplicationError;
use crate::web::{AppState, PendingSends, ReplicationStatus};
use crate::zfs::Snapshot;

/// Liveness probe
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Dataset pair and in-memory replication state; never touches zfs or ssh
pub async fn get_status(State(state): State<AppState>) -> ApiResult<ReplicationStatus> {
    let scheduler = &state.scheduler;

    Ok(Json(ApiResponse::success(ReplicationStatus {
        dataset: scheduler.dataset().to_string(),
        remote_host: state.config.ssh.remote_host.clone(),
        remote_dataset: scheduler.remote_dataset().to_string(),
        pending_sends: scheduler.pending_send_count(),
        pending_snapshot_names: scheduler.pending_sends(),
        send_in_progress: scheduler.is_send_in_progress(),
        accepting_work: scheduler.is_accepting(),
    })))
}

/// List local snapshots of the replicated dataset
pub async fn list_snapshots(State(state): State<AppState>) -> ApiResult<Vec<Snapshot>> {
    match state.scheduler.list_snapshots().await {
        Ok(snapshots) => Ok(Json(ApiResponse::success(snapshots))),
        Err(e) => {
            error!("Failed to list snapshots: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

pub async fn get_pending_sends(State(state): State<AppState>) -> ApiResult<PendingSends> {
    Ok(Json(ApiResponse::success(PendingSends {
        count: state.scheduler.pending_send_count(),
        snapshots: state.scheduler.pending_sends(),
    })))
}

/// Start a snapshot run in the background
pub async fn trigger_snapshot(State(state): State<AppState>) -> AcceptedResult<Value> {
    info!("Manual snapshot requested");

    match state.scheduler.trigger_snapshot_now() {
        Ok(()) => Ok(accepted(
            json!({ "status": "started", "dataset": state.scheduler.dataset() }),
            "Snapshot started",
        )),
        Err(e) => {
            warn!("Manual snapshot rejected: {}", e);
            Err(error_response(replication_error_status(&e), e))
        }
    }
}

/// Start scrubs on all pools in the background
pub async fn trigger_scrub(State(state): State<AppState>) -> AcceptedResult<Value> {
    info!("Manual scrub requested");
    state.scheduler.trigger_scrub_now();

    Ok(accepted(json!({ "status": "started" }), "Scrub started"))
}

/// Drain the pending queue and report what is left
pub async fn trigger_retry(State(state): State<AppState>) -> ApiResult<Value> {
    info!("Manual retry requested");

    match state.scheduler.retry_pending_sends().await {
        Ok(()) => Ok(Json(
            ApiResponse::success(json!({ "remaining": 0 }))
                .with_message("All pending snapshots sent"),
        )),
        Err(e) => {
            warn!("Manual retry did not complete: {}", e);
            Err(error_response(replication_error_status(&e), e))
        }
    }
}

fn replication_error_status(err: &ReplicationError) -> StatusCode {
    match err {
        ReplicationError::AlreadyInProgress => StatusCode::CONFLICT,
        ReplicationError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        ReplicationError::PendingRemaining { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_is_distinct_from_failure() {
        assert_eq!(
            replication_error_status(&ReplicationError::AlreadyInProgress),
            StatusCode::CONFLICT
        );
        assert_eq!(
            replication_error_status(&ReplicationError::ShuttingDown),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            replication_error_status(&ReplicationError::PendingRemaining { remaining: 1 }),
            StatusCode::BAD_GATEWAY
        );
    }
}
