// Restore job endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::common::{accepted, error_response, AcceptedResult, ApiResponse, ApiResult};
use crate::errors::RestoreError;
use crate::restore::RestoreJob;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRestoreRequest {
    #[serde(default)]
    pub source_dataset: Option<String>,
    pub snapshot_name: String,
    pub target_dataset: String,
}

pub async fn start_restore(
    State(state): State<AppState>,
    Json(request): Json<StartRestoreRequest>,
) -> AcceptedResult<RestoreJob> {
    info!(
        "Restore requested: {} -> {}",
        request.snapshot_name, request.target_dataset
    );

    match state
        .restore_manager
        .start_restore(
            request.source_dataset,
            request.snapshot_name,
            request.target_dataset,
        )
        .await
    {
        Ok(job) => {
            let message = format!("Restore job {} started", job.id);
            Ok(accepted(job, message))
        }
        Err(e) => {
            warn!("Restore request rejected: {}", e);
            Err(error_response(restore_error_status(&e), e))
        }
    }
}

pub async fn list_restore_jobs(State(state): State<AppState>) -> ApiResult<Vec<RestoreJob>> {
    let mut jobs = state.restore_manager.list_jobs().await;
    jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(Json(ApiResponse::success(jobs)))
}

pub async fn get_restore_job(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<RestoreJob> {
    match state.restore_manager.get_job(&job_id).await {
        Some(job) => Ok(Json(ApiResponse::success(job))),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            RestoreError::JobNotFound { job_id },
        )),
    }
}

/// Confirm a restore that would overwrite uncommitted data
pub async fn confirm_restore(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<RestoreJob> {
    info!("Destructive restore confirmation requested for {}", job_id);

    match state.restore_manager.confirm_destructive_restore(&job_id).await {
        Ok(job) => Ok(Json(
            ApiResponse::success(job).with_message("Restore confirmed, restarting from safety check"),
        )),
        Err(e) => {
            warn!("Restore confirmation rejected for {}: {}", job_id, e);
            Err(error_response(restore_error_status(&e), e))
        }
    }
}

/// Datasets on the backup host that can be restored from
pub async fn list_restore_sources(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    match state.transport.list_remote_datasets().await {
        Ok(datasets) => Ok(Json(ApiResponse::success(datasets))),
        Err(e) => {
            error!("Failed to list remote datasets: {}", e);
            Err(error_response(StatusCode::BAD_GATEWAY, e))
        }
    }
}

fn restore_error_status(err: &RestoreError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_policy_rejection() {
        StatusCode::CONFLICT
    } else if matches!(err, RestoreError::InvalidRequest { .. }) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
