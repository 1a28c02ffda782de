// Common types and utilities for API handlers

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use serde::Serialize;

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

// Helper type for API responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// Work that continues in the background answers 202
pub type AcceptedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub fn error_response(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(ApiResponse::error(message.to_string())))
}

pub fn accepted<T>(data: T, message: impl Into<String>) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(data).with_message(message)),
    )
}
