//! HTTP response types and error mapping
//!
//! Every JSON API endpoint answers with [`ApiResponse`]; failures are mapped
//! from [`AppError`] to a status code in [`handle_error`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::{AppError, RefreshError, SourceError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human readable detail for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

/// Status code and short error label for an application error
pub fn error_status(error: &AppError) -> (StatusCode, &'static str) {
    match error {
        AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "Invalid request"),
        AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "Not found"),
        AppError::Refresh(RefreshError::AlreadyRunning) => {
            (StatusCode::CONFLICT, "Refresh already running")
        }
        AppError::Refresh(RefreshError::NoChannels) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "No channels to refresh")
        }
        AppError::Refresh(RefreshError::ChannelList(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "Channel list unavailable")
        }
        AppError::Source(SourceError::AuthenticationFailed { .. }) => {
            (StatusCode::UNAUTHORIZED, "Authentication failed")
        }
        AppError::Source(SourceError::InvalidConfig { .. }) => {
            (StatusCode::BAD_REQUEST, "Upstream not configured")
        }
        AppError::Source(_) | AppError::Http(_) => {
            (StatusCode::BAD_GATEWAY, "Upstream request failed")
        }
        AppError::Database(_) | AppError::Repository(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Data access failed")
        }
        AppError::Configuration { .. } | AppError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Convert AppError to an HTTP response with a `{success: false}` body
pub fn handle_error(error: AppError) -> Response {
    let (status, label) = error_status(&error);
    if status.is_server_error() {
        error!("Request failed: {}", error);
    }

    (status, Json(ApiResponse::error(label, error.to_string()))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}
