//! Refresh control handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    errors::AppResult,
    ingestor::{RefreshStatus, RefreshTrigger},
    web::{ApiResponse, AppState},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshQuery {
    pub tenant_id: Option<String>,
}

/// Start a refresh in the background. Answers 202 with the claimed run, or
/// 409 while another run holds the slot.
pub async fn trigger_refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = query
        .tenant_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| state.config.refresh.tenant_id.clone());

    let run = state
        .refresh
        .begin(&tenant_id, RefreshTrigger::Manual)
        .await?;
    let accepted = run.clone();

    let service = state.refresh.clone();
    tokio::spawn(async move {
        if let Ok(report) = service.complete(run).await {
            debug!(
                "Manual refresh {} finished with {} placeholder channels",
                report.run_id, report.placeholder_channels
            );
        }
    });

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(accepted))))
}

pub async fn refresh_status(State(state): State<AppState>) -> ApiResponse<RefreshStatus> {
    ApiResponse::success(state.refresh.state().status().await)
}
