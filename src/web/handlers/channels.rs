//! Channel list, playlist and channel sync handlers

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    errors::{AppResult, SourceError},
    models::Channel,
    proxy::m3u::{self, M3U_CONTENT_TYPE},
    web::{ApiResponse, AppState},
};

pub async fn list_channels(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Channel>>> {
    let channels = state.channels.list_channels().await?;
    Ok(ApiResponse::success(channels))
}

/// M3U playlist of every channel with an HLS stream
pub async fn playlist(State(state): State<AppState>) -> AppResult<Response> {
    let channels = state.channels.list_channels().await?;
    let body = m3u::render(&channels, &state.config.web.base_url);

    Ok((
        [
            (header::CONTENT_TYPE, M3U_CONTENT_TYPE),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"playlist.m3u\"",
            ),
        ],
        body,
    )
        .into_response())
}

/// Pull the channel list from upstream and replace the stored set
pub async fn sync_channels(State(state): State<AppState>) -> AppResult<ApiResponse<Value>> {
    let sync = state.channel_sync.as_ref().ok_or_else(|| {
        SourceError::invalid_config("upstream", "channel sync is not configured")
    })?;

    let stored = sync.sync().await?;
    info!("Channel sync stored {} channels", stored);

    Ok(ApiResponse::success(json!({ "channels": stored })))
}
