//! Health check handler

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::web::AppState;

/// Basic liveness plus a check of the channel store
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let storage = match state.channels.list_channels().await {
        Ok(channels) => json!({"status": "connected", "channels": channels.len()}),
        Err(e) => json!({"status": "error", "error": e.to_string()}),
    };
    let healthy = storage["status"] == "connected";

    Json(json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "storage": storage,
            "mirrors": state.registry.len(),
            "refresh_running": state.refresh.state().is_running().await,
        }
    }))
}
