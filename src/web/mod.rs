//! Web layer module
//!
//! HTTP surface of epg-relay: guide documents, the M3U playlist, the
//! channel list, the login pass-through and refresh control.
//!
//! Handlers stay thin. Reading goes through the stores and `proxy`
//! encoders, writing goes through [`RefreshService`] and [`ChannelSync`].

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Config,
    ingestor::{Normalizer, RefreshService},
    repositories::{ChannelStore, GuideSink},
    sources::{Authenticator, ChannelSync, MirrorRegistry},
};

pub mod handlers;
pub mod responses;

pub use responses::{handle_error, ApiResponse};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub channels: Arc<dyn ChannelStore>,
    pub guides: Arc<dyn GuideSink>,
    pub normalizer: Arc<Normalizer>,
    pub registry: MirrorRegistry,
    pub refresh: RefreshService,
    pub channel_sync: Option<Arc<ChannelSync>>,
    pub authenticator: Arc<dyn Authenticator>,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Guide documents
        .route("/epg/all", get(handlers::epg::all_guides))
        .route("/epg/:channel_id", get(handlers::epg::channel_guide))
        .route("/playlist.m3u", get(handlers::channels::playlist))
        // JSON API
        .route("/api/channels", get(handlers::channels::list_channels))
        .route("/api/auth", post(handlers::auth::login))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(handlers::refresh::trigger_refresh))
        .route("/refresh/status", get(handlers::refresh::refresh_status))
        .route("/channels/sync", post(handlers::channels::sync_channels))
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr =
            format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        let app = create_router(state);

        Ok(Self { app, addr })
    }

    pub async fn serve(self) -> Result<()> {
        info!("Web server listening on http://{}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}
