//! Channel list synchronisation from the upstream mirrors

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::{AppResult, SourceError};
use crate::ingestor::normalizer::Normalizer;
use crate::repositories::ChannelStore;
use crate::utils::url::join_url;

use super::auth::Authenticator;
use super::mirrors::MirrorRegistry;
use super::transport::{MirrorTransport, TransportResponse};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub tenant_id: String,
}

pub struct ChannelSync {
    transport: Arc<dyn MirrorTransport>,
    registry: MirrorRegistry,
    channel_list_path: String,
    authenticator: Arc<dyn Authenticator>,
    credentials: Option<Credentials>,
    normalizer: Arc<Normalizer>,
    store: Arc<dyn ChannelStore>,
}

impl ChannelSync {
    pub fn new(
        transport: Arc<dyn MirrorTransport>,
        registry: MirrorRegistry,
        channel_list_path: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
        credentials: Option<Credentials>,
        normalizer: Arc<Normalizer>,
        store: Arc<dyn ChannelStore>,
    ) -> Self {
        Self {
            transport,
            registry,
            channel_list_path: channel_list_path.into(),
            authenticator,
            credentials,
            normalizer,
            store,
        }
    }

    /// Log in, download the channel list from the first mirror that answers
    /// and replace the stored channel set. Returns the number of channels
    /// stored.
    pub async fn sync(&self) -> AppResult<usize> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SourceError::invalid_config("upstream.username", "channel sync requires credentials")
        })?;

        let token = self
            .authenticator
            .login(
                &credentials.username,
                &credentials.password,
                &credentials.tenant_id,
            )
            .await?;

        let raw = self.fetch_channel_list(&token).await?;
        let fetched = raw.len();
        let channels = self.normalizer.normalize_channels(raw);
        if channels.is_empty() {
            return Err(SourceError::parse_error("channel list", "no usable channels").into());
        }

        let stored = self.store.replace_channels(channels).await?;
        info!(
            "Channel sync stored {} channels ({} received upstream)",
            stored, fetched
        );
        Ok(stored)
    }

    async fn fetch_channel_list(&self, token: &str) -> Result<Vec<Value>, SourceError> {
        let mut last_error = String::from("no mirrors configured");

        for mirror in self.registry.shuffled() {
            let url = join_url(&mirror, &self.channel_list_path);
            debug!("Requesting channel list from {}", url);

            let response = match self.transport.get(&url, Some(token)).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Channel list request to {} failed: {}", mirror, e);
                    last_error = e.to_string();
                    continue;
                }
            };

            if !response.is_success() {
                warn!(
                    "Channel list request to {} returned HTTP {}",
                    mirror, response.status
                );
                last_error = format!("HTTP {}", response.status);
                continue;
            }

            // Mirrors share one session backend, so an error envelope here
            // is final.
            return parse_channel_list(&response);
        }

        Err(SourceError::AllMirrorsFailed {
            mirrors: self.registry.len(),
            last_error,
        })
    }
}

fn parse_channel_list(response: &TransportResponse) -> Result<Vec<Value>, SourceError> {
    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| SourceError::parse_error("channel list", e.to_string()))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if map.contains_key("status") && map.contains_key("error") {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("upstream error")
                    .to_string();
                let status = map
                    .get("status")
                    .and_then(Value::as_u64)
                    .unwrap_or_default() as u16;
                return Err(SourceError::Http { status, message });
            }
            match map.remove("data") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(SourceError::parse_error(
                    "channel list",
                    "expected an array of channels",
                )),
            }
        }
        _ => Err(SourceError::parse_error(
            "channel list",
            "expected an array of channels",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::repositories::MemoryStore;
    use crate::sources::testing::{ScriptedReply, ScriptedTransport, StaticAuthenticator};
    use serde_json::json;

    const A: &str = "https://a.example";
    const B: &str = "https://b.example";
    const PATH: &str = "/sb/channel/all?vf=dash&visibilityRights=PREVIEW";

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            username: "user".into(),
            password: "secret".into(),
            tenant_id: "1".into(),
        })
    }

    fn sync_with(
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryStore>,
        credentials: Option<Credentials>,
    ) -> ChannelSync {
        ChannelSync::new(
            transport,
            MirrorRegistry::new([A, B]),
            PATH,
            Arc::new(StaticAuthenticator::new("session-123")),
            credentials,
            Arc::new(Normalizer::new().unwrap()),
            store,
        )
    }

    #[tokio::test]
    async fn test_sync_fails_over_and_stores_normalized_channels() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(A, ScriptedReply::Status(502))
                .route(
                    B,
                    ScriptedReply::Json(json!({"data": [
                        {"id": 1, "number": 1, "name": "Uno - Support TV", "logoUrl": "/sb/image/1"},
                        {"id": 1032, "number": 2, "name": "Oculto"}
                    ]})),
                ),
        );
        let store = Arc::new(MemoryStore::new());
        let sync = sync_with(transport.clone(), store.clone(), credentials());

        assert_eq!(sync.sync().await.unwrap(), 1);

        let stored = store.list_channels().await.unwrap();
        assert_eq!(stored[0].name.as_deref(), Some("Uno"));
        assert_eq!(stored[0].logo_url.as_deref(), Some("/image/1"));
        assert!(transport
            .session_tokens()
            .iter()
            .all(|t| t.as_deref() == Some("session-123")));
    }

    #[tokio::test]
    async fn test_error_envelope_is_rejected() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(
                    A,
                    ScriptedReply::Json(
                        json!({"status": 401, "error": "Unauthorized", "message": "bad session"}),
                    ),
                )
                .route(
                    B,
                    ScriptedReply::Json(
                        json!({"status": 401, "error": "Unauthorized", "message": "bad session"}),
                    ),
                ),
        );
        let store = Arc::new(MemoryStore::new());
        let result = sync_with(transport, store.clone(), credentials()).sync().await;

        assert!(matches!(
            result,
            Err(AppError::Source(SourceError::Http { status: 401, .. }))
        ));
        assert!(store.list_channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_requires_credentials() {
        let transport = Arc::new(ScriptedTransport::new());
        let result = sync_with(transport.clone(), Arc::new(MemoryStore::new()), None)
            .sync()
            .await;
        assert!(matches!(
            result,
            Err(AppError::Source(SourceError::InvalidConfig { .. }))
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_mirrors_down() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(A, ScriptedReply::Timeout)
                .route(B, ScriptedReply::Status(503)),
        );
        let result = sync_with(transport, Arc::new(MemoryStore::new()), credentials())
            .sync()
            .await;
        assert!(matches!(
            result,
            Err(AppError::Source(SourceError::AllMirrorsFailed { mirrors: 2, .. }))
        ));
    }
}
