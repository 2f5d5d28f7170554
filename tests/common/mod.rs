#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use epg_relay::{
    config::Config,
    ingestor::{EpgDispatcher, Normalizer, RefreshService, RefreshStateManager},
    models::Channel,
    repositories::{ChannelStore, GuideSink, MemoryStore},
    sources::{
        testing::{ScriptedTransport, StaticAuthenticator},
        FetchPolicy, MirrorRegistry, ResilientFetcher,
    },
    web::AppState,
};

pub const MIRROR_A: &str = "https://a.example";
pub const MIRROR_B: &str = "https://b.example";
pub const MIRROR_C: &str = "https://c.example";

pub const EPG_TEMPLATE: &str = "/epg/{channel_id}?tenantId={tenant_id}";

pub fn mirrors() -> MirrorRegistry {
    MirrorRegistry::new([MIRROR_A, MIRROR_B, MIRROR_C])
}

pub fn quick_policy() -> FetchPolicy {
    FetchPolicy {
        max_attempts_per_mirror: 5,
        global_attempt_ceiling: 15,
        backoff_base: Duration::from_millis(1),
    }
}

pub fn channels(ids: &[i64]) -> Vec<Channel> {
    ids.iter()
        .map(|id| {
            serde_json::from_value(json!({
                "id": id,
                "number": id,
                "name": format!("Canal {}", id),
                "logoUrl": format!("/image/{}", id),
                "contentUrls": {"hlsFP": format!("https://cdn.example/{}.m3u8", id)}
            }))
            .unwrap()
        })
        .collect()
}

pub fn news() -> Value {
    json!([{
        "id": 1,
        "title": "News",
        "startTime": "2024-01-01T00:00:00Z",
        "endTime": "2024-01-01T01:00:00Z",
        "imageUrl": "/image/program/1",
        "pgRating": {"name": "ATP"}
    }])
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub store: MemoryStore,
    pub normalizer: Arc<Normalizer>,
    pub registry: MirrorRegistry,
    pub service: RefreshService,
}

impl Harness {
    pub fn new(transport: ScriptedTransport, store: MemoryStore) -> Self {
        Self::with_sink(transport, store.clone(), Arc::new(store))
    }

    /// Same wiring with a custom guide sink in front of the store
    pub fn with_sink(
        transport: ScriptedTransport,
        store: MemoryStore,
        sink: Arc<dyn GuideSink>,
    ) -> Self {
        let transport = Arc::new(transport);
        let normalizer = Arc::new(Normalizer::new().unwrap());
        let registry = mirrors();

        let fetcher = ResilientFetcher::new(
            registry.clone(),
            transport.clone(),
            normalizer.clone(),
            quick_policy(),
        );
        let dispatcher =
            EpgDispatcher::new(fetcher, normalizer.clone(), sink, EPG_TEMPLATE).with_workers(2);
        let channel_store: Arc<dyn ChannelStore> = Arc::new(store.clone());
        let service = RefreshService::new(channel_store, dispatcher, RefreshStateManager::new());

        Self {
            transport,
            store,
            normalizer,
            registry,
            service,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            channels: Arc::new(self.store.clone()),
            guides: Arc::new(self.store.clone()),
            normalizer: self.normalizer.clone(),
            registry: self.registry.clone(),
            refresh: self.service.clone(),
            channel_sync: None,
            authenticator: Arc::new(StaticAuthenticator::new("session-123")),
        }
    }
}
