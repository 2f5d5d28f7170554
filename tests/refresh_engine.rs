mod common;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use common::*;
use epg_relay::{
    errors::{AppError, RefreshError, RepositoryError, RepositoryResult},
    ingestor::RefreshTrigger,
    models::{ChannelGuide, GuideSource},
    repositories::{GuideSink, MemoryStore},
    sources::{
        testing::{ScriptedReply, ScriptedTransport, StaticAuthenticator},
        ChannelSync, Credentials,
    },
};

#[tokio::test]
async fn every_channel_ends_with_a_non_empty_guide() {
    let transport = ScriptedTransport::new()
        .route(MIRROR_A, ScriptedReply::Json(news()))
        .route(MIRROR_B, ScriptedReply::Status(500))
        .route(MIRROR_C, ScriptedReply::Timeout)
        .route_path(MIRROR_A, "/epg/4?", ScriptedReply::Status(500));
    let store = MemoryStore::with_channels(channels(&[1, 2, 3, 4, 5, 6]));
    let harness = Harness::new(transport, store);

    let report = harness
        .service
        .refresh("1", RefreshTrigger::Manual)
        .await
        .unwrap();

    let guides = harness.store.read_all().await.unwrap();
    assert_eq!(guides.len(), 6);
    assert!(guides.values().all(|g| !g.programs.is_empty()));

    assert_eq!(report.total_channels, 6);
    assert_eq!(report.live_channels, 5);
    assert_eq!(report.placeholder_channels, 1);
    assert_eq!(report.source_stats[MIRROR_A], 5);
    assert_eq!(guides[&4].source, GuideSource::Placeholder);
}

#[tokio::test]
async fn all_mirrors_failing_yields_a_placeholder_airing_now() {
    let transport = ScriptedTransport::new()
        .route(MIRROR_A, ScriptedReply::Status(500))
        .route(MIRROR_B, ScriptedReply::Status(500))
        .route(MIRROR_C, ScriptedReply::Status(500));
    let harness = Harness::new(transport, MemoryStore::with_channels(channels(&[9])));

    let report = harness
        .service
        .refresh("1", RefreshTrigger::Manual)
        .await
        .unwrap();

    let guide = harness.store.get(9).await.unwrap().unwrap();
    assert_eq!(guide.source, GuideSource::Placeholder);
    assert_eq!(guide.programs.len(), 1);

    let placeholder = &guide.programs[0];
    assert!(placeholder.title.starts_with("Sin datos para"));
    assert!(placeholder.is_placeholder());
    let now = Utc::now();
    assert!(placeholder.is_airing_at(now));
    assert!(placeholder.is_airing_at(now + ChronoDuration::days(365 * 50)));

    // One attempt per mirror, then full per-mirror budgets until the ceiling:
    // 3 + 5 + 5 + 2
    assert_eq!(report.outcomes[0].attempts, 15);
    assert_eq!(harness.transport.calls().len(), 15);
    let mut per_mirror: Vec<usize> = [MIRROR_A, MIRROR_B, MIRROR_C]
        .iter()
        .map(|m| harness.transport.calls_to(m))
        .collect();
    per_mirror.sort_unstable();
    assert_eq!(per_mirror, vec![3, 6, 6]);
    assert!(report.source_stats.values().all(|count| *count == 0));
    assert_eq!(report.source_stats.len(), 3);
}

#[tokio::test]
async fn single_working_mirror_is_recorded_as_source() {
    let transport = ScriptedTransport::new()
        .route(MIRROR_A, ScriptedReply::Status(503))
        .route(MIRROR_B, ScriptedReply::Json(serde_json::json!([])))
        .route(MIRROR_C, ScriptedReply::Json(news()));
    let harness = Harness::new(transport, MemoryStore::with_channels(channels(&[1])));

    let report = harness
        .service
        .refresh("1", RefreshTrigger::Manual)
        .await
        .unwrap();

    let guide = harness.store.get(1).await.unwrap().unwrap();
    assert_eq!(guide.source, GuideSource::Mirror(MIRROR_C.to_string()));
    assert_eq!(guide.programs.len(), 1);
    assert_eq!(guide.programs[0].title, "News");

    let expected: BTreeMap<String, u64> = [(MIRROR_A, 0), (MIRROR_B, 0), (MIRROR_C, 1)]
        .into_iter()
        .map(|(m, n)| (m.to_string(), n))
        .collect();
    assert_eq!(report.source_stats, expected);
    assert_eq!(report.outcomes[0].epg_source.as_deref(), Some(MIRROR_C));
}

#[tokio::test]
async fn crashed_worker_falls_back_to_placeholders() {
    let transport = ScriptedTransport::new()
        .route(MIRROR_A, ScriptedReply::Json(news()))
        .route(MIRROR_B, ScriptedReply::Json(news()))
        .route(MIRROR_C, ScriptedReply::Json(news()))
        .route_path(MIRROR_A, "/epg/2?", ScriptedReply::Panic)
        .route_path(MIRROR_B, "/epg/2?", ScriptedReply::Panic)
        .route_path(MIRROR_C, "/epg/2?", ScriptedReply::Panic);
    // Two workers: batches [1, 2] and [3, 4]
    let harness = Harness::new(transport, MemoryStore::with_channels(channels(&[1, 2, 3, 4])));

    let report = harness
        .service
        .refresh("1", RefreshTrigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.failed_workers, 1);
    assert_eq!(report.live_channels, 3);
    assert_eq!(report.placeholder_channels, 1);

    let crashed = report.outcomes.iter().find(|o| o.channel_id == 2).unwrap();
    assert_eq!(crashed.epg_source, None);
    assert!(crashed.persisted);
    assert!(crashed
        .error
        .as_deref()
        .unwrap()
        .starts_with("worker failed"));

    let guides = harness.store.read_all().await.unwrap();
    assert_eq!(guides.len(), 4);
    assert!(guides[&2].source.is_placeholder());
    assert!(!guides[&1].source.is_placeholder());
}

/// Guide sink that refuses writes for one channel
struct RejectingSink {
    inner: MemoryStore,
    rejected: i64,
}

#[async_trait]
impl GuideSink for RejectingSink {
    async fn upsert(&self, guide: &ChannelGuide) -> RepositoryResult<()> {
        if guide.channel_id == self.rejected {
            return Err(RepositoryError::query_failed("upsert", "disk full"));
        }
        self.inner.upsert(guide).await
    }

    async fn read_all(&self) -> RepositoryResult<BTreeMap<i64, ChannelGuide>> {
        self.inner.read_all().await
    }

    async fn get(&self, channel_id: i64) -> RepositoryResult<Option<ChannelGuide>> {
        self.inner.get(channel_id).await
    }
}

#[tokio::test]
async fn persistence_failure_is_counted_and_keeps_previous_guide() {
    let store = MemoryStore::with_channels(channels(&[1, 2]));
    let harness_store = store.clone();
    let previous = ChannelGuide {
        channel_id: 2,
        programs: Vec::new(),
        source: GuideSource::Mirror("https://old.example".into()),
        updated_at: Utc::now() - ChronoDuration::hours(6),
    };
    store.upsert(&previous).await.unwrap();

    let transport = ScriptedTransport::new()
        .route(MIRROR_A, ScriptedReply::Json(news()))
        .route(MIRROR_B, ScriptedReply::Json(news()))
        .route(MIRROR_C, ScriptedReply::Json(news()));
    let sink = Arc::new(RejectingSink {
        inner: store.clone(),
        rejected: 2,
    });
    let harness = Harness::with_sink(transport, harness_store, sink);

    let report = harness
        .service
        .refresh("1", RefreshTrigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.persistence_failures, 1);
    assert_eq!(report.total_channels, 2);
    let failed = report.outcomes.iter().find(|o| o.channel_id == 2).unwrap();
    assert!(!failed.persisted);

    let kept = store.get(2).await.unwrap().unwrap();
    assert_eq!(kept, previous);
}

#[tokio::test]
async fn empty_channel_list_aborts_the_run() {
    let harness = Harness::new(ScriptedTransport::new(), MemoryStore::new());

    let result = harness.service.refresh("1", RefreshTrigger::Manual).await;
    assert!(matches!(
        result,
        Err(AppError::Refresh(RefreshError::NoChannels))
    ));
    assert!(harness.transport.calls().is_empty());

    let status = harness.service.state().status().await;
    assert!(!status.running);
    assert_eq!(status.last_error.as_deref(), Some("Refresh error: No channels to refresh"));
}

#[tokio::test]
async fn overlapping_runs_are_rejected() {
    let transport = ScriptedTransport::new().route(MIRROR_A, ScriptedReply::Json(news()));
    let harness = Harness::new(transport, MemoryStore::with_channels(channels(&[1])));

    let run = harness
        .service
        .begin("1", RefreshTrigger::Manual)
        .await
        .unwrap();
    let overlapping = harness.service.refresh("1", RefreshTrigger::Scheduled).await;
    assert!(matches!(
        overlapping,
        Err(AppError::Refresh(RefreshError::AlreadyRunning))
    ));

    let report = harness.service.complete(run).await.unwrap();
    assert_eq!(report.total_channels, 1);
    assert!(!harness.service.state().is_running().await);
}

#[tokio::test]
async fn sync_before_refresh_populates_channels() {
    let channel_list = serde_json::json!({"data": [
        {"id": 10, "number": 10, "name": "Diez - Support TV", "logoUrl": "/sb/image/10"},
        {"id": 1032, "number": 99, "name": "Canal interno"},
        {"id": 11, "number": 11, "name": "Once"}
    ]});
    let transport = ScriptedTransport::new()
        .route(MIRROR_A, ScriptedReply::Json(news()))
        .route(MIRROR_B, ScriptedReply::Json(news()))
        .route(MIRROR_C, ScriptedReply::Json(news()))
        .route_path(MIRROR_A, "/channels", ScriptedReply::Json(channel_list.clone()))
        .route_path(MIRROR_B, "/channels", ScriptedReply::Json(channel_list.clone()))
        .route_path(MIRROR_C, "/channels", ScriptedReply::Json(channel_list));
    let store = MemoryStore::new();
    let harness = Harness::new(transport, store.clone());

    let sync = Arc::new(ChannelSync::new(
        harness.transport.clone(),
        harness.registry.clone(),
        "/channels",
        Arc::new(StaticAuthenticator::new("session-123")),
        Some(Credentials {
            username: "user".into(),
            password: "secret".into(),
            tenant_id: "1".into(),
        }),
        harness.normalizer.clone(),
        Arc::new(store.clone()),
    ));
    let service = harness.service.clone().with_channel_sync(sync, true);

    let report = service.refresh("1", RefreshTrigger::Startup).await.unwrap();

    assert_eq!(report.total_channels, 2);
    assert_eq!(report.live_channels, 2);
    let guides = store.read_all().await.unwrap();
    assert_eq!(guides.keys().copied().collect::<Vec<_>>(), vec![10, 11]);
}
