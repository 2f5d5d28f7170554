//! Fans a refresh run out over a fixed number of concurrent batches
//!
//! Each batch owns a disjoint slice of the channel list and processes it
//! sequentially, so a run never has more than `W` requests in flight. Every
//! batch keeps its own tally; tallies are summed once all batches joined.

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::normalizer::Normalizer;
use crate::models::{
    AttemptOutcome, Channel, ChannelGuide, ChannelOutcome, FetchAttemptRecord, GuideSource,
    RunReport,
};
use crate::repositories::GuideSink;
use crate::sources::{EndpointTemplate, ResilientFetcher};

pub const MIN_WORKERS: usize = 2;
pub const MAX_WORKERS: usize = 8;

/// `clamp(available - 1, 2, 8)`
pub fn worker_count(available_parallelism: usize) -> usize {
    available_parallelism
        .saturating_sub(1)
        .clamp(MIN_WORKERS, MAX_WORKERS)
}

pub fn default_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    worker_count(available)
}

/// Split `items` into at most `workers` contiguous batches whose sizes differ
/// by at most one. Empty input yields no batches.
pub fn partition<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1).min(items.len());
    if workers == 0 {
        return Vec::new();
    }

    let base = items.len() / workers;
    let extra = items.len() % workers;
    let mut batches = Vec::with_capacity(workers);
    let mut offset = 0;
    for i in 0..workers {
        let size = base + usize::from(i < extra);
        batches.push(items[offset..offset + size].to_vec());
        offset += size;
    }
    batches
}

/// Per-batch statistics, merged by summation
#[derive(Debug, Default, Clone)]
pub struct BatchTally {
    pub source_stats: HashMap<String, u64>,
    pub live_channels: usize,
    pub placeholder_channels: usize,
    pub persistence_failures: usize,
    pub total_attempts: u64,
    pub attempt_outcomes: BTreeMap<AttemptOutcome, u64>,
    pub outcomes: Vec<ChannelOutcome>,
}

impl BatchTally {
    pub fn record(&mut self, outcome: ChannelOutcome, attempts: &[FetchAttemptRecord]) {
        self.total_attempts += attempts.len() as u64;
        for attempt in attempts {
            *self.attempt_outcomes.entry(attempt.outcome).or_insert(0) += 1;
        }

        match &outcome.epg_source {
            Some(mirror) => {
                *self.source_stats.entry(mirror.clone()).or_insert(0) += 1;
                self.live_channels += 1;
            }
            None => self.placeholder_channels += 1,
        }
        if !outcome.persisted {
            self.persistence_failures += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn merge(&mut self, other: BatchTally) {
        for (mirror, count) in other.source_stats {
            *self.source_stats.entry(mirror).or_insert(0) += count;
        }
        for (outcome, count) in other.attempt_outcomes {
            *self.attempt_outcomes.entry(outcome).or_insert(0) += count;
        }
        self.live_channels += other.live_channels;
        self.placeholder_channels += other.placeholder_channels;
        self.persistence_failures += other.persistence_failures;
        self.total_attempts += other.total_attempts;
        self.outcomes.extend(other.outcomes);
    }
}

#[derive(Clone)]
pub struct EpgDispatcher {
    fetcher: ResilientFetcher,
    normalizer: Arc<Normalizer>,
    sink: Arc<dyn GuideSink>,
    endpoint_template: String,
    workers: usize,
    inter_channel_delay: Duration,
}

impl EpgDispatcher {
    pub fn new(
        fetcher: ResilientFetcher,
        normalizer: Arc<Normalizer>,
        sink: Arc<dyn GuideSink>,
        endpoint_template: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            normalizer,
            sink,
            endpoint_template: endpoint_template.into(),
            workers: default_worker_count(),
            inter_channel_delay: Duration::ZERO,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_inter_channel_delay(mut self, delay: Duration) -> Self {
        self.inter_channel_delay = delay;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Refresh every channel and return the run's statistics.
    ///
    /// Always produces one guide per channel: a worker that dies takes only
    /// its unfinished channels down with it, and those fall back to
    /// placeholders here.
    pub async fn run(&self, run_id: Uuid, tenant_id: &str, channels: Vec<Channel>) -> RunReport {
        let started_at = Utc::now();
        let endpoint = EndpointTemplate::new(self.endpoint_template.clone(), tenant_id);
        let batches = partition(&channels, self.workers);

        info!(
            "Refresh run {} for tenant {}: {} channels in {} batches",
            run_id,
            tenant_id,
            channels.len(),
            batches.len()
        );

        let mut workers = Vec::with_capacity(batches.len());
        let mut handles = Vec::with_capacity(batches.len());
        for (index, batch) in batches.into_iter().enumerate() {
            let tally = Arc::new(Mutex::new(BatchTally::default()));
            handles.push(tokio::spawn(self.clone().process_batch(
                index,
                batch.clone(),
                endpoint.clone(),
                tally.clone(),
            )));
            workers.push((index, batch, tally));
        }
        let results = join_all(handles).await;

        let mut total = BatchTally::default();
        let mut failed_workers = 0;
        for ((index, batch, tally), result) in workers.into_iter().zip(results) {
            let mut tally = take_tally(&tally);
            if let Err(e) = result {
                failed_workers += 1;
                error!(
                    "Refresh worker {} failed after {} of {} channels: {}",
                    index,
                    tally.outcomes.len(),
                    batch.len(),
                    e
                );
                self.fill_unfinished(&batch, &mut tally, &e.to_string()).await;
            }
            total.merge(tally);
        }

        total.outcomes.sort_by_key(|o| o.channel_id);

        let mut source_stats: BTreeMap<String, u64> = self
            .fetcher
            .registry()
            .mirrors()
            .iter()
            .map(|m| (m.clone(), 0))
            .collect();
        for (mirror, count) in total.source_stats {
            *source_stats.entry(mirror).or_insert(0) += count;
        }

        let report = RunReport {
            run_id,
            tenant_id: tenant_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            total_channels: channels.len(),
            live_channels: total.live_channels,
            placeholder_channels: total.placeholder_channels,
            persistence_failures: total.persistence_failures,
            failed_workers,
            total_attempts: total.total_attempts,
            source_stats,
            attempt_outcomes: total.attempt_outcomes,
            outcomes: total.outcomes,
        };

        info!(
            "Refresh run {} finished: {} channels, {} live, {} placeholder, {} persistence failures, {} attempts",
            run_id,
            report.total_channels,
            report.live_channels,
            report.placeholder_channels,
            report.persistence_failures,
            report.total_attempts
        );
        report
    }

    async fn process_batch(
        self,
        index: usize,
        channels: Vec<Channel>,
        endpoint: EndpointTemplate,
        tally: Arc<Mutex<BatchTally>>,
    ) {
        debug!("Worker {} starting with {} channels", index, channels.len());

        for (position, channel) in channels.iter().enumerate() {
            if position > 0 && !self.inter_channel_delay.is_zero() {
                tokio::time::sleep(self.inter_channel_delay).await;
            }
            let (outcome, attempts) = self.process_channel(channel, &endpoint).await;
            lock_tally(&tally).record(outcome, &attempts);
        }

        let tally = lock_tally(&tally);
        info!(
            "Worker {} completed {} channels: {} live, {} placeholder",
            index,
            tally.outcomes.len(),
            tally.live_channels,
            tally.placeholder_channels
        );
    }

    async fn process_channel(
        &self,
        channel: &Channel,
        endpoint: &EndpointTemplate,
    ) -> (ChannelOutcome, Vec<FetchAttemptRecord>) {
        let (guide, attempts, error) = match self.fetcher.fetch(channel.id, endpoint).await {
            Ok(success) => (
                ChannelGuide {
                    channel_id: channel.id,
                    programs: success.programs,
                    source: GuideSource::Mirror(success.source_url),
                    updated_at: Utc::now(),
                },
                success.records,
                None,
            ),
            Err(failure) => (
                self.normalizer.placeholder_guide(channel, Utc::now()),
                failure.records,
                Some(failure.last_error),
            ),
        };

        let persisted = self.persist(&guide).await;
        let outcome = ChannelOutcome {
            channel_id: channel.id,
            epg_source: guide.source.mirror_url().map(str::to_string),
            program_count: guide.programs.len(),
            attempts: attempts.len() as u32,
            persisted,
            error,
        };
        (outcome, attempts)
    }

    async fn persist(&self, guide: &ChannelGuide) -> bool {
        match self.sink.upsert(guide).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to store guide for channel {}: {}",
                    guide.channel_id, e
                );
                false
            }
        }
    }

    async fn fill_unfinished(&self, batch: &[Channel], tally: &mut BatchTally, reason: &str) {
        let finished: HashSet<i64> = tally.outcomes.iter().map(|o| o.channel_id).collect();

        for channel in batch.iter().filter(|c| !finished.contains(&c.id)) {
            let guide = self.normalizer.placeholder_guide(channel, Utc::now());
            let persisted = self.persist(&guide).await;
            tally.record(
                ChannelOutcome {
                    channel_id: channel.id,
                    epg_source: None,
                    program_count: guide.programs.len(),
                    attempts: 0,
                    persisted,
                    error: Some(format!("worker failed: {}", reason)),
                },
                &[],
            );
        }
    }
}

fn lock_tally(tally: &Mutex<BatchTally>) -> std::sync::MutexGuard<'_, BatchTally> {
    tally.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take_tally(tally: &Mutex<BatchTally>) -> BatchTally {
    std::mem::take(&mut *lock_tally(tally))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_clamps() {
        assert_eq!(worker_count(1), 2);
        assert_eq!(worker_count(2), 2);
        assert_eq!(worker_count(4), 3);
        assert_eq!(worker_count(9), 8);
        assert_eq!(worker_count(64), 8);
        assert!((MIN_WORKERS..=MAX_WORKERS).contains(&default_worker_count()));
    }

    #[test]
    fn test_partition_is_balanced_and_complete() {
        let items: Vec<u32> = (0..10).collect();
        let batches = partition(&items, 4);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(batches.concat(), items);

        assert_eq!(partition(&items[..3], 8).len(), 3);
        assert!(partition::<u32>(&[], 4).is_empty());
    }

    #[test]
    fn test_tally_merge_sums_by_mirror() {
        let outcome = |id, source: Option<&str>| ChannelOutcome {
            channel_id: id,
            epg_source: source.map(str::to_string),
            program_count: 1,
            attempts: 1,
            persisted: true,
            error: None,
        };

        let mut a = BatchTally::default();
        a.record(outcome(1, Some("https://a.example")), &[]);
        a.record(outcome(2, None), &[]);
        let mut b = BatchTally::default();
        b.record(outcome(3, Some("https://a.example")), &[]);
        b.record(outcome(4, Some("https://b.example")), &[]);

        a.merge(b);
        assert_eq!(a.source_stats["https://a.example"], 2);
        assert_eq!(a.source_stats["https://b.example"], 1);
        assert_eq!(a.live_channels, 3);
        assert_eq!(a.placeholder_channels, 1);
        assert_eq!(a.outcomes.len(), 4);
    }
}
