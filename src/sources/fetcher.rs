//! Multi-mirror fetch with per-mirror retry budgets and cross-mirror failover
//!
//! One `fetch` works a queue of shuffled mirrors in cycles. A mirror that
//! fails the very first request of the fetch is abandoned straight away, so
//! the first cycle touches every mirror once before anything is retried.
//! In later cycles a mirror may be retried with backoff, up to
//! `max_attempts_per_mirror` attempts per cycle. A malformed payload always
//! abandons the mirror for the current cycle. When the queue drains, it is
//! refilled with a fresh permutation of all mirrors until
//! `global_attempt_ceiling` attempts have been spent.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::ingestor::normalizer::Normalizer;
use crate::models::{AttemptOutcome, FetchAttemptRecord, ProgramItem};
use crate::utils::url::join_url;

use super::mirrors::MirrorRegistry;
use super::transport::{MirrorTransport, TransportError};

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_attempts_per_mirror: u32,
    pub global_attempt_ceiling: u32,
    pub backoff_base: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts_per_mirror: config.max_attempts_per_mirror,
            global_attempt_ceiling: config.global_attempt_ceiling,
            backoff_base: config.backoff_base(),
        }
    }
}

impl FetchPolicy {
    /// `base * 1.5^attempt * (0.5 + jitter)` with jitter in `[0, 1)`
    pub fn backoff_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 1.5_f64.powi(attempt as i32) * (0.5 + jitter.clamp(0.0, 1.0));
        self.backoff_base.mul_f64(factor)
    }
}

/// Path template rendered once per item, e.g.
/// `/sb/public/epg/channel/{channel_id}?tenantId={tenant_id}`
#[derive(Debug, Clone)]
pub struct EndpointTemplate {
    template: String,
    tenant_id: String,
}

impl EndpointTemplate {
    pub fn new(template: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            tenant_id: tenant_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn render(&self, item_id: i64) -> String {
        self.template
            .replace("{channel_id}", &item_id.to_string())
            .replace("{tenant_id}", &self.tenant_id)
    }
}

#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub programs: Vec<ProgramItem>,
    /// Base URL of the mirror that answered
    pub source_url: String,
    pub records: Vec<FetchAttemptRecord>,
}

impl FetchSuccess {
    pub fn attempts(&self) -> u32 {
        self.records.len() as u32
    }
}

#[derive(Debug, Clone, Error)]
#[error("fetch failed after {attempts} attempts: {last_error}")]
pub struct FetchFailure {
    pub attempts: u32,
    pub last_error: String,
    pub records: Vec<FetchAttemptRecord>,
}

enum AttemptResult {
    Success(Vec<ProgramItem>),
    Failed(AttemptOutcome, String),
}

#[derive(Clone)]
pub struct ResilientFetcher {
    registry: MirrorRegistry,
    transport: Arc<dyn MirrorTransport>,
    normalizer: Arc<Normalizer>,
    policy: FetchPolicy,
}

impl ResilientFetcher {
    pub fn new(
        registry: MirrorRegistry,
        transport: Arc<dyn MirrorTransport>,
        normalizer: Arc<Normalizer>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            registry,
            transport,
            normalizer,
            policy,
        }
    }

    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub async fn fetch(
        &self,
        item_id: i64,
        endpoint: &EndpointTemplate,
    ) -> Result<FetchSuccess, FetchFailure> {
        let path = endpoint.render(item_id);
        let max_per_mirror = self.policy.max_attempts_per_mirror;
        let ceiling = self.policy.global_attempt_ceiling;

        let mut contacted: HashSet<String> = HashSet::new();
        let mut records: Vec<FetchAttemptRecord> = Vec::new();
        let mut total: u32 = 0;
        let mut last_error = String::from("no mirrors configured");
        let mut cycle: u32 = 0;

        'cycles: while total < ceiling {
            let mut queue: VecDeque<String> = self.registry.shuffled().into();
            if queue.is_empty() || max_per_mirror == 0 {
                break;
            }
            cycle += 1;
            debug!(
                "Item {} cycle {}: {} mirrors queued, {} of {} attempts used",
                item_id,
                cycle,
                queue.len(),
                total,
                ceiling
            );

            while let Some(mirror) = queue.pop_front() {
                let url = join_url(&mirror, &path);
                let first_contact = contacted.insert(mirror.clone());
                let mut attempt: u32 = 0;

                while attempt < max_per_mirror {
                    if total >= ceiling {
                        break 'cycles;
                    }
                    attempt += 1;
                    total += 1;

                    let started = Instant::now();
                    let result = self.attempt(&url).await;
                    let latency = started.elapsed();

                    let outcome = match &result {
                        AttemptResult::Success(_) => AttemptOutcome::Success,
                        AttemptResult::Failed(outcome, _) => *outcome,
                    };
                    debug!(
                        "Item {} mirror {} cycle {} attempt {}: {} in {:?}",
                        item_id,
                        mirror,
                        cycle,
                        attempt,
                        outcome.as_str(),
                        latency
                    );
                    records.push(FetchAttemptRecord {
                        mirror: mirror.clone(),
                        cycle,
                        attempt,
                        outcome,
                        latency,
                    });

                    match result {
                        AttemptResult::Success(programs) => {
                            return Ok(FetchSuccess {
                                programs,
                                source_url: mirror,
                                records,
                            });
                        }
                        AttemptResult::Failed(AttemptOutcome::Malformed, message) => {
                            debug!("Abandoning mirror {}: malformed payload", mirror);
                            last_error = message;
                            break;
                        }
                        AttemptResult::Failed(_, message) => {
                            last_error = message;
                            if first_contact {
                                debug!("Abandoning mirror {} after first failure", mirror);
                                break;
                            }
                            if attempt >= max_per_mirror {
                                debug!(
                                    "Abandoning mirror {} for cycle {}: attempt budget spent",
                                    mirror, cycle
                                );
                                break;
                            }
                            let delay = self.policy.backoff_delay(attempt, fastrand::f64());
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                    }
                }
            }
        }

        warn!(
            "All mirrors exhausted for item {} after {} attempts: {}",
            item_id, total, last_error
        );
        Err(FetchFailure {
            attempts: total,
            last_error,
            records,
        })
    }

    async fn attempt(&self, url: &str) -> AttemptResult {
        let response = match self.transport.get(url, None).await {
            Ok(response) => response,
            Err(TransportError::Timeout) => {
                return AttemptResult::Failed(
                    AttemptOutcome::Timeout,
                    format!("{}: request timed out", url),
                )
            }
            Err(e) => {
                return AttemptResult::Failed(
                    AttemptOutcome::TransportError,
                    format!("{}: {}", url, e),
                )
            }
        };

        if !response.is_success() {
            return AttemptResult::Failed(
                AttemptOutcome::Protocol,
                format!("{}: HTTP {}", url, response.status),
            );
        }

        match self.normalizer.normalize_programs(&response.body) {
            Ok(programs) => AttemptResult::Success(programs),
            Err(outcome) => AttemptResult::Failed(
                outcome,
                format!("{}: {} payload", url, outcome.as_str()),
            ),
        }
    }
}
