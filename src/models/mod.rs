use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle state upstream assigns to rebroadcast/catch-up items
pub const CATCHUP_STATE: &str = "CATCHUP";

/// Lifecycle state marking a synthesized placeholder item
pub const PLACEHOLDER_STATE: &str = "PLACEHOLDER";

/// A channel as published by the upstream channel list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i64,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub titles: Option<serde_json::Value>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub content_urls: ContentUrls,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub logo_public_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentUrls {
    #[serde(rename = "hlsFP", default, skip_serializing_if = "Option::is_none")]
    pub hls_fp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
}

impl Channel {
    /// Human-readable name, falling back through the name fields to the number
    pub fn label(&self) -> String {
        [&self.display_name, &self.title, &self.name]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| match self.number {
                Some(number) => format!("Channel {}", number),
                None => format!("Channel {}", self.id),
            })
    }
}

/// Program identifiers are numeric upstream and textual for placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgramId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramId::Numeric(id) => write!(f, "{}", id),
            ProgramId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgRating {
    #[serde(default)]
    pub name: Option<String>,
}

/// One scheduled program. Unknown upstream fields are carried through in
/// `extra` so the JSON output stays a faithful copy of what a mirror sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramItem {
    pub id: ProgramId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_rating: Option<PgRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProgramItem {
    pub fn is_catchup(&self) -> bool {
        self.state.as_deref() == Some(CATCHUP_STATE)
    }

    pub fn is_placeholder(&self) -> bool {
        self.state.as_deref() == Some(PLACEHOLDER_STATE)
    }

    pub fn rating(&self) -> Option<&str> {
        self.pg_rating.as_ref().and_then(|r| r.name.as_deref())
    }

    pub fn is_airing_at(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at < self.end_time
    }
}

/// Provenance of a channel guide
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuideSource {
    /// Base URL of the mirror that supplied the data
    Mirror(String),
    /// Synthesized because no mirror yielded usable data
    Placeholder,
}

impl GuideSource {
    pub fn mirror_url(&self) -> Option<&str> {
        match self {
            GuideSource::Mirror(url) => Some(url),
            GuideSource::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, GuideSource::Placeholder)
    }
}

/// The canonical guide of one channel, owned by the guide sink
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGuide {
    pub channel_id: i64,
    pub programs: Vec<ProgramItem>,
    pub source: GuideSource,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one request against one mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Empty,
    Malformed,
    /// Non-success HTTP status
    Protocol,
    TransportError,
    Timeout,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Empty => "empty",
            AttemptOutcome::Malformed => "malformed",
            AttemptOutcome::Protocol => "protocol",
            AttemptOutcome::TransportError => "transport_error",
            AttemptOutcome::Timeout => "timeout",
        }
    }
}

/// Diagnostic record of a single fetch attempt; never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct FetchAttemptRecord {
    pub mirror: String,
    /// 1-based refill cycle of the fetch
    pub cycle: u32,
    /// 1-based attempt index against this mirror within `cycle`
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub latency: Duration,
}

/// What happened to one channel during a refresh run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    pub channel_id: i64,
    /// Mirror that supplied the guide; `None` when a placeholder was used
    pub epg_source: Option<String>,
    pub program_count: usize,
    pub attempts: u32,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Statistics for one refresh run, returned by value rather than kept in
/// any shared counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_channels: usize,
    pub live_channels: usize,
    pub placeholder_channels: usize,
    pub persistence_failures: usize,
    pub failed_workers: usize,
    pub total_attempts: u64,
    pub source_stats: BTreeMap<String, u64>,
    pub attempt_outcomes: BTreeMap<AttemptOutcome, u64>,
    pub outcomes: Vec<ChannelOutcome>,
}
