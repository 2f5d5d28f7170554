//! Cleaning, filtering and placeholder synthesis for upstream records
//!
//! Everything that leaves a mirror passes through here before it is
//! persisted: string fields lose upstream branding, excluded channels are
//! dropped, and program payloads are classified into usable items or a
//! failure outcome the fetcher can act on.

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{
    AttemptOutcome, Channel, ChannelGuide, GuideSource, PgRating, ProgramId, ProgramItem,
    PLACEHOLDER_STATE,
};

/// Upstream branding stripped from every string field
const BRANDING_PATTERN: &str = r"(?i)(?:\s*-\s*)?support\s*tv";

/// Channels never republished, regardless of their names
pub const EXCLUDED_CHANNEL_IDS: &[i64] = &[1032];

/// Name fragments that mark a channel as an upstream house channel
pub const EXCLUDED_NAME_PHRASES: &[&str] = &["Canal Support"];

/// Upstream prefixes logo paths with the API mount point
const LOGO_PATH_PREFIX: &str = "/sb";

pub const PLACEHOLDER_DESCRIPTION: &str = "Este canal no tiene informacion de la guia.";
pub const PLACEHOLDER_RATING: &str = "TV-PG";

#[derive(Debug, Clone)]
pub struct Normalizer {
    branding: Regex,
    excluded_ids: HashSet<i64>,
    excluded_phrases: Vec<String>,
}

impl Normalizer {
    pub fn new() -> AppResult<Self> {
        Self::with_rules(
            BRANDING_PATTERN,
            EXCLUDED_CHANNEL_IDS.iter().copied(),
            EXCLUDED_NAME_PHRASES.iter().copied(),
        )
    }

    pub fn with_rules<I, P, S>(branding_pattern: &str, excluded_ids: I, phrases: P) -> AppResult<Self>
    where
        I: IntoIterator<Item = i64>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let branding = Regex::new(branding_pattern).map_err(|e| {
            AppError::configuration(format!("invalid branding pattern: {}", e))
        })?;

        Ok(Self {
            branding,
            excluded_ids: excluded_ids.into_iter().collect(),
            excluded_phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        })
    }

    pub fn clean_string(&self, value: &str) -> String {
        self.branding.replace_all(value, "").trim().to_string()
    }

    /// Clean every string inside a JSON value, descending into arrays and
    /// objects. Keys are left untouched.
    pub fn clean_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.clean_string(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.clean_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.clean_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    pub fn is_excluded(&self, channel: &Channel) -> bool {
        if self.excluded_ids.contains(&channel.id) {
            return true;
        }
        [&channel.display_name, &channel.title, &channel.name]
            .into_iter()
            .flatten()
            .map(|name| name.to_lowercase())
            .any(|name| self.excluded_phrases.iter().any(|p| name.contains(p)))
    }

    /// Turn a raw upstream channel list into the canonical channel set.
    ///
    /// Records that fail to deserialize are skipped, excluded channels are
    /// dropped, and duplicate ids keep the first occurrence.
    pub fn normalize_channels(&self, raw: Vec<Value>) -> Vec<Channel> {
        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(raw.len());

        for value in raw {
            let mut channel: Channel = match serde_json::from_value(self.clean_value(value)) {
                Ok(channel) => channel,
                Err(e) => {
                    warn!("Skipping unparseable channel record: {}", e);
                    continue;
                }
            };

            if self.is_excluded(&channel) {
                debug!("Excluding channel {} ({})", channel.id, channel.label());
                continue;
            }
            if !seen.insert(channel.id) {
                debug!("Dropping duplicate channel id {}", channel.id);
                continue;
            }

            if let Some(logo) = channel.logo_url.take() {
                let logo = strip_logo_prefix(&logo);
                channel.image_url = Some(logo.clone());
                channel.logo_url = Some(logo);
            }
            channels.push(channel);
        }

        channels
    }

    /// Classify a mirror's EPG payload.
    ///
    /// A bare array or a `{"data": [...]}` envelope is accepted. Anything
    /// else, or any element that is not a program item, is `Malformed`. An
    /// empty list, or one whose items all have `start >= end`, is `Empty`.
    pub fn normalize_programs(&self, body: &str) -> Result<Vec<ProgramItem>, AttemptOutcome> {
        let value: Value = serde_json::from_str(body).map_err(|_| AttemptOutcome::Malformed)?;

        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => return Err(AttemptOutcome::Malformed),
            },
            _ => return Err(AttemptOutcome::Malformed),
        };

        if items.is_empty() {
            return Err(AttemptOutcome::Empty);
        }

        let mut programs = Vec::with_capacity(items.len());
        for item in items {
            let program: ProgramItem = serde_json::from_value(self.clean_value(item))
                .map_err(|_| AttemptOutcome::Malformed)?;
            if program.start_time < program.end_time {
                programs.push(program);
            } else {
                debug!("Dropping program {} with start >= end", program.id);
            }
        }

        if programs.is_empty() {
            return Err(AttemptOutcome::Empty);
        }

        programs.sort_by_key(|p| p.start_time);
        Ok(programs)
    }

    /// The single stand-in item used when no mirror produced data.
    ///
    /// Its window spans from 1970 to year 9999 so it is "now playing" for
    /// any query time.
    pub fn placeholder_for(&self, channel: &Channel) -> ProgramItem {
        let title = format!("Sin datos para {}", channel.label());
        let image_url = channel
            .logo_url
            .clone()
            .unwrap_or_else(|| format!("/image/{}", channel.id));

        let mut extra = Map::new();
        extra.insert("channelId".to_string(), json!(channel.id));
        extra.insert("titleBrief".to_string(), json!("Sin Datos"));
        extra.insert("titles".to_string(), json!({ "ES": title }));
        extra.insert(
            "descriptions".to_string(),
            json!({ "ES": PLACEHOLDER_DESCRIPTION }),
        );

        ProgramItem {
            id: ProgramId::Text(format!("placeholder-{}", channel.id)),
            title,
            start_time: placeholder_start(),
            end_time: placeholder_end(),
            description: Some(PLACEHOLDER_DESCRIPTION.to_string()),
            pg_rating: Some(PgRating {
                name: Some(PLACEHOLDER_RATING.to_string()),
            }),
            image_url: Some(image_url),
            state: Some(PLACEHOLDER_STATE.to_string()),
            extra,
        }
    }

    pub fn placeholder_guide(&self, channel: &Channel, updated_at: DateTime<Utc>) -> ChannelGuide {
        ChannelGuide {
            channel_id: channel.id,
            programs: vec![self.placeholder_for(channel)],
            source: GuideSource::Placeholder,
            updated_at,
        }
    }
}

fn strip_logo_prefix(logo: &str) -> String {
    if logo.contains(LOGO_PATH_PREFIX) {
        logo.replacen(LOGO_PATH_PREFIX, "", 1)
    } else {
        logo.to_string()
    }
}

fn placeholder_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 1, 23, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn placeholder_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 1, 1, 1, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
