//! Read side: joins stored channels with their guides and encodes them
//!
//! - JSON documents (`proxy::json`)
//! - XMLTV documents (`proxy::xmltv`)
//! - M3U playlists (`proxy::m3u`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingestor::normalizer::Normalizer;
use crate::models::{Channel, ChannelGuide, ProgramItem};

pub mod json;
pub mod m3u;
pub mod xmltv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Xmltv,
}

impl OutputFormat {
    /// Unknown or missing values select JSON
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("xmltv") => OutputFormat::Xmltv,
            _ => OutputFormat::Json,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Xmltv => "application/xml",
        }
    }
}

/// Whether rebroadcast ("CATCHUP") items are published. Placeholders are
/// always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatchupPolicy {
    #[default]
    Keep,
    Exclude,
}

impl CatchupPolicy {
    pub fn from_query(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "keep" | "true" | "include" => Some(CatchupPolicy::Keep),
            "exclude" | "false" => Some(CatchupPolicy::Exclude),
            _ => None,
        }
    }

    pub fn allows(&self, item: &ProgramItem) -> bool {
        match self {
            CatchupPolicy::Keep => true,
            CatchupPolicy::Exclude => item.is_placeholder() || !item.is_catchup(),
        }
    }
}

/// A channel paired with the guide that will be published for it
#[derive(Debug, Clone)]
pub struct ChannelWithGuide {
    pub channel: Channel,
    pub guide: ChannelGuide,
}

/// Pair every channel with its stored guide.
///
/// Channels without a stored guide, or whose guide is emptied by the
/// catch-up policy, get a placeholder so no channel is published without a
/// programme.
pub fn assemble(
    channels: Vec<Channel>,
    mut guides: BTreeMap<i64, ChannelGuide>,
    normalizer: &Normalizer,
    policy: CatchupPolicy,
    now: DateTime<Utc>,
) -> Vec<ChannelWithGuide> {
    channels
        .into_iter()
        .map(|channel| {
            let guide = match guides.remove(&channel.id) {
                Some(mut guide) => {
                    guide.programs.retain(|item| policy.allows(item));
                    if guide.programs.is_empty() {
                        normalizer.placeholder_guide(&channel, guide.updated_at)
                    } else {
                        guide
                    }
                }
                None => normalizer.placeholder_guide(&channel, now),
            };
            ChannelWithGuide { channel, guide }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GuideSource, CATCHUP_STATE};
    use serde_json::json;

    fn channel(id: i64) -> Channel {
        serde_json::from_value(json!({"id": id, "number": id, "name": format!("C{}", id)}))
            .unwrap()
    }

    fn program(id: i64, state: Option<&str>) -> ProgramItem {
        serde_json::from_value(json!({
            "id": id,
            "title": format!("P{}", id),
            "startTime": "2024-01-01T00:00:00Z",
            "endTime": "2024-01-01T01:00:00Z",
            "state": state
        }))
        .unwrap()
    }

    fn guide(channel_id: i64, programs: Vec<ProgramItem>) -> ChannelGuide {
        ChannelGuide {
            channel_id,
            programs,
            source: GuideSource::Mirror("https://a.example".into()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_output_format_from_query() {
        assert_eq!(OutputFormat::from_query(Some("XMLTV")), OutputFormat::Xmltv);
        assert_eq!(OutputFormat::from_query(Some("csv")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_query(None), OutputFormat::Json);
        assert_eq!(OutputFormat::Xmltv.content_type(), "application/xml");
    }

    #[test]
    fn test_catchup_policy() {
        let catchup = program(1, Some(CATCHUP_STATE));
        let live = program(2, None);
        assert!(CatchupPolicy::Keep.allows(&catchup));
        assert!(!CatchupPolicy::Exclude.allows(&catchup));
        assert!(CatchupPolicy::Exclude.allows(&live));
        assert_eq!(CatchupPolicy::from_query("Exclude"), Some(CatchupPolicy::Exclude));
        assert_eq!(CatchupPolicy::from_query("maybe"), None);
    }

    #[test]
    fn test_assemble_fills_missing_guides() {
        let normalizer = Normalizer::new().unwrap();
        let mut guides = BTreeMap::new();
        guides.insert(1, guide(1, vec![program(1, None), program(2, Some(CATCHUP_STATE))]));
        guides.insert(2, guide(2, vec![program(3, Some(CATCHUP_STATE))]));

        let assembled = assemble(
            vec![channel(1), channel(2), channel(3)],
            guides,
            &normalizer,
            CatchupPolicy::Exclude,
            Utc::now(),
        );

        assert_eq!(assembled.len(), 3);
        assert_eq!(assembled[0].guide.programs.len(), 1);
        assert!(!assembled[0].guide.source.is_placeholder());
        assert!(assembled[1].guide.source.is_placeholder());
        assert!(assembled[2].guide.programs[0].is_placeholder());
    }
}
