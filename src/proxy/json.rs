use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::ChannelWithGuide;
use crate::models::{Channel, ProgramItem};

#[derive(Debug, Serialize)]
pub struct EpgDocument {
    pub channels: Vec<JsonChannel>,
    pub meta: EpgMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonChannel {
    #[serde(flatten)]
    pub channel: Channel,
    pub epg: Vec<ProgramItem>,
    /// Mirror that supplied the guide, `null` for placeholders
    pub epg_source: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpgMeta {
    /// Channels served per mirror; every configured mirror is listed
    pub source_stats: BTreeMap<String, u64>,
    pub total_channels: usize,
    pub channels_with_epg: usize,
    pub placeholder_channels: usize,
    pub generated_at: DateTime<Utc>,
}

pub fn build_document(
    entries: Vec<ChannelWithGuide>,
    mirrors: &[String],
    generated_at: DateTime<Utc>,
) -> EpgDocument {
    let mut source_stats: BTreeMap<String, u64> =
        mirrors.iter().map(|m| (m.clone(), 0)).collect();
    let mut placeholder_channels = 0;

    let total_channels = entries.len();
    let channels = entries
        .into_iter()
        .map(|ChannelWithGuide { mut channel, guide }| {
            match guide.source.mirror_url() {
                Some(url) => *source_stats.entry(url.to_string()).or_insert(0) += 1,
                None => placeholder_channels += 1,
            }
            if channel.logo_public_url.is_some() {
                channel.image_url = channel.logo_public_url.clone();
            }
            JsonChannel {
                epg_source: guide.source.mirror_url().map(str::to_string),
                channel,
                epg: guide.programs,
                updated_at: guide.updated_at,
            }
        })
        .collect();

    EpgDocument {
        channels,
        meta: EpgMeta {
            source_stats,
            total_channels,
            channels_with_epg: total_channels - placeholder_channels,
            placeholder_channels,
            generated_at,
        },
    }
}
