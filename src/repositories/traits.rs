//! Persistence contracts shared by the SQLite and in-memory stores

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::errors::RepositoryResult;
use crate::models::{Channel, ChannelGuide};

/// Keyed upsert of one guide per channel.
///
/// A later write for a channel replaces its previous guide entirely. Writes
/// for different channels are independent and may run concurrently.
#[async_trait]
pub trait GuideSink: Send + Sync {
    async fn upsert(&self, guide: &ChannelGuide) -> RepositoryResult<()>;

    async fn read_all(&self) -> RepositoryResult<BTreeMap<i64, ChannelGuide>>;

    async fn get(&self, channel_id: i64) -> RepositoryResult<Option<ChannelGuide>>;
}

/// The stored channel set that refresh runs iterate over
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Channels ordered by display number, unnumbered channels last
    async fn list_channels(&self) -> RepositoryResult<Vec<Channel>>;

    async fn get_channel(&self, channel_id: i64) -> RepositoryResult<Option<Channel>>;

    /// Replace the whole set. A channel's stored `logo_public_url` survives
    /// when the incoming record has none.
    async fn replace_channels(&self, channels: Vec<Channel>) -> RepositoryResult<usize>;
}

/// Sort key used by every `list_channels` implementation
pub fn channel_order(channel: &Channel) -> (bool, i64, i64) {
    (
        channel.number.is_none(),
        channel.number.unwrap_or_default(),
        channel.id,
    )
}
