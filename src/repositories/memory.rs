use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::RepositoryResult;
use crate::models::{Channel, ChannelGuide};

use super::traits::{channel_order, ChannelStore, GuideSink};

const GUIDE_SHARDS: usize = 16;

/// In-process store for channels and guides.
///
/// Guides are spread over independently locked shards keyed by channel id,
/// so concurrent upserts for different channels rarely contend.
#[derive(Clone)]
pub struct MemoryStore {
    guides: Arc<Vec<RwLock<HashMap<i64, ChannelGuide>>>>,
    channels: Arc<RwLock<BTreeMap<i64, Channel>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            guides: Arc::new((0..GUIDE_SHARDS).map(|_| RwLock::new(HashMap::new())).collect()),
            channels: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn with_channels(channels: Vec<Channel>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.channels.try_write() {
            map.extend(channels.into_iter().map(|c| (c.id, c)));
        }
        store
    }

    fn shard(&self, channel_id: i64) -> &RwLock<HashMap<i64, ChannelGuide>> {
        &self.guides[channel_id.rem_euclid(GUIDE_SHARDS as i64) as usize]
    }
}

#[async_trait]
impl GuideSink for MemoryStore {
    async fn upsert(&self, guide: &ChannelGuide) -> RepositoryResult<()> {
        self.shard(guide.channel_id)
            .write()
            .await
            .insert(guide.channel_id, guide.clone());
        Ok(())
    }

    async fn read_all(&self) -> RepositoryResult<BTreeMap<i64, ChannelGuide>> {
        let mut all = BTreeMap::new();
        for shard in self.guides.iter() {
            let shard = shard.read().await;
            all.extend(shard.iter().map(|(id, guide)| (*id, guide.clone())));
        }
        Ok(all)
    }

    async fn get(&self, channel_id: i64) -> RepositoryResult<Option<ChannelGuide>> {
        Ok(self.shard(channel_id).read().await.get(&channel_id).cloned())
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn list_channels(&self) -> RepositoryResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self.channels.read().await.values().cloned().collect();
        channels.sort_by_key(channel_order);
        Ok(channels)
    }

    async fn get_channel(&self, channel_id: i64) -> RepositoryResult<Option<Channel>> {
        Ok(self.channels.read().await.get(&channel_id).cloned())
    }

    async fn replace_channels(&self, channels: Vec<Channel>) -> RepositoryResult<usize> {
        let mut stored = self.channels.write().await;
        let mut replacement = BTreeMap::new();
        for mut channel in channels {
            if channel.logo_public_url.is_none() {
                channel.logo_public_url = stored
                    .get(&channel.id)
                    .and_then(|previous| previous.logo_public_url.clone());
            }
            replacement.insert(channel.id, channel);
        }
        let count = replacement.len();
        *stored = replacement;
        Ok(count)
    }
}
