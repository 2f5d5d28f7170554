use std::sync::Arc;
use tracing::{error, info, warn};

use super::dispatcher::EpgDispatcher;
use super::state_manager::{ActiveRun, RefreshStateManager, RefreshTrigger};
use crate::errors::{AppResult, RefreshError};
use crate::models::RunReport;
use crate::repositories::ChannelStore;
use crate::sources::ChannelSync;

/// Entry point for refresh runs: guards against overlap, resolves the channel
/// list and hands it to the dispatcher.
#[derive(Clone)]
pub struct RefreshService {
    channels: Arc<dyn ChannelStore>,
    dispatcher: EpgDispatcher,
    state: RefreshStateManager,
    channel_sync: Option<Arc<ChannelSync>>,
    sync_before_refresh: bool,
}

impl RefreshService {
    pub fn new(
        channels: Arc<dyn ChannelStore>,
        dispatcher: EpgDispatcher,
        state: RefreshStateManager,
    ) -> Self {
        Self {
            channels,
            dispatcher,
            state,
            channel_sync: None,
            sync_before_refresh: false,
        }
    }

    /// Sync the channel list from upstream before every run
    pub fn with_channel_sync(mut self, sync: Arc<ChannelSync>, before_refresh: bool) -> Self {
        self.channel_sync = Some(sync);
        self.sync_before_refresh = before_refresh;
        self
    }

    pub fn state(&self) -> &RefreshStateManager {
        &self.state
    }

    /// Run a full refresh and wait for it
    pub async fn refresh(&self, tenant_id: &str, trigger: RefreshTrigger) -> AppResult<RunReport> {
        let run = self.begin(tenant_id, trigger).await?;
        self.complete(run).await
    }

    /// Claim the refresh slot without starting work, so callers can reject
    /// overlapping requests before spawning.
    pub async fn begin(&self, tenant_id: &str, trigger: RefreshTrigger) -> AppResult<ActiveRun> {
        self.state
            .try_start(tenant_id, trigger)
            .await
            .ok_or_else(|| RefreshError::AlreadyRunning.into())
    }

    /// Execute a run claimed with [`RefreshService::begin`] and release the slot
    pub async fn complete(&self, run: ActiveRun) -> AppResult<RunReport> {
        info!(
            "Starting {:?} refresh run {} for tenant {}",
            run.trigger, run.run_id, run.tenant_id
        );

        match self.execute(&run).await {
            Ok(report) => {
                self.state.finish_success(report.clone()).await;
                Ok(report)
            }
            Err(e) => {
                error!("Refresh run {} aborted: {}", run.run_id, e);
                self.state.finish_failure(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, run: &ActiveRun) -> AppResult<RunReport> {
        if self.sync_before_refresh {
            if let Some(sync) = &self.channel_sync {
                if let Err(e) = sync.sync().await {
                    warn!("Channel sync failed, using stored channel list: {}", e);
                }
            }
        }

        let channels = self
            .channels
            .list_channels()
            .await
            .map_err(|e| RefreshError::ChannelList(e.to_string()))?;
        if channels.is_empty() {
            return Err(RefreshError::NoChannels.into());
        }

        Ok(self
            .dispatcher
            .run(run.run_id, &run.tenant_id, channels)
            .await)
    }
}
