use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tracing::{debug, error, info};

use super::refresh::RefreshService;
use super::state_manager::RefreshTrigger;
use crate::errors::{AppError, AppResult, RefreshError};

/// Cron-driven periodic refresh
pub struct RefreshScheduler {
    service: RefreshService,
    schedule: Schedule,
    tenant_id: String,
}

impl RefreshScheduler {
    /// `expression` uses the six-field (seconds-first) cron syntax
    pub fn new(
        service: RefreshService,
        expression: &str,
        tenant_id: impl Into<String>,
    ) -> AppResult<Self> {
        let schedule = parse_schedule(expression)?;
        Ok(Self {
            service,
            schedule,
            tenant_id: tenant_id.into(),
        })
    }

    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Loop forever, firing a refresh at every scheduled instant. A tick that
    /// lands while a run is active is skipped.
    pub async fn start(self) {
        info!("Starting refresh scheduler for tenant {}", self.tenant_id);

        loop {
            let now = Utc::now();
            let Some(next) = self.next_run_after(now) else {
                info!("Refresh schedule has no upcoming runs; scheduler stopping");
                return;
            };
            info!("Next scheduled refresh at {}", next);

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self
                .service
                .refresh(&self.tenant_id, RefreshTrigger::Scheduled)
                .await
            {
                Ok(report) => debug!(
                    "Scheduled refresh {} stored {} live and {} placeholder guides",
                    report.run_id, report.live_channels, report.placeholder_channels
                ),
                Err(AppError::Refresh(RefreshError::AlreadyRunning)) => {
                    info!("Skipping scheduled refresh: a run is already in progress")
                }
                Err(e) => error!("Scheduled refresh failed: {}", e),
            }
        }
    }
}

pub fn parse_schedule(expression: &str) -> AppResult<Schedule> {
    Schedule::from_str(expression).map_err(|e| {
        AppError::configuration(format!("invalid refresh.cron '{}': {}", expression, e))
    })
}
