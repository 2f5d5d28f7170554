use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::RunReport;

/// What started a refresh run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    Manual,
    Cli,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRun {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub trigger: RefreshTrigger,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub running: bool,
    pub active: Option<ActiveRun>,
    pub last_report: Option<RunReport>,
    pub last_error: Option<String>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct RefreshState {
    active: Option<ActiveRun>,
    last_report: Option<RunReport>,
    last_error: Option<String>,
    last_finished_at: Option<DateTime<Utc>>,
}

/// Single-slot guard for refresh runs plus the outcome of the last one
#[derive(Clone, Default)]
pub struct RefreshStateManager {
    state: Arc<RwLock<RefreshState>>,
}

impl RefreshStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the refresh slot. Returns `None` while another run holds it.
    pub async fn try_start(&self, tenant_id: &str, trigger: RefreshTrigger) -> Option<ActiveRun> {
        let mut state = self.state.write().await;
        if state.active.is_some() {
            return None;
        }

        let run = ActiveRun {
            run_id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            trigger,
            started_at: Utc::now(),
        };
        state.active = Some(run.clone());
        Some(run)
    }

    pub async fn finish_success(&self, report: RunReport) {
        let mut state = self.state.write().await;
        state.active = None;
        state.last_error = None;
        state.last_finished_at = Some(report.finished_at);
        state.last_report = Some(report);
    }

    /// Release the slot after a run aborted. The previous report is kept.
    pub async fn finish_failure(&self, error: String) {
        let mut state = self.state.write().await;
        state.active = None;
        state.last_error = Some(error);
        state.last_finished_at = Some(Utc::now());
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.active.is_some()
    }

    pub async fn status(&self) -> RefreshStatus {
        let state = self.state.read().await;
        RefreshStatus {
            running: state.active.is_some(),
            active: state.active.clone(),
            last_report: state.last_report.clone(),
            last_error: state.last_error.clone(),
            last_finished_at: state.last_finished_at,
        }
    }
}
