//! Refresh pipeline: normalization, batch dispatch, run state and scheduling

pub mod dispatcher;
pub mod normalizer;
pub mod refresh;
pub mod scheduler;
pub mod state_manager;

pub use dispatcher::{worker_count, EpgDispatcher};
pub use normalizer::Normalizer;
pub use refresh::RefreshService;
pub use scheduler::RefreshScheduler;
pub use state_manager::{RefreshStateManager, RefreshStatus, RefreshTrigger};
