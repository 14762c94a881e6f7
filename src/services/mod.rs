//! Recurring background workers.
//!
//! Every worker tick is a stateless, short-lived unit of work over the
//! persistent store; workers never block on each other and coordinate only
//! through persisted state.

pub mod curator;
pub mod executor;
pub mod expiry;
pub mod milestone;
pub mod safety;
pub mod scheduler;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::Notifier;
use crate::error::Result;

pub use curator::{CuratorSummary, SignalCurator};
pub use executor::{ExecutorSummary, ModeExecutor};
pub use expiry::ExpirySweeper;
pub use milestone::{MilestoneSummary, MilestoneTracker};
pub use safety::{SafetyMonitor, SafetySummary};
pub use scheduler::WorkerScheduler;

/// A schedulable unit of recurring work
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one tick and return a one-line summary for the logs
    async fn run_tick(&self) -> Result<String>;
}

/// Operator alert channel: a notifier plus the chat the alerts go to.
///
/// Sends are best-effort; a failed delivery is logged by the notifier and
/// otherwise ignored.
#[derive(Clone)]
pub struct OperatorAlerts {
    notifier: Arc<dyn Notifier>,
    operator_id: String,
}

impl OperatorAlerts {
    pub fn new(notifier: Arc<dyn Notifier>, operator_id: impl Into<String>) -> Self {
        Self {
            notifier,
            operator_id: operator_id.into(),
        }
    }

    pub async fn send(&self, message: &str) {
        if !self.notifier.notify(&self.operator_id, message).await {
            debug!("Operator alert not delivered");
        }
    }
}
