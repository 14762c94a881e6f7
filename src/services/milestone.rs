//! Milestone Tracker: evaluates unlock eligibility for the highest
//! autonomy tier.
//!
//! The completion flip is a one-way compare-and-set, which is also the
//! notification dedup: only the tick that flips it notifies. The tracker
//! never changes any profile's mode; unlocking remains an explicit
//! user-initiated call.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::{milestone_message, SignalSource};
use crate::config::MilestoneConfig;
use crate::domain::FULL_AUTO_MILESTONE;
use crate::error::Result;
use crate::store::TradingStore;

use super::{OperatorAlerts, Worker};

pub struct MilestoneTracker {
    store: Arc<dyn TradingStore>,
    signals: Arc<dyn SignalSource>,
    alerts: Option<OperatorAlerts>,
    config: MilestoneConfig,
}

#[derive(Debug, Clone, Default)]
pub struct MilestoneSummary {
    pub current_value: i64,
    pub target_value: i64,
    /// True only on the tick where the milestone first completed
    pub completed_now: bool,
}

impl fmt::Display for MilestoneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "progress={}/{} completed_now={}",
            self.current_value, self.target_value, self.completed_now
        )
    }
}

impl MilestoneTracker {
    pub fn new(
        store: Arc<dyn TradingStore>,
        signals: Arc<dyn SignalSource>,
        alerts: Option<OperatorAlerts>,
        config: MilestoneConfig,
    ) -> Self {
        Self {
            store,
            signals,
            alerts,
            config,
        }
    }

    pub async fn run_tick(&self) -> Result<MilestoneSummary> {
        let target = self.config.target_evaluated_outcomes;
        self.store
            .ensure_milestone(FULL_AUTO_MILESTONE, target)
            .await?;

        let current = self.signals.count_evaluated_outcomes().await?;
        self.store
            .record_milestone_progress(FULL_AUTO_MILESTONE, current)
            .await?;

        let completed_now = self
            .store
            .complete_milestone(FULL_AUTO_MILESTONE, current)
            .await?;

        info!(
            "Milestone check: {}/{} evaluated outcomes",
            current, target
        );

        if completed_now {
            info!("Milestone {} completed", FULL_AUTO_MILESTONE);
            if let Some(alerts) = &self.alerts {
                alerts
                    .send(&milestone_message(FULL_AUTO_MILESTONE, current, target))
                    .await;
            }
        }

        Ok(MilestoneSummary {
            current_value: current,
            target_value: target,
            completed_now,
        })
    }
}

#[async_trait]
impl Worker for MilestoneTracker {
    fn name(&self) -> &'static str {
        "milestone"
    }

    async fn run_tick(&self) -> Result<String> {
        MilestoneTracker::run_tick(self).await.map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockSignalSource;
    use crate::store::MemoryStore;

    fn tracker_with_count(store: Arc<MemoryStore>, count: i64) -> MilestoneTracker {
        let mut signals = MockSignalSource::new();
        signals
            .expect_count_evaluated_outcomes()
            .returning(move || Ok(count));
        MilestoneTracker::new(
            store,
            Arc::new(signals),
            None,
            MilestoneConfig::default(),
        )
    }

    #[tokio::test]
    async fn completes_exactly_once() {
        let store = Arc::new(MemoryStore::new());

        let below = tracker_with_count(store.clone(), 499);
        let summary = below.run_tick().await.unwrap();
        assert!(!summary.completed_now);

        let reached = tracker_with_count(store.clone(), 500);
        let summary = reached.run_tick().await.unwrap();
        assert!(summary.completed_now);

        // Later ticks see the gate already open and stay quiet.
        let after = tracker_with_count(store.clone(), 650);
        let summary = after.run_tick().await.unwrap();
        assert!(!summary.completed_now);

        let milestone = store
            .get_milestone(FULL_AUTO_MILESTONE)
            .await
            .unwrap()
            .unwrap();
        assert!(milestone.is_completed);
        assert_eq!(milestone.current_value, 650);
    }

    #[tokio::test]
    async fn progress_never_regresses() {
        let store = Arc::new(MemoryStore::new());

        tracker_with_count(store.clone(), 300)
            .run_tick()
            .await
            .unwrap();
        // A lower reading from the source does not move progress backwards.
        tracker_with_count(store.clone(), 250)
            .run_tick()
            .await
            .unwrap();

        let milestone = store
            .get_milestone(FULL_AUTO_MILESTONE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(milestone.current_value, 300);
        assert!(!milestone.is_completed);
    }
}
