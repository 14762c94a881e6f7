//! Mode Executor: drives approved and pending suggestions to execution
//! according to each profile's autonomy mode.
//!
//! Per-profile and per-suggestion failures are isolated; one profile's
//! execution error never aborts the tick for other profiles.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::domain::{SuggestionStatus, TradingMode, TradingProfile};
use crate::engine::{ExecuteOutcome, TradingEngine};
use crate::error::Result;
use crate::store::TradingStore;

use super::Worker;

pub struct ModeExecutor {
    engine: Arc<TradingEngine>,
    store: Arc<dyn TradingStore>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorSummary {
    pub profiles_checked: usize,
    pub executed: u64,
    /// Risk-denied or unfilled; left approved for the next tick
    pub deferred: u64,
    /// Pending suggestions waiting on an explicit approval call
    pub awaiting_approval: u64,
    /// Semi-auto suggestions left pending below the confidence threshold
    pub below_threshold: u64,
    pub errors: u64,
}

impl fmt::Display for ExecutorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "profiles={} executed={} deferred={} awaiting={} below_threshold={} errors={}",
            self.profiles_checked,
            self.executed,
            self.deferred,
            self.awaiting_approval,
            self.below_threshold,
            self.errors
        )
    }
}

impl ModeExecutor {
    pub fn new(engine: Arc<TradingEngine>, store: Arc<dyn TradingStore>) -> Self {
        Self { engine, store }
    }

    pub async fn run_tick(&self) -> Result<ExecutorSummary> {
        let profiles = self.store.automated_profiles().await?;
        let mut summary = ExecutorSummary {
            profiles_checked: profiles.len(),
            ..Default::default()
        };

        for profile in &profiles {
            // Kill switch forces observer-equivalent behavior regardless of
            // the configured mode.
            if profile.kill_switch_active {
                continue;
            }

            if let Err(e) = self.run_profile(profile, &mut summary).await {
                summary.errors += 1;
                error!("Executor tick failed for {}: {}", profile.user_id, e);
            }
        }

        info!("Executor tick complete: {}", summary);
        Ok(summary)
    }

    async fn run_profile(
        &self,
        profile: &TradingProfile,
        summary: &mut ExecutorSummary,
    ) -> Result<()> {
        // Previously approved suggestions (manual approvals included) are
        // picked up first in every mode.
        let approved = self
            .store
            .suggestions_for_user(&profile.user_id, Some(SuggestionStatus::Approved))
            .await?;
        for suggestion in &approved {
            self.try_execute(&suggestion.id, summary).await;
        }

        let pending = self
            .store
            .suggestions_for_user(&profile.user_id, Some(SuggestionStatus::Pending))
            .await?;

        match profile.mode {
            TradingMode::Observer => {
                // Not reachable through automated_profiles; counted for
                // completeness.
                summary.awaiting_approval += pending.len() as u64;
            }
            TradingMode::Approval => {
                summary.awaiting_approval += pending.len() as u64;
                if !pending.is_empty() {
                    debug!(
                        "User {} has {} suggestions awaiting manual approval",
                        profile.user_id,
                        pending.len()
                    );
                }
            }
            TradingMode::SemiAuto => {
                for suggestion in &pending {
                    if suggestion.confidence >= profile.min_confidence_threshold {
                        // Implicit approval happens inside the shared
                        // execution step.
                        self.try_execute(&suggestion.id, summary).await;
                    } else {
                        summary.below_threshold += 1;
                        debug!(
                            "Skipped {} - confidence {} below threshold {}",
                            suggestion.ticker,
                            suggestion.confidence,
                            profile.min_confidence_threshold
                        );
                    }
                }
            }
            TradingMode::FullAuto => {
                for suggestion in &pending {
                    self.try_execute(&suggestion.id, summary).await;
                }
            }
        }

        Ok(())
    }

    async fn try_execute(&self, suggestion_id: &str, summary: &mut ExecutorSummary) {
        match self.engine.execute_suggestion(suggestion_id).await {
            Ok(ExecuteOutcome::Executed(execution)) => {
                summary.executed += 1;
                info!(
                    "Executed {} {} for {}",
                    execution.side, execution.ticker, execution.user_id
                );
            }
            Ok(ExecuteOutcome::RiskDeferred(_)) | Ok(ExecuteOutcome::NotFilled(_)) => {
                summary.deferred += 1;
            }
            Ok(ExecuteOutcome::AlreadyTerminal(_)) => {}
            Err(e) => {
                summary.errors += 1;
                error!("Failed to execute {}: {}", suggestion_id, e);
            }
        }
    }
}

#[async_trait]
impl Worker for ModeExecutor {
    fn name(&self) -> &'static str {
        "executor"
    }

    async fn run_tick(&self) -> Result<String> {
        ModeExecutor::run_tick(self).await.map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockOrderRouter;
    use crate::domain::{OrderFill, TradeSignal, TradeSuggestion};
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryStore>,
        executor: ModeExecutor,
    }

    fn fixture(fill_price: Option<Decimal>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut router = MockOrderRouter::new();
        match fill_price {
            Some(price) => {
                router
                    .expect_submit_order()
                    .returning(move |_| Ok(OrderFill::filled(price)));
            }
            None => {
                router.expect_submit_order().never();
            }
        }
        let engine = Arc::new(TradingEngine::new(
            store.clone(),
            Arc::new(router),
            500,
        ));
        let executor = ModeExecutor::new(engine, store.clone());
        Fixture { store, executor }
    }

    async fn seed_profile(store: &MemoryStore, mode: TradingMode) {
        let mut profile = store.ensure_profile("user-1").await.unwrap();
        profile.mode = mode;
        store.save_profile(&profile).await.unwrap();
    }

    async fn seed_pending(store: &MemoryStore, ticker: &str, confidence: Decimal) -> String {
        let suggestion = TradeSuggestion::new(
            "user-1",
            ticker,
            TradeSignal::Buy,
            confidence,
            dec!(25),
            60,
        )
        .with_entry_price(dec!(100));
        store.insert_suggestion(&suggestion).await.unwrap();
        suggestion.id
    }

    #[tokio::test]
    async fn semi_auto_gates_on_confidence_threshold() {
        let f = fixture(Some(dec!(100)));
        seed_profile(&f.store, TradingMode::SemiAuto).await;
        let above = seed_pending(&f.store, "BTC", dec!(0.70)).await;
        let below = seed_pending(&f.store, "ETH", dec!(0.50)).await;

        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.below_threshold, 1);

        let above = f.store.get_suggestion(&above).await.unwrap().unwrap();
        assert_eq!(above.status, SuggestionStatus::Executed);
        let below = f.store.get_suggestion(&below).await.unwrap().unwrap();
        assert_eq!(below.status, SuggestionStatus::Pending);
    }

    #[tokio::test]
    async fn approval_mode_never_touches_pending() {
        let f = fixture(None);
        seed_profile(&f.store, TradingMode::Approval).await;
        seed_pending(&f.store, "BTC", dec!(0.95)).await;

        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 0);
        assert_eq!(summary.awaiting_approval, 1);
    }

    #[tokio::test]
    async fn approval_mode_picks_up_external_approvals() {
        let f = fixture(Some(dec!(100)));
        seed_profile(&f.store, TradingMode::Approval).await;
        let id = seed_pending(&f.store, "BTC", dec!(0.95)).await;
        f.store.approve_suggestion(&id).await.unwrap();

        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 1);
    }

    #[tokio::test]
    async fn full_auto_executes_everything_pending() {
        let f = fixture(Some(dec!(100)));
        seed_profile(&f.store, TradingMode::FullAuto).await;
        seed_pending(&f.store, "BTC", dec!(0.10)).await;
        seed_pending(&f.store, "ETH", dec!(0.99)).await;

        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 2);
        assert_eq!(summary.below_threshold, 0);
    }

    #[tokio::test]
    async fn kill_switch_forces_noop() {
        let f = fixture(None);
        seed_profile(&f.store, TradingMode::FullAuto).await;
        let id = seed_pending(&f.store, "BTC", dec!(0.95)).await;
        f.store.approve_suggestion(&id).await.unwrap();
        f.store.trip_kill_switch("user-1", "loss limit").await.unwrap();

        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 0);

        let suggestion = f.store.get_suggestion(&id).await.unwrap().unwrap();
        assert_eq!(suggestion.status, SuggestionStatus::Approved);
    }

    #[tokio::test]
    async fn risk_denied_suggestion_is_retried_next_tick() {
        let f = fixture(Some(dec!(100)));
        seed_profile(&f.store, TradingMode::SemiAuto).await;
        let id = seed_pending(&f.store, "BTC", dec!(0.90)).await;
        // Trip the daily loss limit so the risk gate defers execution.
        f.store
            .record_safety_metrics("user-1", dec!(-52), 0)
            .await
            .unwrap();

        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 0);
        assert_eq!(summary.deferred, 1);
        let suggestion = f.store.get_suggestion(&id).await.unwrap().unwrap();
        assert_eq!(suggestion.status, SuggestionStatus::Approved);

        // Losses recovered: the same suggestion executes on a later tick.
        f.store
            .record_safety_metrics("user-1", Decimal::ZERO, 0)
            .await
            .unwrap();
        let summary = f.executor.run_tick().await.unwrap();
        assert_eq!(summary.executed, 1);
    }
}
