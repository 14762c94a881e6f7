//! Core trading engine: the API surface exposed to the surrounding
//! application, plus the shared execution step used by the Mode Executor.

pub mod risk;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::OrderRouter;
use crate::domain::{
    Milestone, OrderTicket, ProfilePatch, SuggestionStatus, TradeExecution, TradeSuggestion,
    TradingMode, TradingProfile, FULL_AUTO_MILESTONE,
};
use crate::error::{EngineError, Result};
use crate::store::TradingStore;

pub use risk::{check_risk_limits, RiskDecision};

/// Outcome of one execution attempt on a suggestion.
///
/// Only `Executed` is terminal; every other variant leaves the suggestion
/// retryable on a later tick or call.
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// Order filled; the suggestion transitioned to executed
    Executed(TradeExecution),
    /// Risk Engine denied; the suggestion stays approved
    RiskDeferred(String),
    /// Router answered but did not fill; the suggestion stays approved
    NotFilled(String),
    /// The suggestion was already in a terminal state (idempotent no-op)
    AlreadyTerminal(SuggestionStatus),
}

/// Per-user activity summary for the application surface
#[derive(Debug, Clone, Serialize)]
pub struct TradingStats {
    pub pending_suggestions: usize,
    pub approved_suggestions: usize,
    pub open_positions: u32,
    pub daily_profit_loss: Decimal,
    pub consecutive_losses: u32,
    pub kill_switch_active: bool,
}

/// Orchestration core shared by the API surface and the background workers
pub struct TradingEngine {
    store: Arc<dyn TradingStore>,
    router: Arc<dyn OrderRouter>,
    milestone_target: i64,
}

impl TradingEngine {
    pub fn new(
        store: Arc<dyn TradingStore>,
        router: Arc<dyn OrderRouter>,
        milestone_target: i64,
    ) -> Self {
        Self {
            store,
            router,
            milestone_target,
        }
    }

    pub fn store(&self) -> &Arc<dyn TradingStore> {
        &self.store
    }

    // ==================== Profiles ====================

    /// Fetch the user's profile, creating it with defaults on first access
    pub async fn profile(&self, user_id: &str) -> Result<TradingProfile> {
        self.store.ensure_profile(user_id).await
    }

    /// Apply a configuration patch, enforcing the full-auto unlock gate
    pub async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<TradingProfile> {
        let mut profile = self.store.ensure_profile(user_id).await?;

        if let Some(mode) = patch.mode {
            if !profile.can_set_mode(mode) {
                return Err(EngineError::Validation(
                    "Full Auto mode is locked. Complete the milestone requirements first."
                        .to_string(),
                ));
            }
        }

        profile.apply(patch);
        self.store.save_profile(&profile).await?;
        info!("Profile {} updated (mode: {})", user_id, profile.mode);
        Ok(profile)
    }

    /// Explicit mode change, rejecting full_auto while locked
    pub async fn set_mode(&self, user_id: &str, mode: TradingMode) -> Result<TradingProfile> {
        self.update_profile(
            user_id,
            &ProfilePatch {
                mode: Some(mode),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn deactivate_profile(&self, user_id: &str) -> Result<()> {
        self.store.deactivate_profile(user_id).await
    }

    // ==================== Suggestions ====================

    pub async fn suggestions(
        &self,
        user_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<TradeSuggestion>> {
        self.store.suggestions_for_user(user_id, status).await
    }

    async fn suggestion_or_not_found(&self, id: &str) -> Result<TradeSuggestion> {
        self.store
            .get_suggestion(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("suggestion {id}")))
    }

    /// Approve a pending suggestion. Idempotent: a suggestion already out of
    /// pending is returned unchanged rather than erroring.
    pub async fn approve_suggestion(&self, id: &str) -> Result<TradeSuggestion> {
        if self.store.approve_suggestion(id).await? {
            info!("Suggestion {} approved", id);
        }
        self.suggestion_or_not_found(id).await
    }

    /// Reject a pending suggestion. Idempotent like approval.
    pub async fn reject_suggestion(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<TradeSuggestion> {
        if self.store.reject_suggestion(id, reason).await? {
            info!("Suggestion {} rejected", id);
        }
        self.suggestion_or_not_found(id).await
    }

    // ==================== Execution ====================

    /// Shared execution step for a suggestion.
    ///
    /// A pending suggestion is implicitly approved first; the Risk Engine is
    /// consulted immediately before submission. Risk denial and unfilled
    /// router responses leave the suggestion approved so the next tick
    /// retries; a router transport failure propagates as a transient error
    /// with the same effect.
    pub async fn execute_suggestion(&self, id: &str) -> Result<ExecuteOutcome> {
        let mut suggestion = self.suggestion_or_not_found(id).await?;

        if suggestion.status == SuggestionStatus::Pending {
            // Implicit approval; losing the CAS just means someone else
            // decided first, so re-read and fall through.
            self.store.approve_suggestion(id).await?;
            suggestion = self.suggestion_or_not_found(id).await?;
        }

        match suggestion.status {
            SuggestionStatus::Approved => {}
            status => return Ok(ExecuteOutcome::AlreadyTerminal(status)),
        }

        let profile = self.store.ensure_profile(&suggestion.user_id).await?;
        let open_positions = self.store.open_position_count(&suggestion.user_id).await?;
        let decision = check_risk_limits(&profile, open_positions, suggestion.suggested_size_usd);

        if !decision.allowed {
            let reason = decision.reason.unwrap_or_default();
            warn!("Risk check failed for {}: {}", id, reason);
            return Ok(ExecuteOutcome::RiskDeferred(reason));
        }

        let ticket = OrderTicket {
            idempotency_key: suggestion.id.clone(),
            user_id: suggestion.user_id.clone(),
            ticker: suggestion.ticker.clone(),
            side: suggestion.signal.side(),
            size_usd: suggestion.suggested_size_usd,
            entry_price_hint: suggestion.entry_price,
        };

        let fill = self.router.submit_order(&ticket).await?;

        if !fill.filled {
            let reason = fill.error.unwrap_or_else(|| "router did not fill".to_string());
            warn!("Order for {} not filled: {}", id, reason);
            return Ok(ExecuteOutcome::NotFilled(reason));
        }

        // The CAS decides the winner; the router's idempotency key already
        // guards against a double fill on the exchange side.
        if !self.store.mark_executed(id).await? {
            let current = self.suggestion_or_not_found(id).await?;
            return Ok(ExecuteOutcome::AlreadyTerminal(current.status));
        }

        let executed_price = fill
            .executed_price
            .or(suggestion.entry_price)
            .unwrap_or(Decimal::ZERO);
        let execution = TradeExecution::from_fill(&suggestion, executed_price);
        self.store.insert_execution(&execution).await?;

        info!(
            "Trade executed: {} - {} {} ${}",
            execution.id, execution.side, execution.ticker, execution.size_usd
        );
        Ok(ExecuteOutcome::Executed(execution))
    }

    /// Record the exit of an open position; feeds the safety metrics
    pub async fn close_execution(
        &self,
        id: &str,
        exit_price: Decimal,
    ) -> Result<TradeExecution> {
        let execution = self
            .store
            .get_execution(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("execution {id}")))?;

        let pnl = execution.pnl_at(exit_price);
        if !self.store.close_execution(id, exit_price, pnl).await? {
            return Err(EngineError::Validation(format!(
                "Execution {id} is already closed"
            )));
        }

        info!("Trade closed: {} - PnL: ${}", id, pnl);
        self.store
            .get_execution(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("execution {id}")))
    }

    // ==================== Safety ====================

    /// Dry-run risk check for UI preview
    pub async fn check_risk(&self, user_id: &str, trade_size_usd: Decimal) -> Result<RiskDecision> {
        let profile = self.store.ensure_profile(user_id).await?;
        let open_positions = self.store.open_position_count(user_id).await?;
        Ok(check_risk_limits(&profile, open_positions, trade_size_usd))
    }

    pub async fn trigger_kill_switch(
        &self,
        user_id: &str,
        reason: &str,
    ) -> Result<TradingProfile> {
        self.store.ensure_profile(user_id).await?;
        if self.store.trip_kill_switch(user_id, reason).await? {
            warn!("KILL SWITCH ACTIVATED for user {}: {}", user_id, reason);
        }
        self.store.ensure_profile(user_id).await
    }

    pub async fn reset_kill_switch(&self, user_id: &str) -> Result<TradingProfile> {
        self.store.ensure_profile(user_id).await?;
        self.store.reset_kill_switch(user_id).await?;
        info!("Kill switch reset for user {}", user_id);
        self.store.ensure_profile(user_id).await
    }

    // ==================== Stats ====================

    pub async fn stats(&self, user_id: &str) -> Result<TradingStats> {
        let profile = self.store.ensure_profile(user_id).await?;
        let pending = self
            .store
            .suggestions_for_user(user_id, Some(SuggestionStatus::Pending))
            .await?;
        let approved = self
            .store
            .suggestions_for_user(user_id, Some(SuggestionStatus::Approved))
            .await?;
        let open_positions = self.store.open_position_count(user_id).await?;

        Ok(TradingStats {
            pending_suggestions: pending.len(),
            approved_suggestions: approved.len(),
            open_positions,
            daily_profit_loss: profile.daily_profit_loss,
            consecutive_losses: profile.consecutive_losses,
            kill_switch_active: profile.kill_switch_active,
        })
    }

    // ==================== Milestones ====================

    pub async fn milestone(&self) -> Result<Milestone> {
        self.store
            .ensure_milestone(FULL_AUTO_MILESTONE, self.milestone_target)
            .await
    }

    /// User-initiated unlock of the highest autonomy tier. Fails while the
    /// milestone is incomplete; never changes the profile's mode.
    pub async fn unlock_full_auto(&self, user_id: &str) -> Result<TradingProfile> {
        let milestone = self.milestone().await?;
        if !milestone.is_completed {
            return Err(EngineError::Validation(format!(
                "Cannot unlock Full Auto. Need {} more evaluated outcomes.",
                milestone.remaining()
            )));
        }

        self.store.ensure_profile(user_id).await?;
        self.store.mark_full_auto_unlocked(user_id).await?;
        info!("Full Auto unlocked for user {}", user_id);
        self.store.ensure_profile(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockOrderRouter;
    use crate::domain::{OrderFill, TradeSignal};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn engine_with_router(router: MockOrderRouter) -> TradingEngine {
        TradingEngine::new(Arc::new(MemoryStore::new()), Arc::new(router), 500)
    }

    async fn seed_suggestion(engine: &TradingEngine, status: SuggestionStatus) -> TradeSuggestion {
        engine.profile("user-1").await.unwrap();
        let suggestion = TradeSuggestion::new(
            "user-1",
            "BTC",
            TradeSignal::Buy,
            dec!(0.8),
            dec!(50),
            60,
        )
        .with_entry_price(dec!(64000));
        engine.store().insert_suggestion(&suggestion).await.unwrap();
        if status == SuggestionStatus::Approved {
            engine.store().approve_suggestion(&suggestion.id).await.unwrap();
        }
        engine.store().get_suggestion(&suggestion.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn execute_fills_and_records_execution() {
        let mut router = MockOrderRouter::new();
        router
            .expect_submit_order()
            .returning(|_| Ok(OrderFill::filled(dec!(64100))));
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Approved).await;

        let outcome = engine.execute_suggestion(&suggestion.id).await.unwrap();
        let execution = match outcome {
            ExecuteOutcome::Executed(execution) => execution,
            other => panic!("expected Executed, got {other:?}"),
        };
        assert_eq!(execution.executed_price, dec!(64100));

        let stored = engine
            .store()
            .get_suggestion(&suggestion.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SuggestionStatus::Executed);
        assert_eq!(engine.store().open_position_count("user-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn execute_performs_implicit_approval_from_pending() {
        let mut router = MockOrderRouter::new();
        router
            .expect_submit_order()
            .returning(|_| Ok(OrderFill::filled(dec!(64000))));
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Pending).await;

        let outcome = engine.execute_suggestion(&suggestion.id).await.unwrap();
        assert!(matches!(outcome, ExecuteOutcome::Executed(_)));
    }

    #[tokio::test]
    async fn risk_denial_leaves_suggestion_approved() {
        let mut router = MockOrderRouter::new();
        router.expect_submit_order().never();
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Approved).await;

        engine
            .store()
            .record_safety_metrics("user-1", dec!(-52), 0)
            .await
            .unwrap();

        let outcome = engine.execute_suggestion(&suggestion.id).await.unwrap();
        assert!(matches!(outcome, ExecuteOutcome::RiskDeferred(_)));

        let stored = engine
            .store()
            .get_suggestion(&suggestion.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SuggestionStatus::Approved);
    }

    #[tokio::test]
    async fn transport_failure_leaves_suggestion_approved() {
        let mut router = MockOrderRouter::new();
        router
            .expect_submit_order()
            .returning(|_| Err(EngineError::OrderSubmission("gateway timeout".into())));
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Approved).await;

        let err = engine.execute_suggestion(&suggestion.id).await.unwrap_err();
        assert!(err.is_transient());

        let stored = engine
            .store()
            .get_suggestion(&suggestion.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SuggestionStatus::Approved);
    }

    #[tokio::test]
    async fn executing_terminal_suggestion_is_a_noop() {
        let mut router = MockOrderRouter::new();
        router
            .expect_submit_order()
            .returning(|_| Ok(OrderFill::filled(dec!(64000))));
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Approved).await;

        engine.execute_suggestion(&suggestion.id).await.unwrap();
        let again = engine.execute_suggestion(&suggestion.id).await.unwrap();
        assert!(matches!(
            again,
            ExecuteOutcome::AlreadyTerminal(SuggestionStatus::Executed)
        ));
        // No duplicate execution was recorded.
        assert_eq!(engine.store().open_position_count("user-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn approve_and_reject_are_idempotent() {
        let router = MockOrderRouter::new();
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Pending).await;

        let approved = engine.approve_suggestion(&suggestion.id).await.unwrap();
        assert_eq!(approved.status, SuggestionStatus::Approved);

        // Re-approving reports the current state.
        let again = engine.approve_suggestion(&suggestion.id).await.unwrap();
        assert_eq!(again.status, SuggestionStatus::Approved);

        // Rejecting an approved suggestion is a no-op, not an error.
        let rejected = engine
            .reject_suggestion(&suggestion.id, Some("changed my mind"))
            .await
            .unwrap();
        assert_eq!(rejected.status, SuggestionStatus::Approved);
    }

    #[tokio::test]
    async fn full_auto_mode_requires_unlock() {
        let router = MockOrderRouter::new();
        let engine = engine_with_router(router);
        engine.profile("user-1").await.unwrap();

        let err = engine
            .set_mode("user-1", TradingMode::FullAuto)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        // Complete the milestone, unlock, then the mode change succeeds.
        engine.milestone().await.unwrap();
        engine
            .store()
            .complete_milestone(FULL_AUTO_MILESTONE, 500)
            .await
            .unwrap();
        engine.unlock_full_auto("user-1").await.unwrap();
        let profile = engine
            .set_mode("user-1", TradingMode::FullAuto)
            .await
            .unwrap();
        assert_eq!(profile.mode, TradingMode::FullAuto);
    }

    #[tokio::test]
    async fn unlock_fails_while_milestone_incomplete() {
        let router = MockOrderRouter::new();
        let engine = engine_with_router(router);

        let err = engine.unlock_full_auto("user-1").await.unwrap_err();
        match err {
            EngineError::Validation(msg) => assert!(msg.contains("500 more")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_execution_records_pnl_once() {
        let mut router = MockOrderRouter::new();
        router
            .expect_submit_order()
            .returning(|_| Ok(OrderFill::filled(dec!(100))));
        let engine = engine_with_router(router);
        let suggestion = seed_suggestion(&engine, SuggestionStatus::Approved).await;

        let outcome = engine.execute_suggestion(&suggestion.id).await.unwrap();
        let execution = match outcome {
            ExecuteOutcome::Executed(execution) => execution,
            other => panic!("expected Executed, got {other:?}"),
        };

        let closed = engine.close_execution(&execution.id, dec!(90)).await.unwrap();
        assert_eq!(closed.realized_pnl_usd, Some(dec!(-5.00)));
        assert!(engine.close_execution(&execution.id, dec!(95)).await.is_err());
    }

    #[tokio::test]
    async fn kill_switch_reset_clears_losses() {
        let router = MockOrderRouter::new();
        let engine = engine_with_router(router);
        engine.profile("user-1").await.unwrap();
        engine
            .store()
            .record_safety_metrics("user-1", dec!(-10), 3)
            .await
            .unwrap();

        let tripped = engine
            .trigger_kill_switch("user-1", "3 consecutive losses")
            .await
            .unwrap();
        assert!(tripped.kill_switch_active);

        let reset = engine.reset_kill_switch("user-1").await.unwrap();
        assert!(!reset.kill_switch_active);
        assert!(reset.kill_switch_reason.is_none());
        assert_eq!(reset.consecutive_losses, 0);
    }
}
