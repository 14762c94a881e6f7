//! Persistence seam for the trading engine.
//!
//! Every finite-state write is a compare-and-set primitive guarded by the
//! expected prior state, so any number of concurrent worker ticks can race
//! on the same row and only one transition wins.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Milestone, SuggestionStatus, TradeExecution, TradeSuggestion, TradingProfile,
};
use crate::error::Result;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait TradingStore: Send + Sync {
    // ==================== Profiles ====================

    /// Fetch the profile, creating it with defaults on first access
    /// (idempotent upsert)
    async fn ensure_profile(&self, user_id: &str) -> Result<TradingProfile>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<TradingProfile>>;

    /// Persist the full profile row
    async fn save_profile(&self, profile: &TradingProfile) -> Result<()>;

    /// Active profiles in an automated mode (anything but observer)
    async fn automated_profiles(&self) -> Result<Vec<TradingProfile>>;

    /// Every active profile, observer included
    async fn active_profiles(&self) -> Result<Vec<TradingProfile>>;

    /// Trip the kill switch. Returns true only for the write that observed
    /// the false→true edge, so callers can notify exactly once.
    async fn trip_kill_switch(&self, user_id: &str, reason: &str) -> Result<bool>;

    /// Clear the kill switch, its reason, and the consecutive-loss counter
    async fn reset_kill_switch(&self, user_id: &str) -> Result<()>;

    /// Persist recomputed daily PnL and loss streak for a profile
    async fn record_safety_metrics(
        &self,
        user_id: &str,
        daily_profit_loss: Decimal,
        consecutive_losses: u32,
    ) -> Result<()>;

    async fn mark_full_auto_unlocked(&self, user_id: &str) -> Result<()>;

    /// Profiles are deactivated, never deleted
    async fn deactivate_profile(&self, user_id: &str) -> Result<()>;

    // ==================== Suggestions ====================

    async fn insert_suggestion(&self, suggestion: &TradeSuggestion) -> Result<()>;

    async fn get_suggestion(&self, id: &str) -> Result<Option<TradeSuggestion>>;

    async fn suggestions_for_user(
        &self,
        user_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<TradeSuggestion>>;

    /// Whether a non-terminal (pending/approved) suggestion exists for the
    /// (user, ticker) pair
    async fn has_open_suggestion(&self, user_id: &str, ticker: &str) -> Result<bool>;

    /// CAS pending→approved. Returns false if the row was not pending.
    async fn approve_suggestion(&self, id: &str) -> Result<bool>;

    /// CAS pending→rejected, recording the reason. Returns false if the row
    /// was not pending.
    async fn reject_suggestion(&self, id: &str, reason: Option<&str>) -> Result<bool>;

    /// CAS approved→executed. Returns false if the row was not approved.
    async fn mark_executed(&self, id: &str) -> Result<bool>;

    /// CAS every overdue pending suggestion to expired; returns how many
    /// rows transitioned
    async fn expire_overdue_suggestions(&self, now: DateTime<Utc>) -> Result<u64>;

    // ==================== Executions ====================

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()>;

    async fn get_execution(&self, id: &str) -> Result<Option<TradeExecution>>;

    /// Count of open (unclosed) executions for the user
    async fn open_position_count(&self, user_id: &str) -> Result<u32>;

    /// CAS open→closed with exit price and realized PnL. Returns false if
    /// the execution was already closed.
    async fn close_execution(
        &self,
        id: &str,
        exit_price: Decimal,
        realized_pnl_usd: Decimal,
    ) -> Result<bool>;

    /// Closed executions for the user with `closed_at >= since`
    async fn closed_executions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TradeExecution>>;

    /// Most recently closed executions, newest first
    async fn recent_closed_executions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<TradeExecution>>;

    // ==================== Milestones ====================

    /// Fetch the milestone, creating it with the given target on first
    /// access
    async fn ensure_milestone(&self, name: &str, target_value: i64) -> Result<Milestone>;

    async fn get_milestone(&self, name: &str) -> Result<Option<Milestone>>;

    /// Advance `current_value` monotonically (a lower reading never moves it
    /// backwards)
    async fn record_milestone_progress(&self, name: &str, current_value: i64) -> Result<()>;

    /// CAS completion flip. Returns true only on the tick that first reaches
    /// the target, so callers can notify exactly once.
    async fn complete_milestone(&self, name: &str, current_value: i64) -> Result<bool>;
}
