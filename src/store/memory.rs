//! In-memory storage adapter.
//!
//! Backs dry-run mode and tests. A single lock over the whole state keeps
//! the compare-and-set semantics of the trait identical to the PostgreSQL
//! adapter: a transition only wins if the row is still in the expected
//! prior state at write time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::{
    Milestone, SuggestionStatus, TradeExecution, TradeSuggestion, TradingMode, TradingProfile,
};
use crate::error::Result;

use super::TradingStore;

#[derive(Default)]
struct State {
    profiles: HashMap<String, TradingProfile>,
    suggestions: HashMap<String, TradeSuggestion>,
    executions: HashMap<String, TradeExecution>,
    milestones: HashMap<String, Milestone>,
}

/// In-memory storage adapter for dry-run operation and tests
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradingStore for MemoryStore {
    // ==================== Profiles ====================

    async fn ensure_profile(&self, user_id: &str) -> Result<TradingProfile> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| TradingProfile::new(user_id));
        Ok(profile.clone())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<TradingProfile>> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn save_profile(&self, profile: &TradingProfile) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.profiles.get_mut(&profile.user_id) {
            existing.mode = profile.mode;
            existing.min_confidence_threshold = profile.min_confidence_threshold;
            existing.max_position_size_usd = profile.max_position_size_usd;
            existing.daily_loss_limit_usd = profile.daily_loss_limit_usd;
            existing.max_open_positions = profile.max_open_positions;
            existing.stop_after_losses = profile.stop_after_losses;
            existing.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn automated_profiles(&self) -> Result<Vec<TradingProfile>> {
        let state = self.state.read().await;
        let mut profiles: Vec<_> = state
            .profiles
            .values()
            .filter(|p| p.active && p.mode != TradingMode::Observer)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(profiles)
    }

    async fn active_profiles(&self) -> Result<Vec<TradingProfile>> {
        let state = self.state.read().await;
        let mut profiles: Vec<_> = state
            .profiles
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(profiles)
    }

    async fn trip_kill_switch(&self, user_id: &str, reason: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.profiles.get_mut(user_id) {
            Some(profile) if !profile.kill_switch_active => {
                profile.kill_switch_active = true;
                profile.kill_switch_reason = Some(reason.to_string());
                profile.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_kill_switch(&self, user_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(user_id) {
            profile.kill_switch_active = false;
            profile.kill_switch_reason = None;
            profile.consecutive_losses = 0;
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_safety_metrics(
        &self,
        user_id: &str,
        daily_profit_loss: Decimal,
        consecutive_losses: u32,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(user_id) {
            profile.daily_profit_loss = daily_profit_loss;
            profile.consecutive_losses = consecutive_losses;
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_full_auto_unlocked(&self, user_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(user_id) {
            profile.full_auto_unlocked = true;
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn deactivate_profile(&self, user_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(user_id) {
            profile.active = false;
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    // ==================== Suggestions ====================

    async fn insert_suggestion(&self, suggestion: &TradeSuggestion) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .suggestions
            .insert(suggestion.id.clone(), suggestion.clone());
        Ok(())
    }

    async fn get_suggestion(&self, id: &str) -> Result<Option<TradeSuggestion>> {
        Ok(self.state.read().await.suggestions.get(id).cloned())
    }

    async fn suggestions_for_user(
        &self,
        user_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<TradeSuggestion>> {
        let state = self.state.read().await;
        let mut suggestions: Vec<_> = state
            .suggestions
            .values()
            .filter(|s| s.user_id == user_id && status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        suggestions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(suggestions)
    }

    async fn has_open_suggestion(&self, user_id: &str, ticker: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .suggestions
            .values()
            .any(|s| s.user_id == user_id && s.ticker == ticker && s.status.is_open()))
    }

    async fn approve_suggestion(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.suggestions.get_mut(id) {
            Some(s) if s.status == SuggestionStatus::Pending => {
                s.status = SuggestionStatus::Approved;
                s.approved_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reject_suggestion(&self, id: &str, reason: Option<&str>) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.suggestions.get_mut(id) {
            Some(s) if s.status == SuggestionStatus::Pending => {
                s.status = SuggestionStatus::Rejected;
                s.rejected_at = Some(Utc::now());
                if let Some(reason) = reason {
                    s.rationale = Some(format!("Rejected: {reason}"));
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_executed(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.suggestions.get_mut(id) {
            Some(s) if s.status == SuggestionStatus::Approved => {
                s.status = SuggestionStatus::Executed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_overdue_suggestions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut expired = 0;
        for suggestion in state.suggestions.values_mut() {
            if suggestion.is_overdue(now) {
                suggestion.status = SuggestionStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    // ==================== Executions ====================

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .executions
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Option<TradeExecution>> {
        Ok(self.state.read().await.executions.get(id).cloned())
    }

    async fn open_position_count(&self, user_id: &str) -> Result<u32> {
        let state = self.state.read().await;
        Ok(state
            .executions
            .values()
            .filter(|e| e.user_id == user_id && e.is_open())
            .count() as u32)
    }

    async fn close_execution(
        &self,
        id: &str,
        exit_price: Decimal,
        realized_pnl_usd: Decimal,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.executions.get_mut(id) {
            Some(execution) if execution.is_open() => {
                execution.exit_price = Some(exit_price);
                execution.realized_pnl_usd = Some(realized_pnl_usd);
                execution.closed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn closed_executions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TradeExecution>> {
        let state = self.state.read().await;
        let mut executions: Vec<_> = state
            .executions
            .values()
            .filter(|e| e.user_id == user_id && e.closed_at.map_or(false, |at| at >= since))
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        Ok(executions)
    }

    async fn recent_closed_executions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<TradeExecution>> {
        let state = self.state.read().await;
        let mut executions: Vec<_> = state
            .executions
            .values()
            .filter(|e| e.user_id == user_id && e.closed_at.is_some())
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        executions.truncate(limit as usize);
        Ok(executions)
    }

    // ==================== Milestones ====================

    async fn ensure_milestone(&self, name: &str, target_value: i64) -> Result<Milestone> {
        let mut state = self.state.write().await;
        let milestone = state
            .milestones
            .entry(name.to_string())
            .or_insert_with(|| Milestone::new(name, target_value));
        Ok(milestone.clone())
    }

    async fn get_milestone(&self, name: &str) -> Result<Option<Milestone>> {
        Ok(self.state.read().await.milestones.get(name).cloned())
    }

    async fn record_milestone_progress(&self, name: &str, current_value: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(milestone) = state.milestones.get_mut(name) {
            milestone.current_value = milestone.current_value.max(current_value);
            milestone.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_milestone(&self, name: &str, current_value: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.milestones.get_mut(name) {
            Some(m) if !m.is_completed && current_value >= m.target_value => {
                m.current_value = m.current_value.max(current_value);
                m.is_completed = true;
                m.completed_at = Some(Utc::now());
                m.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
