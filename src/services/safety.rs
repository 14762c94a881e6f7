//! Safety Monitor: recomputes rolling loss metrics from the execution
//! ledger and trips the kill switch on breach.
//!
//! The trip is a compare-and-set on the previous flag value, so exactly one
//! tick observes the false→true edge and exactly one notification goes out
//! per newly-tripped profile.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::adapters::kill_switch_message;
use crate::config::SafetyConfig;
use crate::domain::{TradeExecution, TradingProfile};
use crate::error::Result;
use crate::store::TradingStore;

use super::{OperatorAlerts, Worker};

pub struct SafetyMonitor {
    store: Arc<dyn TradingStore>,
    alerts: Option<OperatorAlerts>,
    config: SafetyConfig,
}

#[derive(Debug, Clone, Default)]
pub struct SafetySummary {
    pub profiles_checked: usize,
    pub kill_switches_tripped: u64,
}

impl fmt::Display for SafetySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "profiles={} tripped={}",
            self.profiles_checked, self.kill_switches_tripped
        )
    }
}

/// Consecutive losses over closed executions ordered newest first, stopping
/// at the first non-losing trade
pub fn loss_streak(executions: &[TradeExecution]) -> u32 {
    let mut streak = 0;
    for execution in executions {
        match execution.realized_pnl_usd {
            Some(pnl) if pnl < Decimal::ZERO => streak += 1,
            _ => break,
        }
    }
    streak
}

fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

impl SafetyMonitor {
    pub fn new(
        store: Arc<dyn TradingStore>,
        alerts: Option<OperatorAlerts>,
        config: SafetyConfig,
    ) -> Self {
        Self {
            store,
            alerts,
            config,
        }
    }

    pub async fn run_tick(&self) -> Result<SafetySummary> {
        let profiles = self.store.active_profiles().await?;
        let mut summary = SafetySummary {
            profiles_checked: profiles.len(),
            ..Default::default()
        };

        for profile in &profiles {
            match self.check_profile(profile).await {
                Ok(true) => summary.kill_switches_tripped += 1,
                Ok(false) => {}
                Err(e) => error!("Safety check failed for {}: {}", profile.user_id, e),
            }
        }

        if summary.kill_switches_tripped > 0 {
            warn!("Safety tick complete: {}", summary);
        } else {
            info!("Safety tick complete: {}", summary);
        }
        Ok(summary)
    }

    /// Recompute loss metrics for one profile and trip the kill switch on
    /// breach. Returns whether this tick newly tripped the switch.
    async fn check_profile(&self, profile: &TradingProfile) -> Result<bool> {
        let day_start = utc_day_start(Utc::now());
        let todays = self
            .store
            .closed_executions_since(&profile.user_id, day_start)
            .await?;
        let daily_profit_loss: Decimal = todays
            .iter()
            .filter_map(|e| e.realized_pnl_usd)
            .sum();

        let recent = self
            .store
            .recent_closed_executions(&profile.user_id, self.config.streak_lookback)
            .await?;
        let consecutive_losses = loss_streak(&recent);

        self.store
            .record_safety_metrics(&profile.user_id, daily_profit_loss, consecutive_losses)
            .await?;

        let reason = if daily_profit_loss < Decimal::ZERO
            && daily_profit_loss.abs() >= profile.daily_loss_limit_usd
        {
            Some(format!(
                "Daily loss limit exceeded: ${} (limit ${})",
                daily_profit_loss.abs(),
                profile.daily_loss_limit_usd
            ))
        } else if profile.stop_after_losses > 0
            && consecutive_losses >= profile.stop_after_losses
        {
            Some(format!(
                "{} consecutive losses (limit {})",
                consecutive_losses, profile.stop_after_losses
            ))
        } else {
            None
        };

        let Some(reason) = reason else {
            return Ok(false);
        };

        // Only the write that flips false→true notifies; an already-tripped
        // profile stays silent on later ticks.
        if !self.store.trip_kill_switch(&profile.user_id, &reason).await? {
            return Ok(false);
        }

        warn!(
            "KILL SWITCH ACTIVATED for user {}: {}",
            profile.user_id, reason
        );
        if let Some(alerts) = &self.alerts {
            alerts
                .send(&kill_switch_message(&profile.user_id, &reason))
                .await;
        }
        Ok(true)
    }
}

#[async_trait]
impl Worker for SafetyMonitor {
    fn name(&self) -> &'static str {
        "safety"
    }

    async fn run_tick(&self) -> Result<String> {
        SafetyMonitor::run_tick(self).await.map(|s| s.to_string())
    }
}
