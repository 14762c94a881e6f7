//! Risk Engine: a pure decision function over profile safety state.
//!
//! Called immediately before every execution attempt and never cached,
//! because safety state can change between suggestion creation and
//! execution. Given identical inputs the decision is identical.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::TradingProfile;

/// Allow/deny verdict with a user-visible reason on denial
#[derive(Debug, Clone, Serialize)]
pub struct RiskDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl RiskDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check whether a trade of `trade_size_usd` may execute for this profile.
///
/// `open_positions` is the current count of unclosed executions; the trade
/// under consideration counts against `max_open_positions` as one more.
pub fn check_risk_limits(
    profile: &TradingProfile,
    open_positions: u32,
    trade_size_usd: Decimal,
) -> RiskDecision {
    if profile.kill_switch_active {
        return RiskDecision::deny("Kill switch is active");
    }

    if trade_size_usd <= Decimal::ZERO {
        return RiskDecision::deny(format!(
            "Trade size ${trade_size_usd} must be positive"
        ));
    }

    if trade_size_usd > profile.max_position_size_usd {
        return RiskDecision::deny(format!(
            "Trade size ${} exceeds max position ${}",
            trade_size_usd, profile.max_position_size_usd
        ));
    }

    if profile.daily_profit_loss < Decimal::ZERO
        && profile.daily_profit_loss.abs() >= profile.daily_loss_limit_usd
    {
        return RiskDecision::deny(format!(
            "Daily loss limit reached: ${} / ${}",
            profile.daily_profit_loss.abs(),
            profile.daily_loss_limit_usd
        ));
    }

    if open_positions + 1 > profile.max_open_positions {
        return RiskDecision::deny(format!(
            "Already have {} open positions (max: {})",
            open_positions, profile.max_open_positions
        ));
    }

    RiskDecision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn profile() -> TradingProfile {
        TradingProfile::new("user-1")
    }

    #[test]
    fn allows_within_limits() {
        let decision = check_risk_limits(&profile(), 0, dec!(25));
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn kill_switch_denies_everything() {
        let mut p = profile();
        p.kill_switch_active = true;
        let decision = check_risk_limits(&p, 0, dec!(1));
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("Kill switch is active"));
    }

    #[test]
    fn non_positive_size_denied() {
        assert!(!check_risk_limits(&profile(), 0, Decimal::ZERO).allowed);
        assert!(!check_risk_limits(&profile(), 0, dec!(-5)).allowed);
    }

    #[test]
    fn oversized_trade_denied() {
        // Default max position size is $100.
        assert!(!check_risk_limits(&profile(), 0, dec!(150)).allowed);
        assert!(check_risk_limits(&profile(), 0, dec!(100)).allowed);
    }

    #[test]
    fn daily_loss_limit_denies_any_positive_size() {
        let mut p = profile();
        p.daily_loss_limit_usd = dec!(50);
        p.daily_profit_loss = dec!(-52);

        for size in [dec!(0.01), dec!(1), dec!(100)] {
            let decision = check_risk_limits(&p, 0, size);
            assert!(!decision.allowed);
            assert!(decision.reason.as_deref().unwrap().contains("Daily loss limit"));
        }

        // Exactly at the limit also denies.
        p.daily_profit_loss = dec!(-50);
        assert!(!check_risk_limits(&p, 0, dec!(10)).allowed);

        // A positive day never trips the loss limit.
        p.daily_profit_loss = dec!(75);
        assert!(check_risk_limits(&p, 0, dec!(10)).allowed);
    }

    #[test]
    fn projected_exposure_respects_max_open_positions() {
        let p = profile(); // max_open_positions = 3
        assert!(check_risk_limits(&p, 2, dec!(10)).allowed);
        let decision = check_risk_limits(&p, 3, dec!(10));
        assert!(!decision.allowed);
        assert!(decision.reason.as_deref().unwrap().contains("open positions"));
    }

    #[test]
    fn decision_is_deterministic() {
        let mut p = profile();
        p.daily_profit_loss = dec!(-52);
        let first = check_risk_limits(&p, 1, dec!(10));
        let second = check_risk_limits(&p, 1, dec!(10));
        assert_eq!(first.allowed, second.allowed);
        assert_eq!(first.reason, second.reason);
    }
}
