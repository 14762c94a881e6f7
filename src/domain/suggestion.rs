use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::signal::TradeSignal;

/// Trade suggestion lifecycle states.
///
/// Transitions are strictly one-way; no terminal state ever transitions
/// away from itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    /// Awaiting a lifecycle decision within the approval window
    Pending,
    /// Cleared for execution, manually or by an auto-approve path
    Approved,
    /// Declined by the user or an operator
    Rejected,
    /// Submitted to the order router and filled
    Executed,
    /// Approval window elapsed without a decision
    Expired,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
            Self::Expired => "expired",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: SuggestionStatus) -> bool {
        use SuggestionStatus::*;

        match (self, target) {
            // From Pending
            (Pending, Approved) => true, // manual or auto approval
            (Pending, Rejected) => true, // manual rejection
            (Pending, Expired) => true,  // approval window elapsed

            // From Approved
            (Approved, Executed) => true, // order filled

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Executed | Self::Expired)
    }

    /// Non-terminal states count toward the one-live-suggestion-per-ticker
    /// invariant
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SuggestionStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "executed" => Ok(Self::Executed),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown suggestion status: {}", s)),
        }
    }
}

/// A proposed trade derived from an external signal, awaiting a lifecycle
/// decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSuggestion {
    pub id: String,
    pub user_id: String,
    /// Weak reference to the external signal this was derived from
    pub prediction_id: Option<String>,
    pub ticker: String,
    pub signal: TradeSignal,
    pub confidence: Decimal,
    pub entry_price: Option<Decimal>,
    pub suggested_size_usd: Decimal,
    pub rationale: Option<String>,
    pub status: SuggestionStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TradeSuggestion {
    /// New pending suggestion with the given approval window
    pub fn new(
        user_id: impl Into<String>,
        ticker: impl Into<String>,
        signal: TradeSignal,
        confidence: Decimal,
        size_usd: Decimal,
        window_min: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("sug_{}", Uuid::new_v4()),
            user_id: user_id.into(),
            prediction_id: None,
            ticker: ticker.into().to_ascii_uppercase(),
            signal,
            confidence,
            entry_price: None,
            suggested_size_usd: size_usd,
            rationale: None,
            status: SuggestionStatus::Pending,
            approved_at: None,
            rejected_at: None,
            created_at: now,
            expires_at: now + Duration::minutes(window_min),
        }
    }

    pub fn with_prediction(mut self, prediction_id: impl Into<String>) -> Self {
        self.prediction_id = Some(prediction_id.into());
        self
    }

    pub fn with_entry_price(mut self, price: Decimal) -> Self {
        self.entry_price = Some(price);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Whether the approval window has elapsed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == SuggestionStatus::Pending && self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn valid_transitions() {
        use SuggestionStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Expired));
        assert!(Approved.can_transition_to(Executed));
    }

    #[test]
    fn terminal_states_never_leave() {
        use SuggestionStatus::*;

        for terminal in [Rejected, Executed, Expired] {
            for target in [Pending, Approved, Rejected, Executed, Expired] {
                assert!(!terminal.can_transition_to(target));
            }
        }
        // Approved may only move forward to Executed
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Expired));
    }

    #[test]
    fn status_from_str() {
        assert_eq!(
            SuggestionStatus::try_from("pending").unwrap(),
            SuggestionStatus::Pending
        );
        assert_eq!(
            SuggestionStatus::try_from("EXECUTED").unwrap(),
            SuggestionStatus::Executed
        );
        assert!(SuggestionStatus::try_from("stale").is_err());
    }

    #[test]
    fn overdue_only_while_pending() {
        let mut suggestion = TradeSuggestion::new(
            "user-1",
            "btc",
            TradeSignal::Buy,
            dec!(0.8),
            dec!(25),
            60,
        );
        assert_eq!(suggestion.ticker, "BTC");

        let later = Utc::now() + Duration::hours(2);
        assert!(suggestion.is_overdue(later));

        suggestion.status = SuggestionStatus::Approved;
        assert!(!suggestion.is_overdue(later));
    }
}
