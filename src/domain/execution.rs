use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderSide;
use super::suggestion::TradeSuggestion;

/// Record of a filled trade, created only by successful execution.
///
/// An execution with `closed_at == None` is an open position. Outcome
/// reconciliation closes it with an exit price, and the Safety Monitor reads
/// the resulting realized PnL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub id: String,
    /// Exclusive 1:1 link back to the suggestion that produced this fill
    pub suggestion_id: String,
    pub user_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub size_usd: Decimal,
    pub executed_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub realized_pnl_usd: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TradeExecution {
    /// Build the execution record for a filled suggestion
    pub fn from_fill(suggestion: &TradeSuggestion, executed_price: Decimal) -> Self {
        Self {
            id: format!("exec_{}", Uuid::new_v4()),
            suggestion_id: suggestion.id.clone(),
            user_id: suggestion.user_id.clone(),
            ticker: suggestion.ticker.clone(),
            side: suggestion.signal.side(),
            size_usd: suggestion.suggested_size_usd,
            executed_price,
            exit_price: None,
            realized_pnl_usd: None,
            executed_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Realized PnL if the position were closed at `exit_price`
    pub fn pnl_at(&self, exit_price: Decimal) -> Decimal {
        if self.executed_price.is_zero() {
            return Decimal::ZERO;
        }
        let pct = match self.side {
            OrderSide::Buy => (exit_price - self.executed_price) / self.executed_price,
            OrderSide::Sell => (self.executed_price - exit_price) / self.executed_price,
        };
        (self.size_usd * pct).round_dp(2)
    }
}
