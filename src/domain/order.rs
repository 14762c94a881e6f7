use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order submitted to the external router.
///
/// `idempotency_key` is the suggestion id, so a retried submission after a
/// transport failure cannot double-fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    pub idempotency_key: String,
    pub user_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub size_usd: Decimal,
    /// Price the signal was generated at; a hint for the router, not a limit
    pub entry_price_hint: Option<Decimal>,
}

/// Router response for a submitted order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFill {
    pub filled: bool,
    pub executed_price: Option<Decimal>,
    pub error: Option<String>,
}

impl OrderFill {
    pub fn filled(price: Decimal) -> Self {
        Self {
            filled: true,
            executed_price: Some(price),
            error: None,
        }
    }

    pub fn unfilled(error: impl Into<String>) -> Self {
        Self {
            filled: false,
            executed_price: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fill_constructors() {
        let fill = OrderFill::filled(dec!(101.5));
        assert!(fill.filled);
        assert_eq!(fill.executed_price, Some(dec!(101.5)));

        let miss = OrderFill::unfilled("no liquidity");
        assert!(!miss.filled);
        assert_eq!(miss.error.as_deref(), Some("no liquidity"));
    }
}
