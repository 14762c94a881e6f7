use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::order::OrderSide;

/// Direction of an AI-generated market signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSignal {
    StrongBuy,
    Buy,
    Sell,
    StrongSell,
}

impl TradeSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBuy => "STRONG_BUY",
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::StrongSell => "STRONG_SELL",
        }
    }

    /// Order side this signal routes to
    pub fn side(&self) -> OrderSide {
        match self {
            Self::StrongBuy | Self::Buy => OrderSide::Buy,
            Self::Sell | Self::StrongSell => OrderSide::Sell,
        }
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeSignal {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STRONG_BUY" => Ok(Self::StrongBuy),
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "STRONG_SELL" => Ok(Self::StrongSell),
            _ => Err(format!("Unknown signal: {}", raw)),
        }
    }
}

/// Confidence-scored prediction consumed from the external signal source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub ticker: String,
    pub signal: TradeSignal,
    /// 0–1 score used only as the semi-auto gating threshold
    pub confidence: Decimal,
    pub price_at_prediction: Option<Decimal>,
    /// Human-readable summary of the indicators behind the signal
    pub indicator_summary: Option<String>,
}
