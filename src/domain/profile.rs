use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-profile autonomy level controlling who may approve a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// Suggestions are surfaced but never approved or executed automatically
    Observer,
    /// Every suggestion awaits an explicit external approval call
    Approval,
    /// Suggestions at or above the profile confidence threshold are
    /// auto-approved and executed
    SemiAuto,
    /// Every suggestion is auto-approved unconditionally
    FullAuto,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Observer
    }
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observer => "observer",
            Self::Approval => "approval",
            Self::SemiAuto => "semi_auto",
            Self::FullAuto => "full_auto",
        }
    }

    /// Modes eligible for curation and execution work
    pub fn is_automated(&self) -> bool {
        !matches!(self, Self::Observer)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = &'static str;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "observer" => Ok(Self::Observer),
            "approval" => Ok(Self::Approval),
            "semi_auto" => Ok(Self::SemiAuto),
            "full_auto" => Ok(Self::FullAuto),
            _ => Err("invalid mode; expected observer|approval|semi_auto|full_auto"),
        }
    }
}

/// Per-user trading configuration and mutable safety state.
///
/// Owned exclusively by this subsystem. Profiles are created by idempotent
/// upsert on first access and deactivated rather than deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingProfile {
    pub user_id: String,
    pub mode: TradingMode,
    /// Confidence gate, only consulted in semi_auto
    pub min_confidence_threshold: Decimal,
    /// Default and maximum size for a single trade
    pub max_position_size_usd: Decimal,
    pub daily_loss_limit_usd: Decimal,
    pub max_open_positions: u32,
    /// Consecutive-loss cap before the kill switch trips
    pub stop_after_losses: u32,
    pub consecutive_losses: u32,
    /// Rolling realized PnL for the current UTC day
    pub daily_profit_loss: Decimal,
    pub kill_switch_active: bool,
    pub kill_switch_reason: Option<String>,
    pub full_auto_unlocked: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradingProfile {
    /// New profile with conservative defaults
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            mode: TradingMode::Observer,
            min_confidence_threshold: dec!(0.65),
            max_position_size_usd: dec!(100),
            daily_loss_limit_usd: dec!(50),
            max_open_positions: 3,
            stop_after_losses: 3,
            consecutive_losses: 0,
            daily_profit_loss: Decimal::ZERO,
            kill_switch_active: false,
            kill_switch_reason: None,
            full_auto_unlocked: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mode the workers must act under. An active kill switch overrides the
    /// configured mode entirely.
    pub fn effective_mode(&self) -> TradingMode {
        if self.kill_switch_active {
            TradingMode::Observer
        } else {
            self.mode
        }
    }

    /// Whether the requested mode may be applied to this profile
    pub fn can_set_mode(&self, mode: TradingMode) -> bool {
        mode != TradingMode::FullAuto || self.full_auto_unlocked
    }

    /// Apply a configuration patch. Mode-gate validation happens in the
    /// engine before this is called.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(threshold) = patch.min_confidence_threshold {
            self.min_confidence_threshold = threshold;
        }
        if let Some(size) = patch.max_position_size_usd {
            self.max_position_size_usd = size;
        }
        if let Some(limit) = patch.daily_loss_limit_usd {
            self.daily_loss_limit_usd = limit;
        }
        if let Some(max) = patch.max_open_positions {
            self.max_open_positions = max;
        }
        if let Some(cap) = patch.stop_after_losses {
            self.stop_after_losses = cap;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial configuration update for a profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub mode: Option<TradingMode>,
    pub min_confidence_threshold: Option<Decimal>,
    pub max_position_size_usd: Option<Decimal>,
    pub daily_loss_limit_usd: Option<Decimal>,
    pub max_open_positions: Option<u32>,
    pub stop_after_losses: Option<u32>,
}
