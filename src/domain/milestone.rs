use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the milestone gating the highest autonomy tier
pub const FULL_AUTO_MILESTONE: &str = "full_auto_unlock";

/// System-wide progress gate.
///
/// `current_value` only ever increases and `is_completed` flips permanently
/// true on the tick where the target is first reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub target_value: i64,
    pub current_value: i64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Milestone {
    pub fn new(name: impl Into<String>, target_value: i64) -> Self {
        Self {
            name: name.into(),
            target_value,
            current_value: 0,
            is_completed: false,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Completion percentage, capped at 100
    pub fn progress_pct(&self) -> f64 {
        if self.target_value <= 0 {
            return 100.0;
        }
        (self.current_value as f64 / self.target_value as f64 * 100.0).min(100.0)
    }

    pub fn remaining(&self) -> i64 {
        (self.target_value - self.current_value).max(0)
    }
}
