//! Expiry Sweeper: time-bounds the approval window of pending suggestions.
//!
//! Approved and terminal suggestions are never touched. Idempotent by
//! construction: a re-run finds nothing left to expire.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::TradingStore;

use super::Worker;

pub struct ExpirySweeper {
    store: Arc<dyn TradingStore>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn TradingStore>) -> Self {
        Self { store }
    }

    pub async fn run_tick(&self) -> Result<u64> {
        let expired = self.store.expire_overdue_suggestions(Utc::now()).await?;
        if expired > 0 {
            info!("Expired {} overdue pending suggestions", expired);
        } else {
            debug!("No overdue pending suggestions");
        }
        Ok(expired)
    }
}

#[async_trait]
impl Worker for ExpirySweeper {
    fn name(&self) -> &'static str {
        "expiry"
    }

    async fn run_tick(&self) -> Result<String> {
        ExpirySweeper::run_tick(self)
            .await
            .map(|n| format!("expired={n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SuggestionStatus, TradeSignal, TradeSuggestion};
    use crate::store::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn sweeps_only_overdue_pending() {
        let store = Arc::new(MemoryStore::new());

        // Overdue pending.
        let mut overdue =
            TradeSuggestion::new("user-1", "BTC", TradeSignal::Buy, dec!(0.8), dec!(25), 60);
        overdue.expires_at = Utc::now() - Duration::minutes(5);
        store.insert_suggestion(&overdue).await.unwrap();

        // Overdue but approved: must survive.
        let mut approved =
            TradeSuggestion::new("user-1", "ETH", TradeSignal::Buy, dec!(0.8), dec!(25), 60);
        approved.expires_at = Utc::now() - Duration::minutes(5);
        store.insert_suggestion(&approved).await.unwrap();
        store.approve_suggestion(&approved.id).await.unwrap();

        // Fresh pending: must survive.
        let fresh =
            TradeSuggestion::new("user-1", "SOL", TradeSignal::Buy, dec!(0.8), dec!(25), 60);
        store.insert_suggestion(&fresh).await.unwrap();

        let sweeper = ExpirySweeper::new(store.clone());
        assert_eq!(sweeper.run_tick().await.unwrap(), 1);

        let statuses: Vec<_> = store
            .suggestions_for_user("user-1", None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.ticker, s.status))
            .collect();
        assert!(statuses.contains(&("BTC".into(), SuggestionStatus::Expired)));
        assert!(statuses.contains(&("ETH".into(), SuggestionStatus::Approved)));
        assert!(statuses.contains(&("SOL".into(), SuggestionStatus::Pending)));

        // Second pass is a no-op.
        assert_eq!(sweeper.run_tick().await.unwrap(), 0);
    }
}
