//! Signal Curator: turns high-confidence external signals into pending
//! trade suggestions.
//!
//! This worker only proposes; it never approves or executes. Re-running a
//! tick against an unchanged signal set creates nothing new, because a
//! non-terminal suggestion already exists for each (user, ticker) pair.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::adapters::SignalSource;
use crate::config::CuratorConfig;
use crate::domain::{Prediction, TradeSuggestion, TradingProfile};
use crate::error::Result;
use crate::store::TradingStore;

use super::Worker;

pub struct SignalCurator {
    store: Arc<dyn TradingStore>,
    signals: Arc<dyn SignalSource>,
    config: CuratorConfig,
}

#[derive(Debug, Clone, Default)]
pub struct CuratorSummary {
    pub profiles_checked: usize,
    pub predictions_fetched: usize,
    pub suggestions_created: u64,
}

impl fmt::Display for CuratorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "profiles={} predictions={} created={}",
            self.profiles_checked, self.predictions_fetched, self.suggestions_created
        )
    }
}

impl SignalCurator {
    pub fn new(
        store: Arc<dyn TradingStore>,
        signals: Arc<dyn SignalSource>,
        config: CuratorConfig,
    ) -> Self {
        Self {
            store,
            signals,
            config,
        }
    }

    pub async fn run_tick(&self) -> Result<CuratorSummary> {
        let profiles = self.store.automated_profiles().await?;
        if profiles.is_empty() {
            debug!("No automated trading profiles, nothing to curate");
            return Ok(CuratorSummary::default());
        }

        let predictions = self
            .signals
            .list_high_confidence_predictions(self.config.min_confidence, self.config.fetch_limit)
            .await?;

        let mut summary = CuratorSummary {
            profiles_checked: profiles.len(),
            predictions_fetched: predictions.len(),
            suggestions_created: 0,
        };

        for profile in &profiles {
            // Kill switch overrides the configured mode for every worker.
            if profile.kill_switch_active {
                continue;
            }

            for prediction in &predictions {
                match self.curate_one(profile, prediction).await {
                    Ok(true) => summary.suggestions_created += 1,
                    Ok(false) => {}
                    Err(e) => warn!(
                        "Failed to create suggestion for {}/{}: {}",
                        profile.user_id, prediction.ticker, e
                    ),
                }
            }
        }

        info!(
            "Curator tick complete: created {} suggestions from {} predictions",
            summary.suggestions_created, summary.predictions_fetched
        );
        Ok(summary)
    }

    /// Propose one prediction to one profile, unless a live suggestion for
    /// the ticker already exists
    async fn curate_one(
        &self,
        profile: &TradingProfile,
        prediction: &Prediction,
    ) -> Result<bool> {
        if self
            .store
            .has_open_suggestion(&profile.user_id, &prediction.ticker)
            .await?
        {
            return Ok(false);
        }

        let rationale = match &prediction.indicator_summary {
            Some(indicators) => format!(
                "AI signal: {} with confidence {:.2}. {}",
                prediction.signal, prediction.confidence, indicators
            ),
            None => format!(
                "AI signal: {} with confidence {:.2}",
                prediction.signal, prediction.confidence
            ),
        };

        let mut suggestion = TradeSuggestion::new(
            profile.user_id.as_str(),
            prediction.ticker.as_str(),
            prediction.signal,
            prediction.confidence,
            profile.max_position_size_usd,
            self.config.approval_window_min,
        )
        .with_prediction(prediction.id.as_str())
        .with_rationale(rationale);

        if let Some(price) = prediction.price_at_prediction {
            suggestion = suggestion.with_entry_price(price);
        }

        self.store.insert_suggestion(&suggestion).await?;
        debug!(
            "Created suggestion {} for {}/{}",
            suggestion.id, profile.user_id, suggestion.ticker
        );
        Ok(true)
    }
}

#[async_trait]
impl Worker for SignalCurator {
    fn name(&self) -> &'static str {
        "curator"
    }

    async fn run_tick(&self) -> Result<String> {
        SignalCurator::run_tick(self).await.map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockSignalSource;
    use crate::domain::{SuggestionStatus, TradeSignal, TradingMode};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn prediction(id: &str, ticker: &str) -> Prediction {
        Prediction {
            id: id.to_string(),
            ticker: ticker.to_string(),
            signal: TradeSignal::Buy,
            confidence: dec!(0.85),
            price_at_prediction: Some(dec!(100)),
            indicator_summary: Some("RSI: 28.40".to_string()),
        }
    }

    async fn automated_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut profile = store.ensure_profile("user-1").await.unwrap();
        profile.mode = TradingMode::SemiAuto;
        store.save_profile(&profile).await.unwrap();
        store
    }

    #[tokio::test]
    async fn rerunning_with_same_signals_creates_nothing_new() {
        let store = automated_store().await;
        let mut signals = MockSignalSource::new();
        signals
            .expect_list_high_confidence_predictions()
            .returning(|_, _| Ok(vec![prediction("pred-1", "BTC"), prediction("pred-2", "ETH")]));

        let curator = SignalCurator::new(
            store.clone(),
            Arc::new(signals),
            CuratorConfig::default(),
        );

        let first = curator.run_tick().await.unwrap();
        assert_eq!(first.suggestions_created, 2);

        let second = curator.run_tick().await.unwrap();
        assert_eq!(second.suggestions_created, 0);

        let suggestions = store.suggestions_for_user("user-1", None).await.unwrap();
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions
            .iter()
            .all(|s| s.status == SuggestionStatus::Pending));
        assert!(suggestions
            .iter()
            .any(|s| s.rationale.as_deref().unwrap().contains("RSI")));
    }

    #[tokio::test]
    async fn kill_switched_profiles_are_skipped() {
        let store = automated_store().await;
        store.trip_kill_switch("user-1", "test").await.unwrap();

        let mut signals = MockSignalSource::new();
        signals
            .expect_list_high_confidence_predictions()
            .returning(|_, _| Ok(vec![prediction("pred-1", "BTC")]));

        let curator = SignalCurator::new(
            store.clone(),
            Arc::new(signals),
            CuratorConfig::default(),
        );

        let summary = curator.run_tick().await.unwrap();
        assert_eq!(summary.suggestions_created, 0);
    }

    #[tokio::test]
    async fn observer_profiles_are_never_curated() {
        let store = Arc::new(MemoryStore::new());
        store.ensure_profile("user-1").await.unwrap(); // defaults to observer

        let mut signals = MockSignalSource::new();
        // No automated profiles: the signal source is never queried.
        signals.expect_list_high_confidence_predictions().never();

        let curator = SignalCurator::new(
            store.clone(),
            Arc::new(signals),
            CuratorConfig::default(),
        );

        let summary = curator.run_tick().await.unwrap();
        assert_eq!(summary.profiles_checked, 0);
    }
}
