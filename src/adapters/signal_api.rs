//! REST client for the prediction service.
//!
//! Normalizes the service's payloads into the engine's `Prediction` record
//! so curation logic stays independent of the wire shape.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::{Prediction, TradeSignal};
use crate::error::Result;

use super::traits::SignalSource;

/// HTTP adapter for the external signal source
#[derive(Clone)]
pub struct PredictionApiClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PredictionDto {
    id: String,
    ticker: String,
    signal: String,
    confidence: Decimal,
    #[serde(default)]
    price_at_prediction: Option<Decimal>,
    #[serde(default)]
    indicator_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvaluatedCountDto {
    count: i64,
}

impl PredictionApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn into_prediction(dto: PredictionDto) -> Option<Prediction> {
        // Signals with directions we cannot route (e.g. HOLD) are dropped
        // here rather than surfacing as curation errors.
        let signal: TradeSignal = dto.signal.parse().ok()?;
        Some(Prediction {
            id: dto.id,
            ticker: dto.ticker.to_ascii_uppercase(),
            signal,
            confidence: dto.confidence,
            price_at_prediction: dto.price_at_prediction,
            indicator_summary: dto.indicator_summary,
        })
    }
}

#[async_trait]
impl SignalSource for PredictionApiClient {
    async fn list_high_confidence_predictions(
        &self,
        min_confidence: Decimal,
        limit: u32,
    ) -> Result<Vec<Prediction>> {
        let url = format!("{}/predictions/high-confidence", self.base_url);
        let dtos: Vec<PredictionDto> = self
            .http
            .get(&url)
            .query(&[
                ("min_confidence", min_confidence.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let predictions: Vec<Prediction> = dtos
            .into_iter()
            .filter_map(Self::into_prediction)
            .collect();

        debug!("Fetched {} high-confidence predictions", predictions.len());
        Ok(predictions)
    }

    async fn count_evaluated_outcomes(&self) -> Result<i64> {
        let url = format!("{}/outcomes/evaluated/count", self.base_url);
        let dto: EvaluatedCountDto = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(dto.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unroutable_signals_are_dropped() {
        let dto = PredictionDto {
            id: "pred-1".into(),
            ticker: "sol".into(),
            signal: "HOLD".into(),
            confidence: dec!(0.9),
            price_at_prediction: None,
            indicator_summary: None,
        };
        assert!(PredictionApiClient::into_prediction(dto).is_none());

        let dto = PredictionDto {
            id: "pred-2".into(),
            ticker: "sol".into(),
            signal: "strong_buy".into(),
            confidence: dec!(0.9),
            price_at_prediction: Some(dec!(142.5)),
            indicator_summary: Some("RSI 28".into()),
        };
        let prediction = PredictionApiClient::into_prediction(dto).unwrap();
        assert_eq!(prediction.ticker, "SOL");
        assert_eq!(prediction.signal, TradeSignal::StrongBuy);
    }
}
