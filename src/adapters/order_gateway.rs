//! REST client for the order-routing gateway.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::{OrderFill, OrderTicket};
use crate::error::Result;

use super::traits::OrderRouter;

/// HTTP adapter for the external order router
#[derive(Clone)]
pub struct OrderGatewayClient {
    http: Client,
    base_url: String,
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct FillDto {
    filled: bool,
    #[serde(default)]
    executed_price: Option<Decimal>,
    #[serde(default)]
    error: Option<String>,
}

impl OrderGatewayClient {
    pub fn new(base_url: &str, timeout_ms: u64, dry_run: bool) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl OrderRouter for OrderGatewayClient {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderFill> {
        if self.dry_run {
            let price = ticket.entry_price_hint.unwrap_or(Decimal::ONE);
            info!(
                "[DRY RUN] {} {} ${} for {} (key {})",
                ticket.side, ticket.ticker, ticket.size_usd, ticket.user_id, ticket.idempotency_key
            );
            return Ok(OrderFill::filled(price));
        }

        let url = format!("{}/orders", self.base_url);
        let body = json!({
            "idempotency_key": ticket.idempotency_key,
            "user_id": ticket.user_id,
            "ticker": ticket.ticker,
            "side": ticket.side,
            "size_usd": ticket.size_usd,
            "entry_price_hint": ticket.entry_price_hint,
        });

        let dto: FillDto = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(
            "Router response for {}: filled={} price={:?}",
            ticket.idempotency_key, dto.filled, dto.executed_price
        );

        Ok(OrderFill {
            filled: dto.filled,
            executed_price: dto.executed_price,
            error: dto.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn dry_run_fills_at_hint_price() {
        let gateway = OrderGatewayClient::new("http://localhost:9400", 1000, true).unwrap();
        let ticket = OrderTicket {
            idempotency_key: "sug_1".into(),
            user_id: "user-1".into(),
            ticker: "BTC".into(),
            side: OrderSide::Buy,
            size_usd: dec!(25),
            entry_price_hint: Some(dec!(64000)),
        };

        let fill = gateway.submit_order(&ticket).await.unwrap();
        assert!(fill.filled);
        assert_eq!(fill.executed_price, Some(dec!(64000)));
    }
}
