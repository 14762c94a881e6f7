//! External collaborator seams.
//!
//! The engine only ever talks to the prediction service, the order router
//! and the notification channel through these traits, so workers can be
//! exercised against stubs and the production adapters stay thin.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{OrderFill, OrderTicket, Prediction};
use crate::error::Result;

/// Read side of the external prediction service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Bounded list of recent signals at or above `min_confidence`
    async fn list_high_confidence_predictions(
        &self,
        min_confidence: Decimal,
        limit: u32,
    ) -> Result<Vec<Prediction>>;

    /// System-wide count of evaluated, outcome-confirmed predictions
    async fn count_evaluated_outcomes(&self) -> Result<i64>;
}

/// Order-routing gateway.
///
/// Submissions must be safely retriable; the ticket carries the suggestion
/// id as its idempotency key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRouter: Send + Sync {
    async fn submit_order(&self, ticket: &OrderTicket) -> Result<OrderFill>;
}

/// Best-effort operator notification channel.
///
/// Returns whether the message was delivered; failures are logged by the
/// implementation and must never block core logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, operator_id: &str, message: &str) -> bool;
}
