use thiserror::Error;

/// Main error type for the trading engine
#[derive(Error, Debug)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Order routing errors
    #[error("Order submission failed: {0}")]
    OrderSubmission(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Risk management errors
    #[error("Risk limit exceeded: {0}")]
    RiskLimitExceeded(String),

    // Validation errors (malformed input, invariant violations)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether the failed unit of work should simply be retried on the next
    /// scheduler tick. Collaborator and store failures are transient by
    /// policy; validation and state-machine rejections are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Database(_)
                | EngineError::Http(_)
                | EngineError::OrderSubmission(_)
                | EngineError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EngineError::OrderSubmission("gateway timeout".into()).is_transient());
        assert!(!EngineError::Validation("unknown mode".into()).is_transient());
        assert!(!EngineError::NotFound("sug_x".into()).is_transient());
    }
}
