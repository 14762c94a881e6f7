pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod services;
pub mod store;

pub use adapters::{
    Notifier, OrderGatewayClient, OrderRouter, PredictionApiClient, SignalSource,
    TelegramNotifier,
};
pub use config::AppConfig;
pub use domain::{
    Milestone, OrderFill, OrderSide, OrderTicket, Prediction, ProfilePatch, SuggestionStatus,
    TradeExecution, TradeSignal, TradeSuggestion, TradingMode, TradingProfile,
    FULL_AUTO_MILESTONE,
};
pub use engine::{check_risk_limits, ExecuteOutcome, RiskDecision, TradingEngine, TradingStats};
pub use error::{EngineError, Result};
pub use services::{
    ExpirySweeper, MilestoneTracker, ModeExecutor, OperatorAlerts, SafetyMonitor, SignalCurator,
    Worker, WorkerScheduler,
};
pub use store::{MemoryStore, PostgresStore, TradingStore};
