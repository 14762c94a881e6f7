pub mod execution;
pub mod milestone;
pub mod order;
pub mod profile;
pub mod signal;
pub mod suggestion;

pub use execution::TradeExecution;
pub use milestone::{Milestone, FULL_AUTO_MILESTONE};
pub use order::{OrderFill, OrderSide, OrderTicket};
pub use profile::{ProfilePatch, TradingMode, TradingProfile};
pub use signal::{Prediction, TradeSignal};
pub use suggestion::{SuggestionStatus, TradeSuggestion};
