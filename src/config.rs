use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub signals: SignalsConfig,
    pub router: RouterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub curator: CuratorConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub milestone: MilestoneConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalsConfig {
    /// REST base URL of the prediction service
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// REST base URL of the order-routing gateway
    pub base_url: String,
    /// Request timeout in milliseconds for order submission
    #[serde(default = "default_order_timeout_ms")]
    pub order_timeout_ms: u64,
}

fn default_order_timeout_ms() -> u64 {
    5000
}

/// Recurring worker intervals. The executor must run on a tighter schedule
/// than the curator so approvals drain faster than proposals accumulate.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_curator_interval")]
    pub curator_interval_secs: u64,
    #[serde(default = "default_executor_interval")]
    pub executor_interval_secs: u64,
    #[serde(default = "default_expiry_interval")]
    pub expiry_interval_secs: u64,
    #[serde(default = "default_safety_interval")]
    pub safety_interval_secs: u64,
    #[serde(default = "default_milestone_interval")]
    pub milestone_interval_secs: u64,
}

fn default_curator_interval() -> u64 {
    300
}

fn default_executor_interval() -> u64 {
    60
}

fn default_expiry_interval() -> u64 {
    3600
}

fn default_safety_interval() -> u64 {
    900
}

fn default_milestone_interval() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            curator_interval_secs: default_curator_interval(),
            executor_interval_secs: default_executor_interval(),
            expiry_interval_secs: default_expiry_interval(),
            safety_interval_secs: default_safety_interval(),
            milestone_interval_secs: default_milestone_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CuratorConfig {
    /// Minimum signal confidence to propose a trade
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Decimal,
    /// Maximum signals fetched per tick
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    /// Approval window for new suggestions, in minutes
    #[serde(default = "default_approval_window_min")]
    pub approval_window_min: i64,
}

fn default_min_confidence() -> Decimal {
    Decimal::new(65, 2)
}

fn default_fetch_limit() -> u32 {
    20
}

fn default_approval_window_min() -> i64 {
    60
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            fetch_limit: default_fetch_limit(),
            approval_window_min: default_approval_window_min(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    /// How many recent closed executions to scan for the loss streak
    #[serde(default = "default_streak_lookback")]
    pub streak_lookback: u32,
}

fn default_streak_lookback() -> u32 {
    50
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            streak_lookback: default_streak_lookback(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneConfig {
    /// Evaluated outcomes required before full_auto may be unlocked
    #[serde(default = "default_milestone_target")]
    pub target_evaluated_outcomes: i64,
}

fn default_milestone_target() -> i64 {
    500
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            target_evaluated_outcomes: default_milestone_target(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifierConfig {
    /// Operator chat id that receives kill-switch and milestone alerts.
    /// When unset, notifications are disabled.
    #[serde(default)]
    pub operator_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Enable dry run mode (in-memory store, no real orders)
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("dry_run.enabled", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("AUTOPILOT_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (AUTOPILOT_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("AUTOPILOT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.curator.min_confidence <= Decimal::ZERO || self.curator.min_confidence >= Decimal::ONE
        {
            errors.push("curator.min_confidence must be between 0 and 1".to_string());
        }

        if self.curator.fetch_limit == 0 {
            errors.push("curator.fetch_limit must be positive".to_string());
        }

        if self.curator.approval_window_min <= 0 {
            errors.push("curator.approval_window_min must be positive".to_string());
        }

        if self.milestone.target_evaluated_outcomes <= 0 {
            errors.push("milestone.target_evaluated_outcomes must be positive".to_string());
        }

        // The executor consumes what the curator proposes; a slower executor
        // would let approved suggestions pile up for a full curator cycle.
        if self.scheduler.executor_interval_secs >= self.scheduler.curator_interval_secs {
            errors.push(
                "scheduler.executor_interval_secs should be less than curator_interval_secs"
                    .to_string(),
            );
        }

        let intervals = [
            self.scheduler.curator_interval_secs,
            self.scheduler.executor_interval_secs,
            self.scheduler.expiry_interval_secs,
            self.scheduler.safety_interval_secs,
            self.scheduler.milestone_interval_secs,
        ];
        if intervals.iter().any(|i| *i == 0) {
            errors.push("scheduler intervals must be positive".to_string());
        }

        // The safety monitor must observe each trading day more than once.
        if self.scheduler.safety_interval_secs >= 86_400 {
            errors.push("scheduler.safety_interval_secs must be shorter than a day".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(dry_run: bool) -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/autopilot".to_string(),
                max_connections: 5,
            },
            signals: SignalsConfig {
                base_url: "http://localhost:9300".to_string(),
            },
            router: RouterConfig {
                base_url: "http://localhost:9400".to_string(),
                order_timeout_ms: 5000,
            },
            scheduler: SchedulerConfig::default(),
            curator: CuratorConfig::default(),
            safety: SafetyConfig::default(),
            milestone: MilestoneConfig::default(),
            notifier: NotifierConfig::default(),
            dry_run: DryRunConfig { enabled: dry_run },
            logging: LoggingConfig::default(),
        }
    }
}
