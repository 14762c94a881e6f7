use std::sync::Arc;

use autopilot::adapters::{OrderGatewayClient, OrderRouter, PredictionApiClient, TelegramNotifier};
use autopilot::config::{AppConfig, LoggingConfig};
use autopilot::error::{EngineError, Result};
use autopilot::services::{
    ExpirySweeper, MilestoneTracker, ModeExecutor, OperatorAlerts, SafetyMonitor, SignalCurator,
    WorkerScheduler,
};
use autopilot::store::{MemoryStore, PostgresStore, TradingStore};
use autopilot::TradingEngine;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autopilot", about = "Autonomous trading decision and execution engine")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every background worker and run until interrupted
    Run,
    /// Run database migrations and exit
    Migrate,
    /// Run a single tick of one worker (curator|executor|expiry|safety|milestone)
    Tick { worker: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config error: {}", e);
        }
        return Err(EngineError::Validation(format!(
            "invalid configuration: {}",
            errors.join("; ")
        )));
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let scheduler = build_scheduler(&config).await?;
            scheduler.start();
            info!("autopilot running; press Ctrl-C to stop");

            signal::ctrl_c().await?;
            info!("Shutdown signal received");
            scheduler.stop();
        }
        Commands::Migrate => {
            let store =
                PostgresStore::new(&config.database.url, config.database.max_connections).await?;
            store.migrate().await?;
        }
        Commands::Tick { worker } => {
            let scheduler = build_scheduler(&config).await?;
            let summary = scheduler.run_once(&worker).await?;
            println!("{worker}: {summary}");
        }
    }

    Ok(())
}

/// Wire the store, collaborators, engine and workers from configuration
async fn build_scheduler(config: &AppConfig) -> Result<WorkerScheduler> {
    let dry_run = config.dry_run.enabled;

    let store: Arc<dyn TradingStore> = if dry_run {
        info!("Dry run enabled: using in-memory store, no real orders");
        Arc::new(MemoryStore::new())
    } else {
        let store =
            PostgresStore::new(&config.database.url, config.database.max_connections).await?;
        store.migrate().await?;
        Arc::new(store)
    };

    let router: Arc<dyn OrderRouter> = Arc::new(OrderGatewayClient::new(
        &config.router.base_url,
        config.router.order_timeout_ms,
        dry_run,
    )?);
    let signals = Arc::new(PredictionApiClient::new(&config.signals.base_url)?);

    let engine = Arc::new(TradingEngine::new(
        store.clone(),
        router,
        config.milestone.target_evaluated_outcomes,
    ));

    let alerts = match (TelegramNotifier::from_env(), &config.notifier.operator_id) {
        (Some(notifier), Some(operator_id)) => {
            Some(OperatorAlerts::new(Arc::new(notifier), operator_id.clone()))
        }
        _ => {
            info!("Operator notifications disabled");
            None
        }
    };

    let mut scheduler = WorkerScheduler::new();
    scheduler.register(
        Arc::new(SignalCurator::new(
            store.clone(),
            signals.clone(),
            config.curator.clone(),
        )),
        config.scheduler.curator_interval_secs,
    );
    scheduler.register(
        Arc::new(ModeExecutor::new(engine.clone(), store.clone())),
        config.scheduler.executor_interval_secs,
    );
    scheduler.register(
        Arc::new(ExpirySweeper::new(store.clone())),
        config.scheduler.expiry_interval_secs,
    );
    scheduler.register(
        Arc::new(SafetyMonitor::new(
            store.clone(),
            alerts.clone(),
            config.safety.clone(),
        )),
        config.scheduler.safety_interval_secs,
    );
    scheduler.register(
        Arc::new(MilestoneTracker::new(
            store,
            signals,
            alerts,
            config.milestone.clone(),
        )),
        config.scheduler.milestone_interval_secs,
    );

    Ok(scheduler)
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},autopilot=debug,sqlx=warn", config.level))
    });

    // Optional daily-rotated file output. The appender panics if it cannot
    // create the initial log file, so writability is checked up front.
    let log_dir = std::env::var("AUTOPILOT_LOG_DIR").ok();
    let file_layer = log_dir.and_then(|dir| {
        if std::fs::create_dir_all(&dir).is_err() {
            eprintln!("Warning: could not create log directory {dir}, file logging disabled");
            return None;
        }
        let probe = std::path::Path::new(&dir).join(".autopilot_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&probe) {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
                let appender = tracing_appender::rolling::daily(&dir, "autopilot.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                // The guard must outlive the process to keep flushing.
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: log directory {dir} not writable ({e}), file logging disabled");
                None
            }
        }
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
