//! Volume Bot - Headless Runner
//!
//! Evaluates Binance spot volume spikes once and sends Telegram alerts.
//! Scheduling (cron, systemd timer) is external: one invocation, one cycle.

mod config;
mod status_notifier;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use config::{AppConfig, TelegramSettings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use volume_alerts::{
    AlertClassifier, AlertDeduplicationStore, AlertOrchestrator, ConfigError, CycleReport,
    CycleSettings, DeliveryError, JsonFileState, NotificationSink, OutcomeKind, TelegramSink,
};
use volume_feeds::{BinanceKlineSource, FetchError, SymbolDiscovery};

/// Volume Bot CLI
#[derive(Parser, Debug)]
#[command(name = "volume-bot")]
#[command(about = "Binance volume spike alerts", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the alert state file path
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Classify and check cooldowns without sending or recording
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Comma-separated symbols, skipping discovery
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,
}

#[derive(Error, Debug)]
enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set (or use --dry-run)")]
    MissingCredentials,
    #[error("Market data error: {0}")]
    Feed(#[from] FetchError),
}

/// Stand-in sink for dry runs without credentials. Never called.
struct DisabledSink;

#[async_trait]
impl NotificationSink for DisabledSink {
    async fn send(&self, _message: &str, _target: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::InvalidTarget("delivery disabled".to_string()))
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Trim and uppercase symbols, dropping blanks.
fn normalize_symbols(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A failed discovery still runs the cycle so stale state gets pruned.
fn symbols_or_empty(discovered: Result<Vec<String>, FetchError>) -> Vec<String> {
    match discovered {
        Ok(symbols) => symbols,
        Err(e) => {
            error!(error = %e, transient = e.is_transient(), "Symbol discovery failed");
            Vec::new()
        }
    }
}

async fn run(args: Args) -> Result<CycleReport, RunError> {
    let mut app = AppConfig::load(&args.config)?;
    if let Some(path) = args.state_file {
        app.alerts.state_file = path;
    }
    if !args.symbols.is_empty() {
        app.alerts.symbols = args.symbols;
    }
    app.alerts.symbols = normalize_symbols(&app.alerts.symbols);

    let settings = app.alerts.validate()?;
    app.feed.validate()?;

    info!("  Config: {}", args.config.display());
    info!("  State File: {}", settings.state_file.display());
    info!("  Cooldown: {}s", settings.cooldown.num_seconds());
    info!("  Tiers: {}", settings.thresholds.len());
    info!("  Dry Run: {}", args.dry_run);

    let (sink, target): (Arc<dyn NotificationSink>, String) = match TelegramSettings::from_env() {
        Some(telegram) => (Arc::new(TelegramSink::new(&telegram.bot_token)), telegram.chat_id),
        None if args.dry_run => (Arc::new(DisabledSink), String::new()),
        None => return Err(RunError::MissingCredentials),
    };

    let symbols = if app.alerts.symbols.is_empty() {
        let timeout = settings.fetch_timeout;
        let discovered = match SymbolDiscovery::new(app.feed.base_url.clone(), timeout) {
            Ok(discovery) => discovery.fetch_symbols(&app.feed.quote_assets).await,
            Err(e) => Err(e),
        };
        let symbols = symbols_or_empty(discovered);
        info!(
            count = symbols.len(),
            quotes = ?app.feed.quote_assets,
            "Discovered symbols"
        );
        symbols
    } else {
        app.alerts.symbols.clone()
    };

    let source = BinanceKlineSource::new(app.feed.kline_config(settings.fetch_timeout))?;
    let dedup = AlertDeduplicationStore::new(
        JsonFileState::new(settings.state_file.clone()),
        settings.cooldown,
    );
    let cycle = CycleSettings::new(target, &settings).with_dry_run(args.dry_run);

    let mut orchestrator = AlertOrchestrator::new(
        Arc::new(source),
        sink,
        AlertClassifier::new(settings.thresholds.clone()),
        dedup,
        cycle,
    );
    if let Some(notifier) = status_notifier::try_status_notifier(settings.delivery_timeout) {
        let chat_id = notifier.chat_id().to_string();
        orchestrator = orchestrator.with_escalation(Arc::new(notifier), chat_id);
    }

    Ok(orchestrator.run_cycle(&symbols, Utc::now()).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    info!("📊 Volume Bot starting...");

    match run(args).await {
        Ok(report) => {
            for outcome in &report.outcomes {
                match &outcome.kind {
                    OutcomeKind::Sent { level, .. } => info!("  🚨 {} {}", outcome.symbol, level),
                    OutcomeKind::DryRun { level } => info!("  🧪 {} {}", outcome.symbol, level),
                    _ => {}
                }
            }
            if report.failures > 0 {
                warn!(failures = report.failures, "Cycle finished with failures");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
