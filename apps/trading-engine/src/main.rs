//! Ballast Trading Engine Binary
//!
//! Starts the execution and risk control plane against the paper
//! exchange simulator.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trading-engine
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG_PATH`: Configuration file path (default: `config.yaml` if present)
//! - `TRADING_ENV`: paper | live (default: paper)
//! - `SYMBOL`: Traded instrument override
//! - `TRADING_DATA_DIR`: Durable log directory override
//! - `RUST_LOG`: Log filter (default: info)

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use trading_engine::aftercare::PositionAftercare;
use trading_engine::config::{Config, TradingEnvironment, load_config};
use trading_engine::execution::ExecutionEngine;
use trading_engine::ledger::OrderLedger;
use trading_engine::market::MarketData;
use trading_engine::models::PnlKind;
use trading_engine::paper::{PaperFeed, PaperGateway};
use trading_engine::ports::{AlertDispatcher, CandleSource, ExchangeGateway, LogAlerts};
use trading_engine::risk::RiskManager;
use trading_engine::storage::{OrderLog, RiskJournal};
use trading_engine::time::{Clock, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    info!("Starting Ballast trading engine");

    let config = parse_config()?;
    log_config(&config);

    if config.engine.environment == TradingEnvironment::Live {
        anyhow::bail!(
            "TRADING_ENV=live requires a real exchange adapter; this build ships only the paper gateway"
        );
    }

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "failed to create data directory '{}'",
            config.storage.data_dir.display()
        )
    })?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let market = Arc::new(MarketData::new());
    let gateway = Arc::new(PaperGateway::new(market.clone(), clock.clone(), &config));
    let exchange: Arc<dyn ExchangeGateway> = gateway.clone();
    let candles: Arc<dyn CandleSource> = gateway.clone();

    let (alerts, alerts_handle) =
        AlertDispatcher::start(Arc::new(LogAlerts), AlertDispatcher::DEFAULT_CAPACITY);

    let ledger = Arc::new(OrderLedger::new(
        exchange.clone(),
        market.clone(),
        OrderLog::new(config.storage.order_log_path()),
        clock.clone(),
        &config.intervals,
    ));
    match ledger.load_from_archive() {
        Ok(count) => info!(orders = count, "Order archive loaded"),
        Err(e) => warn!(error = %e, "Order archive unreadable, starting with an empty ledger"),
    }

    let engine = Arc::new(ExecutionEngine::new(
        exchange.clone(),
        market.clone(),
        ledger.clone(),
        alerts.clone(),
        config.engine.clone(),
    ));

    let risk = Arc::new(RiskManager::new(
        exchange,
        market.clone(),
        ledger.clone(),
        engine.clone(),
        candles,
        alerts.clone(),
        RiskJournal::new(config.storage.risk_log_path()),
        clock,
        &config,
    ));
    risk.seed_from_journal();
    risk.income_audit().await;

    let aftercare = Arc::new(PositionAftercare::new(
        market.clone(),
        engine.clone(),
        &config,
    ));
    let feed = Arc::new(PaperFeed::new(market, gateway, &config));

    // Feed first so the loops see prices from their first tick.
    let shutdown_token = CancellationToken::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    handles.push(tokio::spawn(feed.run(shutdown_token.clone())));
    handles.push(tokio::spawn(
        ledger.clone().run_reconcile(shutdown_token.clone()),
    ));
    handles.push(tokio::spawn(
        ledger.clone().run_rollover(shutdown_token.clone()),
    ));
    handles.extend(risk.start(&shutdown_token));
    handles.push(tokio::spawn(aftercare.run(shutdown_token.clone())));

    info!("Trading engine ready");

    shutdown_signal().await;

    shutdown_token.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task failed");
        }
    }

    engine.halt().await;
    if let Err(e) = risk.save_snapshot(PnlKind::Temp) {
        error!(error = %e, "Shutdown P&L snapshot failed");
    }
    if let Err(e) = ledger.persist() {
        error!(error = %e, "Final ledger persist failed");
    }

    // Release the remaining dispatcher clones so the forwarder drains.
    drop(risk);
    drop(engine);
    drop(alerts);
    let _ = alerts_handle.await;

    info!("Trading engine stopped");
    Ok(())
}

/// Load .env from the current directory or any ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Initialize the tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Load configuration from `CONFIG_PATH` (or the default location) and
/// apply environment overrides.
fn parse_config() -> anyhow::Result<Config> {
    let path = std::env::var("CONFIG_PATH").ok();
    load_config(path.as_deref().map(Path::new)).context("configuration failed to load")
}

/// Log the effective configuration.
fn log_config(config: &Config) {
    info!(
        environment = %config.engine.environment,
        symbol = %config.engine.symbol,
        leverage = config.engine.leverage,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed: a process that cannot
/// respond to termination signals should fail fast instead.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
