// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Ballast Trading Engine - Execution & Risk Control Plane
//!
//! Turns trade intents into exchange orders and keeps the account
//! inside its risk envelope. Four cooperating components share one
//! market-state store:
//!
//! - [`execution::ExecutionEngine`]: single-flight order placement,
//!   limit-first with a depth-guarded market fallback, and the
//!   emergency square-off.
//! - [`ledger::OrderLedger`]: reconciled local order table with
//!   realized P&L attribution and daily archival.
//! - [`risk::RiskManager`]: pre-trade admission gate plus the
//!   background stop-loss, margin, VaR, and daily P&L loops.
//! - [`aftercare::PositionAftercare`]: trailing-stop state machine
//!   that closes positions on ROI thresholds.
//!
//! Paper trading runs against the in-process simulator in [`paper`];
//! a live deployment plugs a real exchange adapter into the same
//! [`ports::ExchangeGateway`] port.

pub mod aftercare;
pub mod config;
pub mod execution;
pub mod ledger;
pub mod market;
pub mod models;
pub mod paper;
pub mod ports;
pub mod risk;
pub mod storage;
pub mod time;

pub use aftercare::PositionAftercare;
pub use config::{Config, ConfigError, load_config};
pub use execution::ExecutionEngine;
pub use ledger::OrderLedger;
pub use market::MarketData;
pub use models::{ExecutionStyle, OrderSide, TradeIntent};
pub use paper::{PaperFeed, PaperGateway};
pub use ports::{AlertDispatcher, ExchangeGateway, GatewayError, LogAlerts};
pub use risk::RiskManager;
pub use storage::{OrderLog, RiskJournal, StorageError};
pub use time::{Clock, SystemClock};
