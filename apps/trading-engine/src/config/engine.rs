//! Core engine configuration: instrument, environment, execution knobs.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Runtime environment used for gateway selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingEnvironment {
    /// Simulated exchange, in-process account. Safe default.
    Paper,
    /// Real exchange adapter (deployed separately).
    Live,
}

impl TradingEnvironment {
    /// Parses an environment-variable value, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "paper" => Some(Self::Paper),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

impl fmt::Display for TradingEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Instrument and execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Traded instrument symbol.
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Runtime environment.
    #[serde(default = "default_environment")]
    pub environment: TradingEnvironment,
    /// Account leverage multiplier.
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Price tick size of the instrument.
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,
    /// Decimal places for quantity rounding.
    #[serde(default = "default_qty_decimals")]
    pub qty_decimals: u32,
    /// Seconds a resting limit order is given to fill before fallback.
    #[serde(default = "default_fill_grace_secs")]
    pub fill_grace_secs: u64,
    /// Default slippage tolerance for market fallbacks, in basis points.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

const fn default_environment() -> TradingEnvironment {
    TradingEnvironment::Paper
}

const fn default_leverage() -> u32 {
    50
}

const fn default_tick_size() -> Decimal {
    dec!(0.1)
}

const fn default_qty_decimals() -> u32 {
    3
}

const fn default_fill_grace_secs() -> u64 {
    10
}

const fn default_slippage_bps() -> u32 {
    0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            environment: default_environment(),
            leverage: default_leverage(),
            tick_size: default_tick_size(),
            qty_decimals: default_qty_decimals(),
            fill_grace_secs: default_fill_grace_secs(),
            slippage_bps: default_slippage_bps(),
        }
    }
}
