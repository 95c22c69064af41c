//! Configuration loading and validation.
//!
//! Configuration comes from an optional YAML file (`config.yaml` by
//! default), with a handful of environment-variable overrides applied
//! on top. A missing default file falls back to pure defaults so the
//! paper engine runs with zero setup.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trading_engine::config::load_config;
//!
//! // Default path (config.yaml), defaults if absent
//! let config = load_config(None)?;
//!
//! // Explicit path (must exist)
//! let config = load_config(Some(Path::new("custom/config.yaml")))?;
//! ```

mod engine;
mod intervals;
mod risk;
mod storage;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::{EngineConfig, TradingEnvironment};
pub use intervals::IntervalsConfig;
pub use risk::RiskConfig;
pub use storage::StorageConfig;

/// Default configuration file path.
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Instrument and execution settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Risk thresholds.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Background-loop polling intervals.
    #[serde(default)]
    pub intervals: IntervalsConfig,
    /// Durable log locations.
    #[serde(default)]
    pub storage: StorageConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration, apply environment overrides, and validate.
///
/// An explicit `path` must exist; with `None`, a missing default file
/// yields the built-in defaults.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                Config::default()
            }
        }
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml_bw::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(serde_yaml_bw::from_str(&contents)?)
}

/// Apply environment-variable overrides on top of the file values.
///
/// `TRADING_ENV` selects the environment, `SYMBOL` the instrument, and
/// `TRADING_DATA_DIR` the durable-log directory.
fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var("TRADING_ENV") {
        config.engine.environment = TradingEnvironment::parse(&value).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "TRADING_ENV must be 'paper' or 'live', got '{value}'"
            ))
        })?;
    }
    if let Ok(value) = std::env::var("SYMBOL")
        && !value.is_empty()
    {
        config.engine.symbol = value;
    }
    if let Ok(value) = std::env::var("TRADING_DATA_DIR")
        && !value.is_empty()
    {
        config.storage.data_dir = value.into();
    }
    Ok(())
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    use rust_decimal::Decimal;

    if config.engine.symbol.is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.symbol must not be empty".to_string(),
        ));
    }

    if config.engine.leverage == 0 {
        return Err(ConfigError::ValidationError(
            "engine.leverage must be a positive integer".to_string(),
        ));
    }

    if config.engine.tick_size <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "engine.tick_size must be positive".to_string(),
        ));
    }

    let fractions = [
        ("risk.stop_loss_pct", config.risk.stop_loss_pct),
        ("risk.take_profit_pct", config.risk.take_profit_pct),
        ("risk.margin_warning_ratio", config.risk.margin_warning_ratio),
        (
            "risk.margin_critical_ratio",
            config.risk.margin_critical_ratio,
        ),
        ("risk.admission_ratio", config.risk.admission_ratio),
    ];
    for (name, value) in fractions {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be between 0.0 and 1.0"
            )));
        }
    }

    if config.risk.stop_buffer_pct < Decimal::ZERO || config.risk.stop_buffer_pct > Decimal::ONE {
        return Err(ConfigError::ValidationError(
            "risk.stop_buffer_pct must be between 0.0 and 1.0".to_string(),
        ));
    }

    if config.risk.margin_warning_ratio <= config.risk.margin_critical_ratio {
        return Err(ConfigError::ValidationError(
            "risk.margin_warning_ratio must be above risk.margin_critical_ratio".to_string(),
        ));
    }

    if config.risk.trail_start_roi <= 0.0 || config.risk.trail_giveback_roi <= 0.0 {
        return Err(ConfigError::ValidationError(
            "trailing ROI thresholds must be positive".to_string(),
        ));
    }

    if config.risk.var_window_days < 2 {
        return Err(ConfigError::ValidationError(
            "risk.var_window_days must be at least 2".to_string(),
        ));
    }

    let intervals = [
        ("intervals.stop_loss_secs", config.intervals.stop_loss_secs),
        ("intervals.margin_secs", config.intervals.margin_secs),
        ("intervals.var_secs", config.intervals.var_secs),
        (
            "intervals.realized_pnl_secs",
            config.intervals.realized_pnl_secs,
        ),
        ("intervals.daily_pnl_secs", config.intervals.daily_pnl_secs),
        ("intervals.cross_day_secs", config.intervals.cross_day_secs),
        ("intervals.reconcile_secs", config.intervals.reconcile_secs),
        ("intervals.aftercare_secs", config.intervals.aftercare_secs),
        (
            "intervals.rollover_check_secs",
            config.intervals.rollover_check_secs,
        ),
    ];
    for (name, value) in intervals {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be at least 1 second"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.engine.symbol, "BTCUSDT");
        assert_eq!(config.engine.environment, TradingEnvironment::Paper);
        assert!((config.risk.admission_ratio - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.intervals.reconcile_secs, 5);
    }

    #[test]
    fn test_load_minimal_config() {
        let yaml = r"
engine:
  symbol: ETHUSDT
";
        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load minimal config: {e}"),
        };
        assert_eq!(config.engine.symbol, "ETHUSDT");
        // Untouched sections keep defaults.
        assert_eq!(config.engine.leverage, 50);
        assert!((config.risk.trail_start_roi - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r#"
engine:
  symbol: BTCUSDT
  environment: live
  leverage: 20
  tick_size: 0.5
  fill_grace_secs: 5
  slippage_bps: 25

risk:
  stop_loss_pct: 0.01
  take_profit_pct: 0.02
  stop_buffer_pct: 0.04
  margin_warning_ratio: 0.25
  margin_critical_ratio: 0.10
  admission_ratio: 0.40
  trail_start_roi: 6.0
  trail_giveback_roi: 2.0
  var_window_days: 200

intervals:
  stop_loss_secs: 1
  reconcile_secs: 3

storage:
  data_dir: "/var/lib/ballast"
  order_log: "orders.csv"
  risk_log: "risk.csv"
"#;
        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };
        assert_eq!(config.engine.environment, TradingEnvironment::Live);
        assert_eq!(config.engine.leverage, 20);
        assert_eq!(config.engine.tick_size, dec!(0.5));
        assert_eq!(config.engine.slippage_bps, 25);
        assert_eq!(config.risk.stop_buffer_pct, dec!(0.04));
        assert!((config.risk.admission_ratio - 0.40).abs() < f64::EPSILON);
        assert_eq!(config.risk.var_window_days, 200);
        assert_eq!(config.intervals.stop_loss_secs, 1);
        assert_eq!(config.intervals.reconcile_secs, 3);
        // Unset intervals keep defaults.
        assert_eq!(config.intervals.margin_secs, 5);
        assert_eq!(
            config.storage.risk_log_path(),
            std::path::PathBuf::from("/var/lib/ballast/risk.csv")
        );
    }

    #[test]
    fn test_validation_rejects_zero_leverage() {
        let yaml = r"
engine:
  leverage: 0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero leverage");
        };
        assert!(err.to_string().contains("leverage"));
    }

    #[test]
    fn test_validation_rejects_out_of_range_ratio() {
        let yaml = r"
risk:
  admission_ratio: 1.5
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for out-of-range admission_ratio");
        };
        assert!(err.to_string().contains("admission_ratio"));
    }

    #[test]
    fn test_validation_rejects_inverted_margin_thresholds() {
        let yaml = r"
risk:
  margin_warning_ratio: 0.05
  margin_critical_ratio: 0.20
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for inverted margin thresholds");
        };
        assert!(err.to_string().contains("margin_warning_ratio"));
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let yaml = r"
intervals:
  reconcile_secs: 0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero interval");
        };
        assert!(err.to_string().contains("reconcile_secs"));
    }

    #[test]
    fn test_missing_file_with_explicit_path_errors() {
        let result = load_config(Some(Path::new("/nonexistent/ballast-config.yaml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
