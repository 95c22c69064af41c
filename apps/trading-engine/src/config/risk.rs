//! Risk thresholds: admission, stops, margin, VaR, trailing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Threshold configuration for the risk manager and position aftercare.
///
/// Immutable after load; the single source of truth for all threshold
/// logic. Percentages and ratios are fractions in `[0, 1]`; the ROI
/// thresholds are signed percentage points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Hard stop-loss as a fraction of price movement.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    /// Take-profit as a fraction of price movement.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    /// Buffer between mark price and the protective stop trigger.
    #[serde(default = "default_stop_buffer_pct")]
    pub stop_buffer_pct: Decimal,
    /// Available/total ratio below which a warning alert is raised.
    #[serde(default = "default_margin_warning_ratio")]
    pub margin_warning_ratio: f64,
    /// Available/total ratio below which the engine squares off.
    #[serde(default = "default_margin_critical_ratio")]
    pub margin_critical_ratio: f64,
    /// Minimum post-trade available/total ratio for admission.
    #[serde(default = "default_admission_ratio")]
    pub admission_ratio: f64,
    /// ROI (percentage points) at which the trailing stop activates.
    #[serde(default = "default_trail_start_roi")]
    pub trail_start_roi: f64,
    /// ROI giveback from the peak (percentage points) that closes.
    #[serde(default = "default_trail_giveback_roi")]
    pub trail_giveback_roi: f64,
    /// Daily candles fetched for the VaR return distribution.
    #[serde(default = "default_var_window_days")]
    pub var_window_days: u32,
}

const fn default_stop_loss_pct() -> f64 {
    0.003
}

const fn default_take_profit_pct() -> f64 {
    0.007
}

const fn default_stop_buffer_pct() -> Decimal {
    dec!(0.05)
}

const fn default_margin_warning_ratio() -> f64 {
    0.20
}

const fn default_margin_critical_ratio() -> f64 {
    0.05
}

const fn default_admission_ratio() -> f64 {
    0.30
}

const fn default_trail_start_roi() -> f64 {
    4.0
}

const fn default_trail_giveback_roi() -> f64 {
    1.25
}

const fn default_var_window_days() -> u32 {
    366
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            stop_buffer_pct: default_stop_buffer_pct(),
            margin_warning_ratio: default_margin_warning_ratio(),
            margin_critical_ratio: default_margin_critical_ratio(),
            admission_ratio: default_admission_ratio(),
            trail_start_roi: default_trail_start_roi(),
            trail_giveback_roi: default_trail_giveback_roi(),
            var_window_days: default_var_window_days(),
        }
    }
}
