//! Polling intervals for the background loops.

use serde::{Deserialize, Serialize};

/// Per-loop polling intervals, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    /// Stop-loss maintenance loop.
    #[serde(default = "default_stop_loss_secs")]
    pub stop_loss_secs: u64,
    /// Margin monitor loop.
    #[serde(default = "default_margin_secs")]
    pub margin_secs: u64,
    /// VaR recomputation loop.
    #[serde(default = "default_var_secs")]
    pub var_secs: u64,
    /// Realized P&L summation loop.
    #[serde(default = "default_realized_pnl_secs")]
    pub realized_pnl_secs: u64,
    /// Daily P&L computation loop.
    #[serde(default = "default_daily_pnl_secs")]
    pub daily_pnl_secs: u64,
    /// Cross-day rollover detection loop.
    #[serde(default = "default_cross_day_secs")]
    pub cross_day_secs: u64,
    /// Order ledger reconciliation loop.
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_secs: u64,
    /// Position aftercare tick.
    #[serde(default = "default_aftercare_secs")]
    pub aftercare_secs: u64,
    /// Ledger end-of-day rollover check.
    #[serde(default = "default_rollover_check_secs")]
    pub rollover_check_secs: u64,
}

const fn default_stop_loss_secs() -> u64 {
    2
}

const fn default_margin_secs() -> u64 {
    5
}

const fn default_var_secs() -> u64 {
    30
}

const fn default_realized_pnl_secs() -> u64 {
    30
}

const fn default_daily_pnl_secs() -> u64 {
    30
}

const fn default_cross_day_secs() -> u64 {
    60
}

const fn default_reconcile_secs() -> u64 {
    5
}

const fn default_aftercare_secs() -> u64 {
    5
}

const fn default_rollover_check_secs() -> u64 {
    60
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            stop_loss_secs: default_stop_loss_secs(),
            margin_secs: default_margin_secs(),
            var_secs: default_var_secs(),
            realized_pnl_secs: default_realized_pnl_secs(),
            daily_pnl_secs: default_daily_pnl_secs(),
            cross_day_secs: default_cross_day_secs(),
            reconcile_secs: default_reconcile_secs(),
            aftercare_secs: default_aftercare_secs(),
            rollover_check_secs: default_rollover_check_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IntervalsConfig::default();
        assert_eq!(config.stop_loss_secs, 2);
        assert_eq!(config.margin_secs, 5);
        assert_eq!(config.var_secs, 30);
        assert_eq!(config.cross_day_secs, 60);
        assert_eq!(config.reconcile_secs, 5);
        assert_eq!(config.aftercare_secs, 5);
    }
}
