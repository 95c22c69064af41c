//! Position aftercare: trailing stop, hard stop-loss, and take-profit.
//!
//! A small state machine runs over the live position. A fresh position
//! is captured and tracked; once ROI clears the activation threshold
//! the trailing stop arms and remembers the peak; a giveback from the
//! peak, or the hard ROI stop-loss/take-profit bounds, closes the
//! position with a reduce-only market order through the execution
//! engine. Trailing is evaluated before the hard bounds and at most one
//! close is issued per tick.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, EngineConfig, RiskConfig};
use crate::execution::ExecutionEngine;
use crate::market::MarketData;
use crate::models::{Position, PositionSide, TradeIntent};

/// Tracked position snapshot with trailing-stop memory.
#[derive(Debug, Clone)]
struct TrailingState {
    quantity: Decimal,
    entry_price: Decimal,
    side: PositionSide,
    trailing_active: bool,
    peak_roi: f64,
}

impl TrailingState {
    fn capture(position: &Position) -> Self {
        Self {
            quantity: position.quantity,
            entry_price: position.entry_price,
            side: position.side(),
            trailing_active: false,
            peak_roi: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CloseReason {
    TrailingGiveback { peak: f64 },
    StopLoss,
    TakeProfit,
}

/// Autonomous closer for the live position.
pub struct PositionAftercare {
    market: Arc<MarketData>,
    execution: Arc<ExecutionEngine>,
    engine_config: EngineConfig,
    risk_config: RiskConfig,
    interval: Duration,
    tracked: Mutex<Option<TrailingState>>,
}

impl PositionAftercare {
    /// Build the monitor over the shared market view and engine.
    #[must_use]
    pub fn new(market: Arc<MarketData>, execution: Arc<ExecutionEngine>, config: &Config) -> Self {
        Self {
            market,
            execution,
            engine_config: config.engine.clone(),
            risk_config: config.risk.clone(),
            interval: Duration::from_secs(config.intervals.aftercare_secs),
            tracked: Mutex::new(None),
        }
    }

    /// Background monitor loop.
    pub async fn run(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Aftercare loop started");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Aftercare loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// One pass of the state machine.
    pub fn tick(&self) {
        let position = self.market.position();
        let mut tracked = self.tracked.lock();

        if position.is_flat() {
            if tracked.take().is_some() {
                info!("Position flat, aftercare reset");
            }
            return;
        }

        // Capture a fresh position; recapture if the live side flipped
        // under us (the old trailing memory is meaningless then).
        let live_side = position.side();
        match tracked.as_ref() {
            Some(state) if state.side == live_side => {}
            _ => {
                info!(
                    side = ?live_side,
                    quantity = %position.quantity,
                    entry = %position.entry_price,
                    "Aftercare tracking position"
                );
                *tracked = Some(TrailingState::capture(&position));
            }
        }
        let Some(state) = tracked.as_mut() else {
            return;
        };

        let roi = position_roi(
            position.unrealized_pnl,
            state.quantity,
            state.entry_price,
            self.engine_config.leverage,
        );

        let mut reason: Option<CloseReason> = None;
        if state.trailing_active {
            if roi > state.peak_roi {
                state.peak_roi = roi;
            }
            if roi < state.peak_roi - self.risk_config.trail_giveback_roi {
                reason = Some(CloseReason::TrailingGiveback {
                    peak: state.peak_roi,
                });
            }
        } else if roi >= self.risk_config.trail_start_roi {
            state.trailing_active = true;
            state.peak_roi = roi;
            info!(roi, "Trailing stop armed");
        }

        if reason.is_none() {
            let leverage = f64::from(self.engine_config.leverage);
            let stop_floor = -self.risk_config.stop_loss_pct * 100.0 * leverage;
            let profit_ceiling = self.risk_config.take_profit_pct * 100.0 * leverage;
            if roi <= stop_floor {
                reason = Some(CloseReason::StopLoss);
            } else if roi >= profit_ceiling {
                reason = Some(CloseReason::TakeProfit);
            }
        }

        let Some(reason) = reason else {
            debug!(roi, trailing = state.trailing_active, "Aftercare tick");
            return;
        };

        match reason {
            CloseReason::TrailingGiveback { peak } => {
                info!(roi, peak, "Trailing giveback hit, closing position");
            }
            CloseReason::StopLoss => warn!(roi, "ROI stop-loss hit, closing position"),
            CloseReason::TakeProfit => info!(roi, "Take-profit hit, closing position"),
        }

        let Some(close_side) = state.side.closing_order_side() else {
            return;
        };
        let quantity = state
            .quantity
            .abs()
            .round_dp(self.engine_config.qty_decimals);
        let intent = TradeIntent::market(close_side, quantity).with_reduce_only();
        if self.execution.execute(intent) {
            *tracked = None;
        } else {
            // Keep the trailing memory; next tick retries the close.
            warn!("Close rejected, execution busy, retrying next tick");
        }
    }
}

/// ROI of the live unrealized P&L against the captured position margin.
///
/// A zero margin denominator reads as 0 ROI.
fn position_roi(unrealized: Decimal, quantity: Decimal, entry_price: Decimal, leverage: u32) -> f64 {
    let margin = quantity.abs() * entry_price / Decimal::from(leverage);
    if margin <= Decimal::ZERO {
        return 0.0;
    }
    (unrealized / margin).to_f64().unwrap_or(0.0) * 100.0
}
