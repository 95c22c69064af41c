//! The risk manager: pre-trade gate plus six monitoring loops.
//!
//! One `RiskManager` instance owns the protective-stop maintenance,
//! margin monitoring, VaR estimation, realized/daily P&L bookkeeping,
//! and the cross-day snapshot. Loops are independent tasks over shared
//! snapshots; the only mutable state is a small accounting block behind
//! a `parking_lot::RwLock` that is never held across an await.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal::prelude::{Signed, ToPrimitive};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, EngineConfig, IntervalsConfig, RiskConfig};
use crate::execution::ExecutionEngine;
use crate::ledger::OrderLedger;
use crate::market::MarketData;
use crate::models::{
    DailyPnlRecord, ExchangeOrder, IncomeKind, OrderSide, OrderStatus, OrderType, PnlKind,
    PositionSide, round_to_tick,
};
use crate::ports::{AlertDispatcher, CandleSource, ExchangeGateway, OrderRequest};
use crate::storage::{RiskJournal, StorageError};
use crate::time::Clock;

use super::var::{log_returns, percentile};

/// How many income rows the startup audit requests from the exchange.
const INCOME_AUDIT_LIMIT: u32 = 1000;

/// Mutable accounting state shared by the risk loops.
#[derive(Debug)]
struct RiskState {
    /// Order id of the protective stop currently on the book.
    active_stop_id: Option<String>,
    /// Unrealized P&L captured at the most recent EOD snapshot.
    opening_unrealized: Decimal,
    /// Realized P&L accumulated since the last EOD snapshot.
    realized_today: Decimal,
    /// Latest daily P&L figure.
    daily_pnl: Decimal,
    /// Date of the most recent EOD snapshot.
    last_saved: NaiveDate,
    /// Latest VaR as a leveraged fraction of used margin.
    var_pct: f64,
    /// Latest VaR in account currency.
    var_value: f64,
}

/// Pre-trade admission control and the monitoring loops.
pub struct RiskManager {
    gateway: Arc<dyn ExchangeGateway>,
    market: Arc<MarketData>,
    ledger: Arc<OrderLedger>,
    execution: Arc<ExecutionEngine>,
    candles: Arc<dyn CandleSource>,
    alerts: AlertDispatcher,
    journal: RiskJournal,
    clock: Arc<dyn Clock>,
    engine_config: EngineConfig,
    risk_config: RiskConfig,
    intervals: IntervalsConfig,
    state: RwLock<RiskState>,
}

impl RiskManager {
    /// Build a manager over the injected collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        market: Arc<MarketData>,
        ledger: Arc<OrderLedger>,
        execution: Arc<ExecutionEngine>,
        candles: Arc<dyn CandleSource>,
        alerts: AlertDispatcher,
        journal: RiskJournal,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let today = clock.today_utc();
        Self {
            gateway,
            market,
            ledger,
            execution,
            candles,
            alerts,
            journal,
            clock,
            engine_config: config.engine.clone(),
            risk_config: config.risk.clone(),
            intervals: config.intervals.clone(),
            state: RwLock::new(RiskState {
                active_stop_id: None,
                opening_unrealized: Decimal::ZERO,
                realized_today: Decimal::ZERO,
                daily_pnl: Decimal::ZERO,
                last_saved: today,
                var_pct: 0.0,
                var_value: 0.0,
            }),
        }
    }

    /// Seed the daily P&L baseline from the most recent EOD row in the
    /// journal. An empty or unreadable journal starts from zero, dated
    /// today.
    pub fn seed_from_journal(&self) {
        match self.journal.last_eod() {
            Ok(Some(record)) => {
                let mut state = self.state.write();
                state.opening_unrealized = record.unrealised_pnl;
                state.last_saved = record.date;
                info!(
                    date = %record.date,
                    opening_unrealized = %record.unrealised_pnl,
                    "Seeded daily P&L baseline from journal"
                );
            }
            Ok(None) => info!("No EOD history, daily P&L starts from zero"),
            Err(e) => {
                warn!(error = %e, "Risk journal unreadable, daily P&L starts from zero");
            }
        }
    }

    /// Log the exchange-reported realized P&L total for cross-checking
    /// against the ledger's own figure. Failure is non-fatal.
    pub async fn income_audit(&self) {
        match self
            .gateway
            .income_history(INCOME_AUDIT_LIMIT, IncomeKind::RealizedPnl)
            .await
        {
            Ok(records) => {
                let total: Decimal = records.iter().map(|record| record.amount).sum();
                info!(
                    count = records.len(),
                    total = %total,
                    "Exchange-reported realized P&L"
                );
            }
            Err(e) => warn!(error = %e, "Income history unavailable, skipping audit"),
        }
    }

    /// Margin gate consulted before submitting a new trade.
    ///
    /// Approves only when the post-trade available/total margin ratio
    /// stays at or above the admission ratio. Reducing trades do not
    /// get credit for the margin they would free; only
    /// exposure-increasing trades debit the simulated balance.
    #[must_use]
    pub fn pre_trade_check(&self, side: OrderSide, quantity: Decimal) -> bool {
        let margin = self.market.margin();
        if margin.total_margin_balance <= Decimal::ZERO {
            warn!("Pre-trade check rejected: no margin balance");
            return false;
        }
        let mark = self.market.last_price();
        if mark <= Decimal::ZERO {
            warn!("Pre-trade check rejected: no mark price");
            return false;
        }

        let leverage = Decimal::from(self.engine_config.leverage);
        let notional = quantity.abs() * mark / leverage;
        let held = self.market.position().quantity;
        let signed_qty = match side {
            OrderSide::Buy => quantity.abs(),
            OrderSide::Sell => -quantity.abs(),
        };
        let increases_exposure = held.is_zero() || held.signum() == signed_qty.signum();
        let simulated_available = if increases_exposure {
            margin.available_balance - notional
        } else {
            margin.available_balance
        };

        let Some(ratio) = (simulated_available / margin.total_margin_balance).to_f64() else {
            return false;
        };
        let approved = ratio >= self.risk_config.admission_ratio;
        info!(
            side = ?side,
            quantity = %quantity,
            notional = %notional,
            ratio,
            approved,
            "Pre-trade margin check"
        );
        approved
    }

    /// Spawn every monitoring loop; all stop on the token.
    #[must_use]
    pub fn start(self: &Arc<Self>, cancellation_token: &CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(Arc::clone(self).run_stop_loss(cancellation_token.clone())),
            tokio::spawn(Arc::clone(self).run_margin(cancellation_token.clone())),
            tokio::spawn(Arc::clone(self).run_var(cancellation_token.clone())),
            tokio::spawn(Arc::clone(self).run_realized_pnl(cancellation_token.clone())),
            tokio::spawn(Arc::clone(self).run_daily_pnl(cancellation_token.clone())),
            tokio::spawn(Arc::clone(self).run_cross_day(cancellation_token.clone())),
        ]
    }

    async fn run_stop_loss(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(
            interval_secs = self.intervals.stop_loss_secs,
            "Stop-loss maintenance loop started"
        );
        let mut interval = tokio::time::interval(Duration::from_secs(self.intervals.stop_loss_secs));
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Stop-loss maintenance loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.stop_loss_tick().await;
                }
            }
        }
    }

    async fn run_margin(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.intervals.margin_secs, "Margin monitor loop started");
        let mut interval = tokio::time::interval(Duration::from_secs(self.intervals.margin_secs));
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Margin monitor loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.margin_tick().await;
                }
            }
        }
    }

    async fn run_var(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.intervals.var_secs, "VaR loop started");
        let mut interval = tokio::time::interval(Duration::from_secs(self.intervals.var_secs));
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("VaR loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.var_tick().await;
                }
            }
        }
    }

    async fn run_realized_pnl(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(
            interval_secs = self.intervals.realized_pnl_secs,
            "Realized P&L loop started"
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.intervals.realized_pnl_secs));
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Realized P&L loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.realized_pnl_tick();
                }
            }
        }
    }

    async fn run_daily_pnl(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.intervals.daily_pnl_secs, "Daily P&L loop started");
        let mut interval = tokio::time::interval(Duration::from_secs(self.intervals.daily_pnl_secs));
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Daily P&L loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.daily_pnl_tick();
                }
            }
        }
    }

    async fn run_cross_day(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.intervals.cross_day_secs, "Cross-day loop started");
        let mut interval = tokio::time::interval(Duration::from_secs(self.intervals.cross_day_secs));
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Cross-day loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.cross_day_tick();
                }
            }
        }
    }

    /// One pass of protective-stop maintenance.
    ///
    /// Flat position: withdraw every resting stop. Open position: make
    /// sure exactly one reduce-only STOP_MARKET for the full size rests
    /// at the buffered trigger, replacing whatever else is there.
    pub async fn stop_loss_tick(&self) {
        let position = self.market.position();
        let open_stops: Vec<ExchangeOrder> = self
            .market
            .open_orders()
            .into_iter()
            .filter(|order| order.order_type == OrderType::StopMarket)
            .collect();

        if position.is_flat() {
            if !open_stops.is_empty() {
                info!(count = open_stops.len(), "Position flat, withdrawing protective stops");
                for stop in &open_stops {
                    if let Err(e) = self.gateway.cancel_order(&stop.order_id).await {
                        warn!(order_id = %stop.order_id, error = %e, "Failed to withdraw stop");
                    }
                }
            }
            self.state.write().active_stop_id = None;
            return;
        }

        let Some(stop_side) = position.side().closing_order_side() else {
            return;
        };
        let mark = self.market.last_price();
        if mark <= Decimal::ZERO {
            debug!("No mark price yet, skipping stop maintenance");
            return;
        }
        let expected_qty = position
            .quantity
            .abs()
            .round_dp(self.engine_config.qty_decimals);
        let shift = match position.side() {
            PositionSide::Long => Decimal::ONE - self.risk_config.stop_buffer_pct,
            PositionSide::Short => Decimal::ONE + self.risk_config.stop_buffer_pct,
            PositionSide::Flat => return,
        };
        let trigger = round_to_tick(mark * shift, self.engine_config.tick_size);

        let matched = open_stops
            .iter()
            .find(|order| order.side == stop_side && order.orig_qty == expected_qty)
            .cloned();

        match matched {
            Some(stop) if stop.status == OrderStatus::Filled => {
                warn!(order_id = %stop.order_id, "Protective stop filled");
                self.alerts.critical(format!(
                    "Protective stop {} filled, position closed by the exchange",
                    stop.order_id
                ));
                self.state.write().active_stop_id = None;
            }
            Some(stop) => {
                for stray in open_stops
                    .iter()
                    .filter(|order| order.order_id != stop.order_id)
                {
                    info!(order_id = %stray.order_id, "Withdrawing redundant stop");
                    if let Err(e) = self.gateway.cancel_order(&stray.order_id).await {
                        warn!(order_id = %stray.order_id, error = %e, "Failed to withdraw redundant stop");
                    }
                }
                self.state.write().active_stop_id = Some(stop.order_id);
            }
            None => {
                for stale in &open_stops {
                    info!(order_id = %stale.order_id, "Withdrawing stale stop");
                    if let Err(e) = self.gateway.cancel_order(&stale.order_id).await {
                        warn!(order_id = %stale.order_id, error = %e, "Failed to withdraw stale stop");
                    }
                }
                let request = OrderRequest::stop_market(
                    &self.engine_config.symbol,
                    stop_side,
                    expected_qty,
                    trigger,
                )
                .with_reduce_only();
                match self.gateway.place_order(request).await {
                    Ok(order) => {
                        info!(
                            order_id = %order.order_id,
                            trigger = %trigger,
                            quantity = %expected_qty,
                            "Protective stop placed"
                        );
                        let order_id = order.order_id.clone();
                        self.ledger.track(order);
                        self.state.write().active_stop_id = Some(order_id);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to place protective stop");
                        self.state.write().active_stop_id = None;
                    }
                }
            }
        }
    }

    /// One pass of the margin monitor.
    pub async fn margin_tick(&self) {
        let margin = self.market.margin();
        let Some(ratio) = margin.available_ratio() else {
            return;
        };
        if ratio < self.risk_config.margin_critical_ratio {
            error!(ratio, "Available margin ratio below critical threshold");
            self.alerts.critical(format!(
                "Margin ratio {ratio:.3} below critical {:.2}, squaring off",
                self.risk_config.margin_critical_ratio
            ));
            self.execution.square_off().await;
        } else if ratio < self.risk_config.margin_warning_ratio {
            warn!(ratio, "Available margin ratio below warning threshold");
            self.alerts.warning(format!(
                "Margin ratio {ratio:.3} below warning {:.2}",
                self.risk_config.margin_warning_ratio
            ));
        }
    }

    /// One pass of the VaR estimate.
    pub async fn var_tick(&self) {
        let side = self.market.position().side();
        if side == PositionSide::Flat {
            let mut state = self.state.write();
            state.var_pct = 0.0;
            state.var_value = 0.0;
            return;
        }

        let candles = match self
            .candles
            .daily_candles(self.risk_config.var_window_days)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(error = %e, "Candle fetch for VaR failed");
                return;
            }
        };
        let closes: Vec<f64> = candles
            .iter()
            .filter_map(|candle| candle.close.to_f64())
            .collect();
        let returns = log_returns(&closes);
        if returns.len() < 2 {
            debug!(count = returns.len(), "Not enough returns for VaR");
            return;
        }

        let tail = match side {
            PositionSide::Long => percentile(&returns, 1.0),
            PositionSide::Short => -percentile(&returns, 99.0),
            PositionSide::Flat => return,
        };
        let var_pct = tail * f64::from(self.engine_config.leverage);
        let used_margin = self
            .market
            .margin()
            .used_initial_margin()
            .to_f64()
            .unwrap_or(0.0);
        let var_value = var_pct * used_margin;

        {
            let mut state = self.state.write();
            state.var_pct = var_pct;
            state.var_value = var_value;
        }
        debug!(var_pct, var_value, "VaR refreshed");
    }

    /// Re-sum realized P&L from the ledger rows that can carry any.
    pub fn realized_pnl_tick(&self) {
        let total: Decimal = self
            .ledger
            .snapshot()
            .iter()
            .filter(|row| {
                matches!(
                    row.status,
                    OrderStatus::Filled
                        | OrderStatus::PartiallyFilled
                        | OrderStatus::Canceled
                        | OrderStatus::Expired
                )
            })
            .map(|row| row.realized_pnl)
            .sum();
        self.state.write().realized_today = total;
        debug!(realized = %total, "Realized P&L refreshed");
    }

    /// Recompute the daily P&L figure.
    pub fn daily_pnl_tick(&self) {
        let unrealized = self.market.position().unrealized_pnl;
        let mut state = self.state.write();
        state.daily_pnl = unrealized + state.realized_today - state.opening_unrealized;
        debug!(daily_pnl = %state.daily_pnl, "Daily P&L refreshed");
    }

    /// Fire the EOD snapshot when the calendar day has changed.
    ///
    /// The day baseline only advances after the journal append
    /// succeeds, so a failed write retries on the next tick.
    pub fn cross_day_tick(&self) {
        let today = self.clock.today_utc();
        if today <= self.state.read().last_saved {
            return;
        }
        info!(date = %today, "Calendar day changed, writing EOD snapshot");
        match self.save_snapshot(PnlKind::Eod) {
            Ok(()) => {
                let unrealized = self.market.position().unrealized_pnl;
                let mut state = self.state.write();
                state.opening_unrealized = unrealized;
                state.realized_today = Decimal::ZERO;
                state.last_saved = today;
            }
            Err(e) => error!(error = %e, "EOD snapshot failed, will retry next tick"),
        }
    }

    /// Append a snapshot of the current figures to the risk journal.
    pub fn save_snapshot(&self, kind: PnlKind) -> Result<(), StorageError> {
        let unrealized = self.market.position().unrealized_pnl;
        let record = {
            let state = self.state.read();
            DailyPnlRecord {
                date: self.clock.today_utc(),
                kind,
                var_pct: state.var_pct,
                var_value: state.var_value,
                realised_pnl: state.realized_today,
                unrealised_pnl: unrealized,
            }
        };
        self.journal.append(&record)
    }

    /// Latest daily P&L figure.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.state.read().daily_pnl
    }

    /// Realized P&L accumulated since the last EOD snapshot.
    #[must_use]
    pub fn realized_today(&self) -> Decimal {
        self.state.read().realized_today
    }

    /// Latest VaR figures as `(pct, value)`.
    #[must_use]
    pub fn var_figures(&self) -> (f64, f64) {
        let state = self.state.read();
        (state.var_pct, state.var_value)
    }

    /// Order id of the protective stop currently tracked, if any.
    #[must_use]
    pub fn active_stop_id(&self) -> Option<String> {
        self.state.read().active_stop_id.clone()
    }
}
