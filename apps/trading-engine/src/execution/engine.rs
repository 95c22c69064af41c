//! Limit-then-market order execution.
//!
//! Every entry goes out as a limit order at the rounded mid price. If the
//! order has not filled after a grace period, the resting remainder is
//! canceled and re-sent as a market order. A market fallback that would
//! flip the position through zero is first checked against visible depth
//! and a slippage allowance; if the book cannot absorb the remainder at
//! an acceptable price the fallback is withheld and the attempt ends.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::ledger::OrderLedger;
use crate::market::MarketData;
use crate::models::{
    DepthLevel, DepthSnapshot, ExecutionStyle, OrderSide, OrderStatus, TradeIntent, round_to_tick,
};
use crate::ports::{AlertDispatcher, ExchangeGateway, OrderRequest};

use super::ExecutionSlot;

/// Order-placement workhorse.
///
/// At most one execution attempt runs at a time; intents arriving while
/// an attempt is in flight are rejected, not queued. Every order the
/// engine places is recorded in the [`OrderLedger`] before the attempt
/// moves on.
pub struct ExecutionEngine {
    gateway: Arc<dyn ExchangeGateway>,
    market: Arc<MarketData>,
    ledger: Arc<OrderLedger>,
    alerts: AlertDispatcher,
    config: EngineConfig,
    slot: ExecutionSlot,
}

impl ExecutionEngine {
    /// Create an engine over the given gateway and market view.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        market: Arc<MarketData>,
        ledger: Arc<OrderLedger>,
        alerts: AlertDispatcher,
        config: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            market,
            ledger,
            alerts,
            config,
            slot: ExecutionSlot::new(),
        }
    }

    /// Submit an intent for execution.
    ///
    /// Returns whether the intent was admitted. A `false` means another
    /// attempt is still in flight and the intent was dropped; callers
    /// retry on their own schedule.
    pub fn execute(self: &Arc<Self>, intent: TradeIntent) -> bool {
        let engine = Arc::clone(self);
        let admitted = self.slot.try_submit(move |cancel| {
            tokio::spawn(async move {
                engine.run_attempt(intent, cancel).await;
            })
        });
        if !admitted {
            warn!(
                side = ?intent.side,
                quantity = %intent.quantity,
                "Execution already in flight, intent dropped"
            );
        }
        admitted
    }

    /// Whether an execution attempt is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Cancel any in-flight attempt and wait for it to settle.
    pub async fn halt(&self) {
        self.slot.cancel_and_wait().await;
    }

    /// Emergency flatten: cancel the in-flight attempt, withdraw every
    /// open order, then close the live position with a reduce-only
    /// market order.
    pub async fn square_off(&self) {
        self.alerts
            .critical("Square-off: canceling all orders and flattening the position");
        self.slot.cancel_and_wait().await;

        if let Err(e) = self.gateway.cancel_all_orders().await {
            error!(error = %e, "Cancel-all during square-off failed");
        }

        let position = self.market.position();
        let Some(side) = position.side().closing_order_side() else {
            info!("Square-off requested with no position open");
            return;
        };
        let quantity = round_qty(position.quantity.abs(), self.config.qty_decimals);
        info!(side = ?side, quantity = %quantity, "Square-off closing position");
        self.submit_market(side, quantity, true).await;
    }

    async fn run_attempt(&self, intent: TradeIntent, cancel: CancellationToken) {
        debug!(
            side = ?intent.side,
            quantity = %intent.quantity,
            style = ?intent.style,
            "Execution attempt started"
        );
        match intent.style {
            ExecutionStyle::Market => {
                let quantity = round_qty(intent.quantity, self.config.qty_decimals);
                self.submit_market(intent.side, quantity, intent.reduce_only)
                    .await;
            }
            ExecutionStyle::Limit => self.limit_then_market(intent, cancel).await,
        }
    }

    /// The limit-at-mid, wait, cancel, market-remainder sequence.
    async fn limit_then_market(&self, intent: TradeIntent, cancel: CancellationToken) {
        let Some(mid) = self.market.mid_price() else {
            warn!("No depth available for mid price, aborting attempt");
            return;
        };
        let limit_price = round_to_tick(mid, self.config.tick_size);
        let quantity = round_qty(intent.quantity, self.config.qty_decimals);
        if quantity <= Decimal::ZERO {
            warn!(quantity = %intent.quantity, "Quantity rounds to zero, aborting attempt");
            return;
        }

        let request = OrderRequest::limit(&self.config.symbol, intent.side, quantity, limit_price);
        let resting = match self.gateway.place_order(request).await {
            Ok(order) => order,
            Err(e) => {
                error!(error = %e, "Limit order submission failed");
                return;
            }
        };
        let order_id = resting.order_id.clone();
        info!(
            order_id = %order_id,
            price = %limit_price,
            quantity = %quantity,
            "Limit order resting"
        );
        self.ledger.track(resting);

        tokio::select! {
            () = cancel.cancelled() => {
                info!(order_id = %order_id, "Attempt canceled, withdrawing resting order");
                if let Err(e) = self.gateway.cancel_order(&order_id).await {
                    warn!(order_id = %order_id, error = %e, "Withdraw of resting order failed");
                }
                return;
            }
            () = tokio::time::sleep(Duration::from_secs(self.config.fill_grace_secs)) => {}
        }

        let status = match self.gateway.order_status(&order_id).await {
            Ok(status) => status,
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Status query failed, aborting attempt");
                return;
            }
        };
        self.ledger.track(status.clone());

        if status.status == OrderStatus::Filled {
            info!(order_id = %order_id, "Limit order filled within grace period");
            return;
        }

        if status.status.is_active()
            && let Err(e) = self.gateway.cancel_order(&order_id).await
        {
            error!(order_id = %order_id, error = %e, "Cancel failed, aborting market fallback");
            return;
        }

        let remaining = round_qty(quantity - status.executed_qty, self.config.qty_decimals);
        if remaining <= Decimal::ZERO {
            info!(order_id = %order_id, "Nothing left to execute after cancel");
            return;
        }

        let held = self.market.position().quantity;
        let signed_remaining = match intent.side {
            OrderSide::Buy => remaining,
            OrderSide::Sell => -remaining,
        };
        if flips_position(held, signed_remaining) {
            let slippage_bps = if intent.slippage_bps > 0 {
                intent.slippage_bps
            } else {
                self.config.slippage_bps
            };
            let depth = self.market.depth();
            match fallback_guard(&depth, intent.side, remaining, slippage_bps) {
                Ok(vwap) => {
                    debug!(vwap = %vwap, remaining = %remaining, "Depth check passed for position flip");
                }
                Err(block) => {
                    warn!(
                        reason = %block,
                        remaining = %remaining,
                        "Withholding market fallback that would flip the position"
                    );
                    return;
                }
            }
        }

        info!(remaining = %remaining, "Falling back to market for the remainder");
        self.submit_market(intent.side, remaining, intent.reduce_only)
            .await;
    }

    async fn submit_market(&self, side: OrderSide, quantity: Decimal, reduce_only: bool) {
        if quantity <= Decimal::ZERO {
            warn!(quantity = %quantity, "Market quantity rounds to zero, nothing submitted");
            return;
        }
        let mut request = OrderRequest::market(&self.config.symbol, side, quantity);
        if reduce_only {
            request = request.with_reduce_only();
        }
        match self.gateway.place_order(request).await {
            Ok(order) => {
                info!(
                    order_id = %order.order_id,
                    side = ?side,
                    quantity = %quantity,
                    "Market order submitted"
                );
                self.ledger.track(order);
            }
            Err(e) => {
                error!(error = %e, side = ?side, quantity = %quantity, "Market order submission failed");
            }
        }
    }
}

/// Why a market fallback was withheld after a position-flip check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
enum FallbackBlock {
    /// The adverse side of the book is empty.
    #[error("adverse side of the book is empty")]
    EmptyBook,
    /// The visible book cannot absorb the remainder.
    #[error("visible depth cannot absorb the remainder")]
    InsufficientDepth,
    /// Walking the book would cost more than the slippage allowance.
    #[error("projected fill {vwap} is past the slippage bound {bound}")]
    AdverseSlippage {
        /// Volume-weighted price over the levels the fill would consume.
        vwap: Decimal,
        /// Worst acceptable price given the allowance.
        bound: Decimal,
    },
}

/// Round a quantity to the configured number of decimals.
fn round_qty(quantity: Decimal, decimals: u32) -> Decimal {
    quantity.round_dp(decimals)
}

fn sign(value: Decimal) -> i8 {
    if value > Decimal::ZERO {
        1
    } else if value < Decimal::ZERO {
        -1
    } else {
        0
    }
}

/// Whether applying `signed_delta` to `held` crosses through zero.
///
/// Opening from flat and closing exactly to flat are not flips.
fn flips_position(held: Decimal, signed_delta: Decimal) -> bool {
    sign(held) * sign(held + signed_delta) < 0
}

/// Volume-weighted price of consuming `quantity` from `levels`, best
/// level first. `None` when the levels cannot cover the quantity.
fn vwap_for_quantity(levels: &[DepthLevel], quantity: Decimal) -> Option<Decimal> {
    if quantity <= Decimal::ZERO {
        return None;
    }
    let mut covered = Decimal::ZERO;
    let mut cost = Decimal::ZERO;
    for level in levels {
        if covered >= quantity {
            break;
        }
        let take = (quantity - covered).min(level.qty);
        cost += level.price * take;
        covered += take;
    }
    (covered >= quantity).then(|| cost / quantity)
}

/// Check whether a market order for `quantity` can cross the book
/// without exceeding the slippage allowance, and return the projected
/// fill price if so.
fn fallback_guard(
    depth: &DepthSnapshot,
    side: OrderSide,
    quantity: Decimal,
    slippage_bps: u32,
) -> Result<Decimal, FallbackBlock> {
    let levels = match side {
        OrderSide::Buy => &depth.asks,
        OrderSide::Sell => &depth.bids,
    };
    let Some(best) = levels.first().map(|level| level.price) else {
        return Err(FallbackBlock::EmptyBook);
    };
    let Some(vwap) = vwap_for_quantity(levels, quantity) else {
        return Err(FallbackBlock::InsufficientDepth);
    };

    let allowance = best * Decimal::from(slippage_bps) / Decimal::from(10000);
    let bound = match side {
        OrderSide::Buy => best + allowance,
        OrderSide::Sell => best - allowance,
    };
    let adverse = match side {
        OrderSide::Buy => vwap > bound,
        OrderSide::Sell => vwap < bound,
    };
    if adverse {
        return Err(FallbackBlock::AdverseSlippage { vwap, bound });
    }
    Ok(vwap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntervalsConfig;
    use crate::models::{ExchangeOrder, IncomeKind, IncomeRecord, OrderType, Position};
    use crate::ports::{GatewayError, LogAlerts};
    use crate::storage::OrderLog;
    use crate::time::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Default)]
    struct MockGateway {
        placed: Mutex<Vec<OrderRequest>>,
        status_response: Mutex<Option<ExchangeOrder>>,
        reject_orders: AtomicBool,
        fail_cancel: AtomicBool,
        cancels: AtomicU32,
        cancel_alls: AtomicU32,
        status_queries: AtomicU32,
        next_id: AtomicU32,
    }

    #[async_trait]
    impl ExchangeGateway for MockGateway {
        async fn place_order(&self, request: OrderRequest) -> Result<ExchangeOrder, GatewayError> {
            if self.reject_orders.load(Ordering::SeqCst) {
                return Err(GatewayError::Rejected {
                    reason: "margin is insufficient".to_string(),
                });
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let order = ExchangeOrder {
                order_id: format!("mock-{id}"),
                client_order_id: request.client_order_id.clone(),
                symbol: request.symbol.clone(),
                side: request.side,
                order_type: request.order_type,
                status: OrderStatus::New,
                orig_qty: request.quantity,
                executed_qty: Decimal::ZERO,
                price: request.price.unwrap_or_default(),
                avg_price: Decimal::ZERO,
                stop_price: request.stop_price.unwrap_or_default(),
                reduce_only: request.reduce_only,
                update_time: 1_787_216_400_000,
            };
            self.placed.lock().push(request);
            Ok(order)
        }

        async fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError> {
            if self.fail_cancel.load(Ordering::SeqCst) {
                return Err(GatewayError::NotFound {
                    order_id: order_id.to_string(),
                });
            }
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn cancel_all_orders(&self) -> Result<(), GatewayError> {
            self.cancel_alls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn order_status(&self, order_id: &str) -> Result<ExchangeOrder, GatewayError> {
            self.status_queries.fetch_add(1, Ordering::SeqCst);
            self.status_response
                .lock()
                .clone()
                .ok_or_else(|| GatewayError::NotFound {
                    order_id: order_id.to_string(),
                })
        }

        async fn income_history(
            &self,
            _limit: u32,
            _kind: IncomeKind,
        ) -> Result<Vec<IncomeRecord>, GatewayError> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        engine: Arc<ExecutionEngine>,
        gateway: Arc<MockGateway>,
        market: Arc<MarketData>,
        ledger: Arc<OrderLedger>,
        _dir: tempfile::TempDir,
    }

    fn make_fixture(grace_secs: u64) -> Fixture {
        let gateway = Arc::new(MockGateway::default());
        let market = Arc::new(MarketData::new());
        market.set_depth(two_sided_book());
        let dir = tempfile::tempdir().unwrap();
        let archive = OrderLog::new(dir.path().join("orders.csv"));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap(),
        ));
        let ledger = Arc::new(OrderLedger::new(
            gateway.clone(),
            market.clone(),
            archive,
            clock,
            &IntervalsConfig::default(),
        ));
        let (alerts, _task) = AlertDispatcher::start(Arc::new(LogAlerts), 16);
        let config = EngineConfig {
            fill_grace_secs: grace_secs,
            ..EngineConfig::default()
        };
        let engine = Arc::new(ExecutionEngine::new(
            gateway.clone(),
            market.clone(),
            ledger.clone(),
            alerts,
            config,
        ));
        Fixture {
            engine,
            gateway,
            market,
            ledger,
            _dir: dir,
        }
    }

    fn two_sided_book() -> DepthSnapshot {
        DepthSnapshot {
            bids: vec![
                DepthLevel::new(dec!(99.9), dec!(5)),
                DepthLevel::new(dec!(99.8), dec!(5)),
            ],
            asks: vec![
                DepthLevel::new(dec!(100.1), dec!(5)),
                DepthLevel::new(dec!(100.2), dec!(5)),
            ],
        }
    }

    fn make_status(
        order_id: &str,
        side: OrderSide,
        status: OrderStatus,
        orig: Decimal,
        executed: Decimal,
    ) -> ExchangeOrder {
        ExchangeOrder {
            order_id: order_id.to_string(),
            client_order_id: String::new(),
            symbol: "BTCUSDT".to_string(),
            side,
            order_type: OrderType::Limit,
            status,
            orig_qty: orig,
            executed_qty: executed,
            price: dec!(100.0),
            avg_price: dec!(100.0),
            stop_price: Decimal::ZERO,
            reduce_only: false,
            update_time: 1_787_216_400_000,
        }
    }

    async fn wait_idle(engine: &ExecutionEngine) {
        while engine.is_busy() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_market_style_goes_straight_to_gateway() {
        let fixture = make_fixture(0);
        assert!(
            fixture
                .engine
                .execute(TradeIntent::market(OrderSide::Buy, dec!(0.5)))
        );
        wait_idle(&fixture.engine).await;

        let placed = fixture.gateway.placed.lock();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].order_type, OrderType::Market);
        assert_eq!(placed[0].quantity, dec!(0.5));
        assert_eq!(fixture.gateway.status_queries.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_second_intent_rejected_while_first_in_flight() {
        let fixture = make_fixture(60);
        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Buy, dec!(0.5)))
        );
        assert!(
            !fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Sell, dec!(0.5)))
        );

        fixture.engine.halt().await;
        // The canceled attempt withdrew its resting order on the way out.
        assert_eq!(fixture.gateway.cancels.load(Ordering::SeqCst), 1);
        assert!(
            fixture
                .engine
                .execute(TradeIntent::market(OrderSide::Buy, dec!(0.1)))
        );
        wait_idle(&fixture.engine).await;
    }

    #[tokio::test]
    async fn test_filled_within_grace_skips_fallback() {
        let fixture = make_fixture(0);
        *fixture.gateway.status_response.lock() = Some(make_status(
            "mock-1",
            OrderSide::Buy,
            OrderStatus::Filled,
            dec!(0.5),
            dec!(0.5),
        ));

        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Buy, dec!(0.5)))
        );
        wait_idle(&fixture.engine).await;

        assert_eq!(fixture.gateway.placed.lock().len(), 1);
        assert_eq!(fixture.gateway.cancels.load(Ordering::SeqCst), 0);
        let row = fixture.ledger.get("mock-1").unwrap();
        assert_eq!(row.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_partial_fill_cancels_then_markets_remainder() {
        let fixture = make_fixture(0);
        fixture.market.set_position(Position {
            quantity: dec!(1.0),
            entry_price: dec!(100.0),
            unrealized_pnl: Decimal::ZERO,
        });
        *fixture.gateway.status_response.lock() = Some(make_status(
            "mock-1",
            OrderSide::Sell,
            OrderStatus::PartiallyFilled,
            dec!(0.6),
            dec!(0.2),
        ));

        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Sell, dec!(0.6)))
        );
        wait_idle(&fixture.engine).await;

        assert_eq!(fixture.gateway.cancels.load(Ordering::SeqCst), 1);
        let placed = fixture.gateway.placed.lock();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].order_type, OrderType::Limit);
        assert_eq!(placed[1].order_type, OrderType::Market);
        assert_eq!(placed[1].quantity, dec!(0.4));
    }

    #[tokio::test]
    async fn test_flip_blocked_on_thin_book() {
        let fixture = make_fixture(0);
        fixture.market.set_position(Position {
            quantity: dec!(0.1),
            entry_price: dec!(100.0),
            unrealized_pnl: Decimal::ZERO,
        });
        // Thin bid side: 0.1 at the touch, the rest far below.
        fixture.market.set_depth(DepthSnapshot {
            bids: vec![
                DepthLevel::new(dec!(99.9), dec!(0.1)),
                DepthLevel::new(dec!(91.0), dec!(5)),
            ],
            asks: vec![DepthLevel::new(dec!(100.1), dec!(5))],
        });
        *fixture.gateway.status_response.lock() = Some(make_status(
            "mock-1",
            OrderSide::Sell,
            OrderStatus::New,
            dec!(1.0),
            Decimal::ZERO,
        ));

        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Sell, dec!(1.0)).with_slippage_bps(50))
        );
        wait_idle(&fixture.engine).await;

        // Resting order canceled, but no market order followed.
        assert_eq!(fixture.gateway.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.gateway.placed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_flip_with_absorbing_book_proceeds() {
        let fixture = make_fixture(0);
        fixture.market.set_position(Position {
            quantity: dec!(0.1),
            entry_price: dec!(100.0),
            unrealized_pnl: Decimal::ZERO,
        });
        *fixture.gateway.status_response.lock() = Some(make_status(
            "mock-1",
            OrderSide::Sell,
            OrderStatus::New,
            dec!(1.0),
            Decimal::ZERO,
        ));

        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Sell, dec!(1.0)).with_slippage_bps(50))
        );
        wait_idle(&fixture.engine).await;

        let placed = fixture.gateway.placed.lock();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].order_type, OrderType::Market);
        assert_eq!(placed[1].quantity, dec!(1.0));
    }

    #[tokio::test]
    async fn test_cancel_failure_aborts_fallback() {
        let fixture = make_fixture(0);
        fixture.gateway.fail_cancel.store(true, Ordering::SeqCst);
        *fixture.gateway.status_response.lock() = Some(make_status(
            "mock-1",
            OrderSide::Buy,
            OrderStatus::New,
            dec!(0.5),
            Decimal::ZERO,
        ));

        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Buy, dec!(0.5)))
        );
        wait_idle(&fixture.engine).await;

        assert_eq!(fixture.gateway.placed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_square_off_flattens_short_position() {
        let fixture = make_fixture(0);
        fixture.market.set_position(Position {
            quantity: dec!(-0.5),
            entry_price: dec!(100.0),
            unrealized_pnl: Decimal::ZERO,
        });

        fixture.engine.square_off().await;

        assert_eq!(fixture.gateway.cancel_alls.load(Ordering::SeqCst), 1);
        let placed = fixture.gateway.placed.lock();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].order_type, OrderType::Market);
        assert_eq!(placed[0].side, OrderSide::Buy);
        assert_eq!(placed[0].quantity, dec!(0.5));
        assert!(placed[0].reduce_only);
    }

    #[tokio::test]
    async fn test_square_off_with_flat_position_only_cancels() {
        let fixture = make_fixture(0);
        fixture.engine.square_off().await;

        assert_eq!(fixture.gateway.cancel_alls.load(Ordering::SeqCst), 1);
        assert!(fixture.gateway.placed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_limit_leaves_no_state() {
        let fixture = make_fixture(0);
        fixture.gateway.reject_orders.store(true, Ordering::SeqCst);

        assert!(
            fixture
                .engine
                .execute(TradeIntent::limit(OrderSide::Buy, dec!(0.5)))
        );
        wait_idle(&fixture.engine).await;

        assert!(fixture.gateway.placed.lock().is_empty());
        assert!(fixture.ledger.is_empty());
        assert_eq!(fixture.gateway.cancels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flips_position() {
        assert!(flips_position(dec!(1.0), dec!(-1.5)));
        assert!(flips_position(dec!(-0.4), dec!(0.5)));
        // Reducing, closing to exactly flat, and opening from flat are
        // not flips.
        assert!(!flips_position(dec!(1.0), dec!(-0.5)));
        assert!(!flips_position(dec!(1.0), dec!(-1.0)));
        assert!(!flips_position(Decimal::ZERO, dec!(2.0)));
        assert!(!flips_position(dec!(1.0), dec!(0.5)));
    }

    #[test]
    fn test_vwap_walks_levels_in_order() {
        let levels = vec![
            DepthLevel::new(dec!(100.0), dec!(1.0)),
            DepthLevel::new(dec!(101.0), dec!(2.0)),
        ];
        // 1.0 @ 100 + 0.5 @ 101 over 1.5 total.
        assert_eq!(
            vwap_for_quantity(&levels, dec!(1.5)),
            Some(dec!(150.5) / dec!(1.5))
        );
    }

    #[test]
    fn test_vwap_insufficient_depth() {
        let levels = vec![DepthLevel::new(dec!(100.0), dec!(1.0))];
        assert_eq!(vwap_for_quantity(&levels, dec!(1.5)), None);
        assert_eq!(vwap_for_quantity(&levels, Decimal::ZERO), None);
    }

    #[test]
    fn test_fallback_guard_buy_side() {
        let depth = DepthSnapshot {
            bids: vec![DepthLevel::new(dec!(99.0), dec!(5))],
            asks: vec![
                DepthLevel::new(dec!(100.0), dec!(0.1)),
                DepthLevel::new(dec!(103.0), dec!(5)),
            ],
        };
        // VWAP for 1.0 is 102.7, bound at 50 bps is 100.5.
        assert_eq!(
            fallback_guard(&depth, OrderSide::Buy, dec!(1.0), 50),
            Err(FallbackBlock::AdverseSlippage {
                vwap: dec!(102.7),
                bound: dec!(100.5),
            })
        );
        // A small order fills entirely at the touch.
        assert_eq!(
            fallback_guard(&depth, OrderSide::Buy, dec!(0.1), 50),
            Ok(dec!(100.0))
        );
    }

    #[test]
    fn test_fallback_guard_empty_book() {
        let depth = DepthSnapshot {
            bids: Vec::new(),
            asks: vec![DepthLevel::new(dec!(100.0), dec!(1))],
        };
        assert_eq!(
            fallback_guard(&depth, OrderSide::Sell, dec!(0.5), 0),
            Err(FallbackBlock::EmptyBook)
        );
    }
}
