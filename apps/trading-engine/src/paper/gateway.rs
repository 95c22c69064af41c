//! In-memory exchange simulator for paper trading.
//!
//! Fills follow the real matching rules in miniature: market orders
//! fill immediately at the mark with a small taker slippage, limit
//! orders rest until the traded price crosses the limit, stop-markets
//! trigger when the price crosses the stop. Fills mutate the paper
//! account and are published into the shared market store, so the rest
//! of the engine cannot tell it is not talking to a real venue.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::config::Config;
use crate::ledger::realized_pnl_delta;
use crate::market::MarketData;
use crate::models::{
    Candle, ExchangeOrder, IncomeKind, IncomeRecord, MarginSnapshot, OrderSide, OrderStatus,
    OrderType, Position, round_to_tick,
};
use crate::ports::{CandleSource, ExchangeGateway, GatewayError, OrderRequest};
use crate::time::Clock;

/// Wallet balance every paper account starts with.
const STARTING_BALANCE: Decimal = dec!(10000);
/// Taker slippage applied to immediate fills, in basis points.
const TAKER_SLIPPAGE_BPS: u32 = 2;
/// Maintenance margin rate used for the synthetic margin snapshot.
const MAINTENANCE_RATE: Decimal = dec!(0.004);
/// Daily move bound for synthetic candle history, in basis points.
const CANDLE_MOVE_BPS: i64 = 300;

/// Fallback price used before the feed has produced one.
pub(crate) const INITIAL_PRICE: Decimal = dec!(65000);

#[derive(Debug)]
struct PaperAccount {
    position_qty: Decimal,
    entry_price: Decimal,
    balance: Decimal,
    resting: HashMap<String, ExchangeOrder>,
    done: HashMap<String, ExchangeOrder>,
    income: Vec<IncomeRecord>,
}

impl Default for PaperAccount {
    fn default() -> Self {
        Self {
            position_qty: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            balance: STARTING_BALANCE,
            resting: HashMap::new(),
            done: HashMap::new(),
            income: Vec::new(),
        }
    }
}

/// Simulated exchange backed by an in-memory account.
pub struct PaperGateway {
    market: Arc<MarketData>,
    clock: Arc<dyn Clock>,
    state: RwLock<PaperAccount>,
    next_order_id: AtomicU64,
    tick_size: Decimal,
    qty_decimals: u32,
    leverage: u32,
}

impl PaperGateway {
    /// Fresh paper account over the shared market store.
    #[must_use]
    pub fn new(market: Arc<MarketData>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        info!(balance = %STARTING_BALANCE, "Paper gateway ready");
        Self {
            market,
            clock,
            state: RwLock::new(PaperAccount::default()),
            next_order_id: AtomicU64::new(0),
            tick_size: config.engine.tick_size,
            qty_decimals: config.engine.qty_decimals,
            leverage: config.engine.leverage,
        }
    }

    /// Run resting orders against the latest traded price and publish
    /// the account state into the market store.
    pub fn mark_to_market(&self, price: Decimal) {
        if price <= Decimal::ZERO {
            return;
        }
        let now = self.clock.now_utc().timestamp_millis();
        {
            let mut account = self.state.write();
            let ids: Vec<String> = account.resting.keys().cloned().collect();
            for id in ids {
                let crossed = account
                    .resting
                    .get(&id)
                    .and_then(|order| fill_trigger(order, price));
                let Some(fill_price) = crossed else {
                    continue;
                };
                let Some(mut order) = account.resting.remove(&id) else {
                    continue;
                };
                let quantity = order.orig_qty;
                debug!(order_id = %id, price = %fill_price, quantity = %quantity, "Paper order filled");
                self.apply_fill(&mut account, order.side, quantity, fill_price);
                order.status = OrderStatus::Filled;
                order.executed_qty = quantity;
                order.avg_price = fill_price;
                order.update_time = now;
                account.done.insert(id, order);
            }
        }
        self.publish();
    }

    /// Mutate the account for a fill, recording realized P&L from the
    /// closing portion and repricing the entry.
    fn apply_fill(
        &self,
        account: &mut PaperAccount,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) {
        let signed = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        let old = account.position_qty;
        let new = old + signed;

        if !old.is_zero() && old.signum() != signed.signum() {
            let closed = quantity.min(old.abs());
            let realized = realized_pnl_delta(side, price, account.entry_price, closed);
            account.balance += realized;
            account.income.push(IncomeRecord {
                kind: IncomeKind::RealizedPnl,
                amount: realized,
                time: self.clock.now_utc().timestamp_millis(),
            });
        }

        if new.is_zero() {
            account.entry_price = Decimal::ZERO;
        } else if old.is_zero() || old.signum() != new.signum() {
            account.entry_price = price;
        } else if old.signum() == signed.signum() {
            account.entry_price = (account.entry_price * old.abs() + price * quantity) / new.abs();
        }
        // A plain reduction keeps the original entry.
        account.position_qty = new;
    }

    /// Push position, margin, and open orders into the market store.
    fn publish(&self) {
        let price = self.market.last_price();
        let (position, margin, open_orders) = {
            let account = self.state.read();
            let unrealized = if price > Decimal::ZERO && !account.position_qty.is_zero() {
                account.position_qty * (price - account.entry_price)
            } else {
                Decimal::ZERO
            };
            let notional = account.position_qty.abs() * price;
            let initial = notional / Decimal::from(self.leverage);
            let total = account.balance + unrealized;
            let position = Position {
                quantity: account.position_qty,
                entry_price: account.entry_price,
                unrealized_pnl: unrealized,
            };
            let margin = MarginSnapshot {
                total_margin_balance: total,
                available_balance: total - initial,
                initial_margin: initial,
                maintenance_margin: notional * MAINTENANCE_RATE,
            };
            let open_orders: Vec<ExchangeOrder> = account.resting.values().cloned().collect();
            (position, margin, open_orders)
        };
        self.market.set_position(position);
        self.market.set_margin(margin);
        self.market.set_open_orders(open_orders);
    }

    /// Immediate fill price for a taker order at the given mark.
    fn taker_price(&self, mark: Decimal, side: OrderSide) -> Decimal {
        let shift = mark * Decimal::from(TAKER_SLIPPAGE_BPS) / Decimal::from(10_000);
        let raw = match side {
            OrderSide::Buy => mark + shift,
            OrderSide::Sell => mark - shift,
        };
        round_to_tick(raw, self.tick_size)
    }

    fn next_order_id(&self) -> String {
        format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    async fn place_order(&self, request: OrderRequest) -> Result<ExchangeOrder, GatewayError> {
        let now = self.clock.now_utc().timestamp_millis();
        let quantity = request.quantity.round_dp(self.qty_decimals);
        if quantity <= Decimal::ZERO {
            return Err(GatewayError::Rejected {
                reason: "quantity must be positive".to_string(),
            });
        }

        let order = {
            let mut account = self.state.write();

            let quantity = if request.reduce_only {
                let closing = match request.side {
                    OrderSide::Buy => account.position_qty < Decimal::ZERO,
                    OrderSide::Sell => account.position_qty > Decimal::ZERO,
                };
                if !closing {
                    return Err(GatewayError::Rejected {
                        reason: "reduce-only order would not reduce the position".to_string(),
                    });
                }
                quantity.min(account.position_qty.abs())
            } else {
                quantity
            };

            let mut order = ExchangeOrder {
                order_id: self.next_order_id(),
                client_order_id: request.client_order_id.clone(),
                symbol: request.symbol.clone(),
                side: request.side,
                order_type: request.order_type,
                status: OrderStatus::New,
                orig_qty: quantity,
                executed_qty: Decimal::ZERO,
                price: request.price.unwrap_or_default(),
                avg_price: Decimal::ZERO,
                stop_price: request.stop_price.unwrap_or_default(),
                reduce_only: request.reduce_only,
                update_time: now,
            };

            match request.order_type {
                OrderType::Market => {
                    let mark = self.market.last_price();
                    if mark <= Decimal::ZERO {
                        return Err(GatewayError::Rejected {
                            reason: "no market price yet".to_string(),
                        });
                    }
                    let fill = self.taker_price(mark, request.side);
                    self.apply_fill(&mut account, request.side, quantity, fill);
                    order.status = OrderStatus::Filled;
                    order.executed_qty = quantity;
                    order.avg_price = fill;
                    account.done.insert(order.order_id.clone(), order.clone());
                    info!(order_id = %order.order_id, price = %fill, quantity = %quantity, "Paper market order filled");
                }
                OrderType::Limit => {
                    if order.price <= Decimal::ZERO {
                        return Err(GatewayError::Rejected {
                            reason: "limit order requires a positive price".to_string(),
                        });
                    }
                    account.resting.insert(order.order_id.clone(), order.clone());
                    debug!(order_id = %order.order_id, price = %order.price, "Paper limit order resting");
                }
                OrderType::StopMarket => {
                    if order.stop_price <= Decimal::ZERO {
                        return Err(GatewayError::Rejected {
                            reason: "stop order requires a positive trigger".to_string(),
                        });
                    }
                    account.resting.insert(order.order_id.clone(), order.clone());
                    debug!(order_id = %order.order_id, trigger = %order.stop_price, "Paper stop order resting");
                }
            }
            order
        };
        self.publish();
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError> {
        {
            let mut account = self.state.write();
            let Some(mut order) = account.resting.remove(order_id) else {
                return Err(GatewayError::NotFound {
                    order_id: order_id.to_string(),
                });
            };
            order.status = OrderStatus::Canceled;
            order.update_time = self.clock.now_utc().timestamp_millis();
            account.done.insert(order.order_id.clone(), order);
        }
        self.publish();
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<(), GatewayError> {
        {
            let mut account = self.state.write();
            let now = self.clock.now_utc().timestamp_millis();
            let resting: Vec<ExchangeOrder> = account.resting.drain().map(|(_, o)| o).collect();
            for mut order in resting {
                order.status = OrderStatus::Canceled;
                order.update_time = now;
                account.done.insert(order.order_id.clone(), order);
            }
        }
        self.publish();
        Ok(())
    }

    async fn order_status(&self, order_id: &str) -> Result<ExchangeOrder, GatewayError> {
        let account = self.state.read();
        account
            .resting
            .get(order_id)
            .or_else(|| account.done.get(order_id))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                order_id: order_id.to_string(),
            })
    }

    async fn income_history(
        &self,
        limit: u32,
        kind: IncomeKind,
    ) -> Result<Vec<IncomeRecord>, GatewayError> {
        let account = self.state.read();
        let matching: Vec<IncomeRecord> = account
            .income
            .iter()
            .filter(|record| record.kind == kind)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching[skip..].to_vec())
    }
}

#[async_trait]
impl CandleSource for PaperGateway {
    /// Synthetic daily history random-walked from the current price.
    ///
    /// Only the shape of the return distribution matters to consumers,
    /// not the path, so the walk is regenerated on every call.
    async fn daily_candles(&self, limit: u32) -> Result<Vec<Candle>, GatewayError> {
        let mut price = {
            let last = self.market.last_price();
            if last <= Decimal::ZERO { INITIAL_PRICE } else { last }
        };
        let now_ms = self.clock.now_utc().timestamp_millis();
        let mut rng = rand::rng();
        let mut candles = Vec::with_capacity(limit as usize);
        for i in 0..limit {
            let bps: i64 = rng.random_range(-CANDLE_MOVE_BPS..=CANDLE_MOVE_BPS);
            let next = (price + price * Decimal::from(bps) / Decimal::from(10_000)).round_dp(2);
            let (low, high) = if next < price { (next, price) } else { (price, next) };
            let close_time = now_ms - i64::from(limit - 1 - i) * 86_400_000;
            candles.push(Candle::new(price, high, low, next, close_time));
            price = next;
        }
        Ok(candles)
    }
}

/// Fill price for a resting order given the latest traded price, if the
/// price crossed it.
fn fill_trigger(order: &ExchangeOrder, price: Decimal) -> Option<Decimal> {
    match order.order_type {
        OrderType::Limit => match order.side {
            OrderSide::Buy if price <= order.price => Some(order.price),
            OrderSide::Sell if price >= order.price => Some(order.price),
            _ => None,
        },
        OrderType::StopMarket => match order.side {
            OrderSide::Buy if price >= order.stop_price => Some(order.stop_price),
            OrderSide::Sell if price <= order.stop_price => Some(order.stop_price),
            _ => None,
        },
        OrderType::Market => Some(price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn make_gateway() -> (Arc<PaperGateway>, Arc<MarketData>) {
        let market = Arc::new(MarketData::new());
        market.set_price(dec!(100.0));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap(),
        ));
        let gateway = Arc::new(PaperGateway::new(
            market.clone(),
            clock,
            &Config::default(),
        ));
        (gateway, market)
    }

    #[tokio::test]
    async fn test_market_order_fills_immediately() {
        let (gateway, market) = make_gateway();
        let order = gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_qty, dec!(0.5));
        // Taker pays at or above the mark.
        assert!(order.avg_price >= dec!(100.0));

        let position = market.position();
        assert_eq!(position.quantity, dec!(0.5));
        assert_eq!(position.entry_price, order.avg_price);
    }

    #[tokio::test]
    async fn test_limit_order_rests_until_price_crosses() {
        let (gateway, market) = make_gateway();
        let order = gateway
            .place_order(OrderRequest::limit(
                "BTCUSDT",
                OrderSide::Buy,
                dec!(0.5),
                dec!(99.0),
            ))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(market.open_orders().len(), 1);

        // Price stays above the limit: still resting.
        gateway.mark_to_market(dec!(99.5));
        assert_eq!(
            gateway.order_status(&order.order_id).await.unwrap().status,
            OrderStatus::New
        );

        gateway.mark_to_market(dec!(98.9));
        let filled = gateway.order_status(&order.order_id).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(filled.avg_price, dec!(99.0));
        assert_eq!(market.position().quantity, dec!(0.5));
        assert!(market.open_orders().is_empty());
    }

    #[tokio::test]
    async fn test_stop_market_triggers_and_realizes_loss() {
        let (gateway, market) = make_gateway();
        let entry = gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();
        let stop = gateway
            .place_order(
                OrderRequest::stop_market("BTCUSDT", OrderSide::Sell, dec!(0.5), dec!(95.0))
                    .with_reduce_only(),
            )
            .await
            .unwrap();
        assert_eq!(stop.status, OrderStatus::New);

        gateway.mark_to_market(dec!(94.8));

        let done = gateway.order_status(&stop.order_id).await.unwrap();
        assert_eq!(done.status, OrderStatus::Filled);
        assert_eq!(done.avg_price, dec!(95.0));
        assert!(market.position().is_flat());

        let income = gateway
            .income_history(10, IncomeKind::RealizedPnl)
            .await
            .unwrap();
        assert_eq!(income.len(), 1);
        assert_eq!(income[0].amount, (dec!(95.0) - entry.avg_price) * dec!(0.5));
        assert!(income[0].amount < Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reduce_only_clamps_to_position() {
        let (gateway, market) = make_gateway();
        gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();

        let close = gateway
            .place_order(
                OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(2.0)).with_reduce_only(),
            )
            .await
            .unwrap();
        assert_eq!(close.executed_qty, dec!(0.5));
        assert!(market.position().is_flat());

        // Nothing left to reduce.
        let rejected = gateway
            .place_order(
                OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(0.5)).with_reduce_only(),
            )
            .await;
        assert!(matches!(rejected, Err(GatewayError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_flip_establishes_new_entry() {
        let (gateway, market) = make_gateway();
        gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();
        let flip = gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(1.0)))
            .await
            .unwrap();

        let position = market.position();
        assert_eq!(position.quantity, dec!(-0.5));
        assert_eq!(position.entry_price, flip.avg_price);

        let income = gateway
            .income_history(10, IncomeKind::RealizedPnl)
            .await
            .unwrap();
        assert_eq!(income.len(), 1);
    }

    #[tokio::test]
    async fn test_adding_volume_weights_the_entry() {
        let (gateway, market) = make_gateway();
        let first = gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();
        market.set_price(dec!(102.0));
        let second = gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();

        let expected = (first.avg_price * dec!(0.5) + second.avg_price * dec!(0.5)) / dec!(1.0);
        assert_eq!(market.position().entry_price, expected);
        assert_eq!(market.position().quantity, dec!(1.0));
    }

    #[tokio::test]
    async fn test_cancel_and_cancel_all() {
        let (gateway, market) = make_gateway();
        let a = gateway
            .place_order(OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.1), dec!(90.0)))
            .await
            .unwrap();
        let b = gateway
            .place_order(OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.1), dec!(91.0)))
            .await
            .unwrap();
        assert_eq!(market.open_orders().len(), 2);

        gateway.cancel_order(&a.order_id).await.unwrap();
        assert_eq!(
            gateway.order_status(&a.order_id).await.unwrap().status,
            OrderStatus::Canceled
        );
        assert!(matches!(
            gateway.cancel_order(&a.order_id).await,
            Err(GatewayError::NotFound { .. })
        ));

        gateway.cancel_all_orders().await.unwrap();
        assert!(market.open_orders().is_empty());
        assert_eq!(
            gateway.order_status(&b.order_id).await.unwrap().status,
            OrderStatus::Canceled
        );
    }

    #[tokio::test]
    async fn test_margin_snapshot_tracks_notional() {
        let (gateway, market) = make_gateway();
        gateway
            .place_order(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(1.0)))
            .await
            .unwrap();

        let margin = market.margin();
        // Notional 1.0 * 100 at 50x leverage locks 2 of initial margin.
        assert_eq!(margin.initial_margin, dec!(2.0));
        assert!(margin.total_margin_balance > Decimal::ZERO);
        assert_eq!(
            margin.available_balance,
            margin.total_margin_balance - dec!(2.0)
        );
    }

    #[tokio::test]
    async fn test_synthetic_candles_have_positive_closes() {
        let (gateway, _market) = make_gateway();
        let candles = gateway.daily_candles(30).await.unwrap();
        assert_eq!(candles.len(), 30);
        assert!(candles.iter().all(|c| c.close > Decimal::ZERO));
        assert!(candles.windows(2).all(|w| w[0].close_time < w[1].close_time));
    }

    #[test]
    fn test_fill_trigger_rules() {
        let mut order = ExchangeOrder {
            order_id: "x".to_string(),
            client_order_id: String::new(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status: OrderStatus::New,
            orig_qty: dec!(1.0),
            executed_qty: Decimal::ZERO,
            price: dec!(99.0),
            avg_price: Decimal::ZERO,
            stop_price: Decimal::ZERO,
            reduce_only: false,
            update_time: 0,
        };
        assert_eq!(fill_trigger(&order, dec!(99.5)), None);
        assert_eq!(fill_trigger(&order, dec!(99.0)), Some(dec!(99.0)));

        order.side = OrderSide::Sell;
        order.order_type = OrderType::StopMarket;
        order.stop_price = dec!(95.0);
        assert_eq!(fill_trigger(&order, dec!(95.5)), None);
        assert_eq!(fill_trigger(&order, dec!(94.9)), Some(dec!(95.0)));
    }
}
