//! Order-related types for execution tracking.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order - execute at best available price.
    Market,
    /// Limit order - execute at specified price or better.
    Limit,
    /// Stop-market order - becomes a market order when the stop price is reached.
    StopMarket,
}

/// Order status in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order accepted by the exchange, nothing filled yet.
    New,
    /// Order partially filled.
    PartiallyFilled,
    /// Order completely filled.
    Filled,
    /// Order canceled.
    Canceled,
    /// Order expired.
    Expired,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Expired)
    }

    /// Returns true if the order is still working (can be filled or canceled).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::New | Self::PartiallyFilled)
    }
}

/// An order as reported by the exchange.
///
/// The exchange is the source of truth for every field here; the engine
/// never edits them locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    /// Exchange-assigned order ID.
    pub order_id: String,
    /// Client-assigned order ID.
    pub client_order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Order status.
    pub status: OrderStatus,
    /// Requested quantity.
    pub orig_qty: Decimal,
    /// Filled quantity so far.
    pub executed_qty: Decimal,
    /// Limit price (zero for market orders).
    pub price: Decimal,
    /// Average fill price (zero until something fills).
    pub avg_price: Decimal,
    /// Stop trigger price (zero unless a stop order).
    pub stop_price: Decimal,
    /// Reduce-only flag.
    pub reduce_only: bool,
    /// Last update time, milliseconds since the Unix epoch.
    pub update_time: i64,
}

impl ExchangeOrder {
    /// Price to attribute to fills: the average fill price when the
    /// exchange reports one, otherwise the order's limit price.
    #[must_use]
    pub fn fill_price(&self) -> Decimal {
        if self.avg_price.is_zero() {
            self.price
        } else {
            self.avg_price
        }
    }

    /// Calendar date of the last update, when the timestamp is valid.
    #[must_use]
    pub fn update_date(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(self.update_time).map(|dt| dt.date_naive())
    }
}

/// A ledger row: the engine's durable view of one submitted order.
///
/// Exchange-owned fields are overwritten verbatim on reconciliation;
/// `realized_pnl` and `order_date` are derived locally and survive upserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedOrder {
    /// Exchange-assigned order ID (unique ledger key).
    pub order_id: String,
    /// Client-assigned order ID.
    pub client_order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Order status.
    pub status: OrderStatus,
    /// Requested quantity.
    pub orig_qty: Decimal,
    /// Filled quantity so far.
    pub executed_qty: Decimal,
    /// Limit price (zero for market orders).
    pub price: Decimal,
    /// Average fill price (zero until something fills).
    pub avg_price: Decimal,
    /// Stop trigger price (zero unless a stop order).
    pub stop_price: Decimal,
    /// Reduce-only flag.
    pub reduce_only: bool,
    /// Last update time, milliseconds since the Unix epoch.
    pub update_time: i64,
    /// Realized P&L attributed to this order's fills, derived locally.
    pub realized_pnl: Decimal,
    /// Calendar date used for retention, derived locally.
    pub order_date: NaiveDate,
}

impl TrackedOrder {
    /// Builds a fresh ledger row from an exchange response.
    ///
    /// `order_date` comes from the exchange timestamp when it parses,
    /// otherwise from `fallback_date` (the caller's "today").
    #[must_use]
    pub fn from_exchange(order: ExchangeOrder, fallback_date: NaiveDate) -> Self {
        let order_date = order.update_date().unwrap_or(fallback_date);
        Self {
            order_id: order.order_id,
            client_order_id: order.client_order_id,
            symbol: order.symbol,
            side: order.side,
            order_type: order.order_type,
            status: order.status,
            orig_qty: order.orig_qty,
            executed_qty: order.executed_qty,
            price: order.price,
            avg_price: order.avg_price,
            stop_price: order.stop_price,
            reduce_only: order.reduce_only,
            update_time: order.update_time,
            realized_pnl: Decimal::ZERO,
            order_date,
        }
    }

    /// Overwrites every exchange-owned field from a fresh response,
    /// leaving the locally-derived fields untouched.
    pub fn apply_exchange(&mut self, order: &ExchangeOrder) {
        self.client_order_id.clone_from(&order.client_order_id);
        self.symbol.clone_from(&order.symbol);
        self.side = order.side;
        self.order_type = order.order_type;
        self.status = order.status;
        self.orig_qty = order.orig_qty;
        self.executed_qty = order.executed_qty;
        self.price = order.price;
        self.avg_price = order.avg_price;
        self.stop_price = order.stop_price;
        self.reduce_only = order.reduce_only;
        self.update_time = order.update_time;
    }
}

/// How the execution engine should work a trade intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStyle {
    /// Rest at the mid price first, fall back to market for the remainder.
    Limit,
    /// Submit a market order immediately.
    Market,
}

/// A request to change exposure, consumed once by the execution engine.
#[derive(Debug, Clone, Copy)]
pub struct TradeIntent {
    /// Direction to trade.
    pub side: OrderSide,
    /// Quantity in base-asset units.
    pub quantity: Decimal,
    /// Slippage tolerance for the market fallback, in basis points.
    pub slippage_bps: u32,
    /// Execution style.
    pub style: ExecutionStyle,
    /// Whether resulting orders may only reduce the position.
    pub reduce_only: bool,
}

impl TradeIntent {
    /// Limit-first intent with no slippage tolerance configured.
    #[must_use]
    pub const fn limit(side: OrderSide, quantity: Decimal) -> Self {
        Self {
            side,
            quantity,
            slippage_bps: 0,
            style: ExecutionStyle::Limit,
            reduce_only: false,
        }
    }

    /// Immediate market intent, used by automated closers.
    #[must_use]
    pub const fn market(side: OrderSide, quantity: Decimal) -> Self {
        Self {
            side,
            quantity,
            slippage_bps: 0,
            style: ExecutionStyle::Market,
            reduce_only: false,
        }
    }

    /// Sets the slippage tolerance in basis points.
    #[must_use]
    pub const fn with_slippage_bps(mut self, bps: u32) -> Self {
        self.slippage_bps = bps;
        self
    }

    /// Marks the intent reduce-only.
    #[must_use]
    pub const fn with_reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}
