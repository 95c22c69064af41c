//! Shared market-state store.
//!
//! A continuously refreshed snapshot of price, order-book depth,
//! account margin, the current position, and the raw open-order list.
//! Feed adapters write, core components read. All getters return owned
//! snapshots, so no lock guard ever crosses an await point, and
//! readers tolerate slightly stale data by design.

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::models::{DepthSnapshot, ExchangeOrder, MarginSnapshot, Position};

/// Shared, eventually-consistent market state for one instrument.
#[derive(Debug, Default)]
pub struct MarketData {
    price: RwLock<Decimal>,
    depth: RwLock<DepthSnapshot>,
    position: RwLock<Position>,
    margin: RwLock<MarginSnapshot>,
    open_orders: RwLock<Vec<ExchangeOrder>>,
}

impl MarketData {
    /// Empty store; every snapshot starts zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last traded (mark) price.
    #[must_use]
    pub fn last_price(&self) -> Decimal {
        *self.price.read()
    }

    /// Mid price from the current depth snapshot.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        self.depth.read().mid_price()
    }

    /// Current order-book depth.
    #[must_use]
    pub fn depth(&self) -> DepthSnapshot {
        self.depth.read().clone()
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Position {
        *self.position.read()
    }

    /// Current account margin figures.
    #[must_use]
    pub fn margin(&self) -> MarginSnapshot {
        *self.margin.read()
    }

    /// Raw list of open orders as last reported by the exchange.
    #[must_use]
    pub fn open_orders(&self) -> Vec<ExchangeOrder> {
        self.open_orders.read().clone()
    }

    /// Refresh the mark price.
    pub fn set_price(&self, price: Decimal) {
        *self.price.write() = price;
    }

    /// Refresh the depth snapshot.
    pub fn set_depth(&self, depth: DepthSnapshot) {
        *self.depth.write() = depth;
    }

    /// Refresh the position.
    pub fn set_position(&self, position: Position) {
        *self.position.write() = position;
    }

    /// Refresh the margin figures.
    pub fn set_margin(&self, margin: MarginSnapshot) {
        *self.margin.write() = margin;
    }

    /// Refresh the open-order list.
    pub fn set_open_orders(&self, orders: Vec<ExchangeOrder>) {
        *self.open_orders.write() = orders;
    }
}
