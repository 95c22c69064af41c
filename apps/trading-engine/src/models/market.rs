//! Order-book depth and candle models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price level of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price of the level.
    pub price: Decimal,
    /// Quantity resting at the level.
    pub qty: Decimal,
}

impl DepthLevel {
    /// Create a depth level.
    #[must_use]
    pub const fn new(price: Decimal, qty: Decimal) -> Self {
        Self { price, qty }
    }
}

/// Order-book depth snapshot, best levels first on each side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Bid levels, highest price first.
    pub bids: Vec<DepthLevel>,
    /// Ask levels, lowest price first.
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Best bid price, if the bid side has depth.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    /// Best ask price, if the ask side has depth.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }

    /// Mid price from the best bid and ask, `None` when either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid + ask) / Decimal::TWO)
    }
}

/// Daily OHLC candle, used for VaR history and the paper feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Close time, milliseconds since the Unix epoch.
    pub close_time: i64,
}

impl Candle {
    /// Create a candle.
    #[must_use]
    pub const fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal, close_time: i64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            close_time,
        }
    }
}

/// Round a price onto the instrument's tick grid.
#[must_use]
pub fn round_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size <= Decimal::ZERO {
        return price;
    }
    (price / tick_size).round() * tick_size
}
