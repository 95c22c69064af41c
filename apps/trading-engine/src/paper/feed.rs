//! Synthetic market feed for paper trading.
//!
//! Random-walks the mark price once a second, fabricates a small
//! order book around it, and marks the paper gateway to market so
//! resting orders fill. Together with the gateway this closes the
//! loop the live feed and exchange would otherwise provide.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::PaperGateway;
use super::gateway::INITIAL_PRICE;
use crate::config::Config;
use crate::market::MarketData;
use crate::models::{DepthLevel, DepthSnapshot, round_to_tick};

/// Seconds between price ticks.
const FEED_INTERVAL_SECS: u64 = 1;
/// Largest per-tick move, in basis points either way.
const WALK_BPS: i64 = 5;
/// Book levels fabricated on each side.
const DEPTH_LEVELS: u32 = 5;

/// Price and depth generator for paper trading.
pub struct PaperFeed {
    market: Arc<MarketData>,
    gateway: Arc<PaperGateway>,
    tick_size: Decimal,
    interval: Duration,
}

impl PaperFeed {
    /// Build the feed over the shared market store and paper gateway.
    #[must_use]
    pub fn new(market: Arc<MarketData>, gateway: Arc<PaperGateway>, config: &Config) -> Self {
        Self {
            market,
            gateway,
            tick_size: config.engine.tick_size,
            interval: Duration::from_secs(FEED_INTERVAL_SECS),
        }
    }

    /// Background price loop.
    pub async fn run(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Paper feed started");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Paper feed stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// One price step: walk, publish, and mark resting orders.
    pub fn tick(&self) {
        let mut rng = rand::rng();
        let last = self.market.last_price();
        let price = if last <= Decimal::ZERO {
            info!(price = %INITIAL_PRICE, "Paper feed seeded");
            INITIAL_PRICE
        } else {
            let bps: i64 = rng.random_range(-WALK_BPS..=WALK_BPS);
            let next = round_to_tick(
                last + last * Decimal::from(bps) / Decimal::from(10_000),
                self.tick_size,
            );
            if next <= Decimal::ZERO { last } else { next }
        };

        self.market.set_price(price);
        self.market.set_depth(self.synthetic_depth(price, &mut rng));
        self.gateway.mark_to_market(price);
    }

    /// Symmetric book around the price, one tick per level.
    fn synthetic_depth(&self, price: Decimal, rng: &mut impl Rng) -> DepthSnapshot {
        let mut bids = Vec::with_capacity(DEPTH_LEVELS as usize);
        let mut asks = Vec::with_capacity(DEPTH_LEVELS as usize);
        for level in 1..=DEPTH_LEVELS {
            let offset = self.tick_size * Decimal::from(level);
            let bid_qty = Decimal::from(rng.random_range(500..=5000_i64)) / Decimal::from(1000);
            let ask_qty = Decimal::from(rng.random_range(500..=5000_i64)) / Decimal::from(1000);
            bids.push(DepthLevel::new(price - offset, bid_qty));
            asks.push(DepthLevel::new(price + offset, ask_qty));
        }
        DepthSnapshot { bids, asks }
    }
}
