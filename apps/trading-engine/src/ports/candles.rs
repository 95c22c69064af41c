//! Historical candle port.

use async_trait::async_trait;

use super::GatewayError;
use crate::models::Candle;

/// Port supplying historical daily candles for the traded instrument.
///
/// Used by the VaR loop; implementations typically share transport with
/// the exchange gateway.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Up to `limit` most recent daily candles, oldest first.
    async fn daily_candles(&self, limit: u32) -> Result<Vec<Candle>, GatewayError>;
}
