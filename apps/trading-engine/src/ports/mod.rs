//! Ports to external collaborators.
//!
//! The engine core depends only on these traits; adapters (the paper
//! exchange in-tree, real exchange transports out-of-tree) implement
//! them and are injected at composition time.

mod alerts;
mod candles;
mod gateway;

pub use alerts::{AlertChannel, AlertDispatcher, AlertSeverity, LogAlerts};
pub use candles::CandleSource;
pub use gateway::{ExchangeGateway, GatewayError, OrderRequest};
