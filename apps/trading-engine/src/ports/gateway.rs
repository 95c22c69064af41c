//! Exchange gateway port.
//!
//! Thin request/response interface to the exchange. Every call is
//! fallible; callers treat an error as "no result", log it, and abort
//! only the current attempt or tick.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ExchangeOrder, IncomeKind, IncomeRecord, OrderSide, OrderType};

/// Request to place an order on the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client order ID, generated per request.
    pub client_order_id: String,
    /// Symbol to trade.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity in base-asset units.
    pub quantity: Decimal,
    /// Limit price (for limit orders).
    pub price: Option<Decimal>,
    /// Stop trigger price (for stop orders).
    pub stop_price: Option<Decimal>,
    /// Whether the order may only reduce the position.
    pub reduce_only: bool,
}

impl OrderRequest {
    /// Create a market order request.
    #[must_use]
    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            reduce_only: false,
        }
    }

    /// Create a limit order request.
    #[must_use]
    pub fn limit(symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            stop_price: None,
            reduce_only: false,
        }
    }

    /// Create a stop-market order request.
    #[must_use]
    pub fn stop_market(symbol: &str, side: OrderSide, quantity: Decimal, stop_price: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::StopMarket,
            quantity,
            price: None,
            stop_price: Some(stop_price),
            reduce_only: false,
        }
    }

    /// Mark the request reduce-only.
    #[must_use]
    pub fn with_reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// Exchange gateway error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level failure (connection, serialization).
    #[error("Gateway transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// The call did not complete in time.
    #[error("Gateway call timed out")]
    Timeout,

    /// Order rejected by the exchange.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    NotFound {
        /// The missing order ID.
        order_id: String,
    },
}

/// Port for exchange interactions.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Place an order.
    async fn place_order(&self, request: OrderRequest) -> Result<ExchangeOrder, GatewayError>;

    /// Cancel one order by exchange order ID.
    async fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError>;

    /// Cancel every open order on the traded symbol.
    async fn cancel_all_orders(&self) -> Result<(), GatewayError>;

    /// Query the current state of one order.
    async fn order_status(&self, order_id: &str) -> Result<ExchangeOrder, GatewayError>;

    /// Recent account income entries of one category, newest last.
    async fn income_history(
        &self,
        limit: u32,
        kind: IncomeKind,
    ) -> Result<Vec<IncomeRecord>, GatewayError>;
}
