//! Core domain models for the trading engine.
//!
//! These types define the data structures for orders, positions, market
//! snapshots, and P&L records shared by every component.

mod market;
mod order;
mod pnl;
mod position;

pub use market::{Candle, DepthLevel, DepthSnapshot, round_to_tick};
pub use order::{
    ExchangeOrder, ExecutionStyle, OrderSide, OrderStatus, OrderType, TrackedOrder, TradeIntent,
};
pub use pnl::{DailyPnlRecord, IncomeKind, IncomeRecord, PnlKind};
pub use position::{MarginSnapshot, Position, PositionSide};
