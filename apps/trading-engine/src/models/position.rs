//! Position and account margin models.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::OrderSide;

/// Position direction, derived from the signed quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    /// Net long exposure.
    Long,
    /// Net short exposure.
    Short,
    /// No exposure.
    Flat,
}

impl PositionSide {
    /// Order side that closes a position on this side, if any.
    #[must_use]
    pub const fn closing_order_side(self) -> Option<OrderSide> {
        match self {
            Self::Long => Some(OrderSide::Sell),
            Self::Short => Some(OrderSide::Buy),
            Self::Flat => None,
        }
    }
}

/// The current position on the traded instrument.
///
/// Owned by the market-state store; mutated only by the exchange and
/// reflected here on the next refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Signed quantity in base-asset units (positive long, negative short).
    pub quantity: Decimal,
    /// Average entry price.
    pub entry_price: Decimal,
    /// Unrealized P&L at the current mark price.
    pub unrealized_pnl: Decimal,
}

impl Position {
    /// A position with no exposure.
    #[must_use]
    pub const fn flat() -> Self {
        Self {
            quantity: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    /// Direction derived from the quantity sign.
    #[must_use]
    pub fn side(&self) -> PositionSide {
        if self.quantity > Decimal::ZERO {
            PositionSide::Long
        } else if self.quantity < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }

    /// Returns true when there is no exposure.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// Account margin figures for the derivatives account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    /// Total margin balance (wallet balance plus unrealized P&L).
    pub total_margin_balance: Decimal,
    /// Balance available for new orders.
    pub available_balance: Decimal,
    /// Initial margin locked by open positions and orders.
    pub initial_margin: Decimal,
    /// Maintenance margin requirement.
    pub maintenance_margin: Decimal,
}

impl MarginSnapshot {
    /// Initial margin currently in use.
    #[must_use]
    pub fn used_initial_margin(&self) -> Decimal {
        self.total_margin_balance - self.available_balance
    }

    /// Available/total ratio, `None` when the account holds nothing.
    #[must_use]
    pub fn available_ratio(&self) -> Option<f64> {
        if self.total_margin_balance.is_zero() {
            None
        } else {
            (self.available_balance / self.total_margin_balance).to_f64()
        }
    }
}
