//! Daily P&L snapshots and exchange income records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tag distinguishing scheduled end-of-day rows from ad-hoc snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlKind {
    /// Scheduled end-of-day checkpoint, one per calendar day.
    #[serde(rename = "EOD")]
    Eod,
    /// Ad-hoc snapshot, written on shutdown.
    Temp,
}

/// One appended row of the daily risk journal.
///
/// The mixed spelling mirrors the journal's column headers: the order
/// ledger uses the exchange's `realizedPnl` naming, the risk journal
/// was always written with `realised_pnl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPnlRecord {
    /// Calendar date of the snapshot.
    pub date: NaiveDate,
    /// Row kind.
    pub kind: PnlKind,
    /// Value-at-Risk as a fraction of used margin.
    pub var_pct: f64,
    /// Value-at-Risk in quote currency.
    pub var_value: f64,
    /// Realized P&L accumulated for the day.
    pub realised_pnl: Decimal,
    /// Unrealized P&L at snapshot time.
    pub unrealised_pnl: Decimal,
}

/// Exchange income categories the engine queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncomeKind {
    /// Realized trading P&L.
    RealizedPnl,
    /// Funding-rate payments.
    FundingFee,
    /// Trading commissions.
    Commission,
}

/// A single account income entry reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecord {
    /// Income category.
    pub kind: IncomeKind,
    /// Signed amount in quote currency.
    pub amount: Decimal,
    /// Event time, milliseconds since the Unix epoch.
    pub time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pnl_kind_serialization() {
        assert_eq!(serde_json::to_string(&PnlKind::Eod).unwrap(), "\"EOD\"");
        assert_eq!(serde_json::to_string(&PnlKind::Temp).unwrap(), "\"Temp\"");
    }

    #[test]
    fn test_income_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&IncomeKind::RealizedPnl).unwrap(),
            "\"REALIZED_PNL\""
        );
    }
}
