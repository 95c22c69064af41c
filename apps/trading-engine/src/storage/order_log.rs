//! Durable order archive: one CSV row per tracked order.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use super::StorageError;
use crate::models::TrackedOrder;

/// File-backed order archive with upsert-by-id persistence.
///
/// Every persist merges the given rows with the rows already on disk,
/// keyed by `order_id`, so repeated persists of the same order are
/// idempotent and the incoming (in-memory, most recent) version wins.
/// The file is rewritten through a temp file and an atomic rename.
#[derive(Debug, Clone)]
pub struct OrderLog {
    path: PathBuf,
}

impl OrderLog {
    /// Archive at the given file path. The file may not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All archived rows, in file order. A missing file is an empty archive.
    pub fn load(&self) -> Result<Vec<TrackedOrder>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }

    /// Merge `rows` into the archive by `order_id` and rewrite the file.
    pub fn merge(&self, rows: &[TrackedOrder]) -> Result<(), StorageError> {
        let mut table: HashMap<String, TrackedOrder> = self
            .load()?
            .into_iter()
            .map(|row| (row.order_id.clone(), row))
            .collect();
        for row in rows {
            table.insert(row.order_id.clone(), row.clone());
        }

        let mut merged: Vec<TrackedOrder> = table.into_values().collect();
        merged.sort_by(|a, b| {
            a.update_time
                .cmp(&b.update_time)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });

        self.write_all(&merged)?;
        debug!(rows = merged.len(), path = %self.path.display(), "Order archive written");
        Ok(())
    }

    fn write_all(&self, rows: &[TrackedOrder]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush().map_err(|e| StorageError::io(&tmp_path, e))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExchangeOrder, OrderSide, OrderStatus, OrderType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn make_row(id: &str, status: OrderStatus, update_time: i64) -> TrackedOrder {
        let order = ExchangeOrder {
            order_id: id.to_string(),
            client_order_id: format!("client-{id}"),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status,
            orig_qty: dec!(0.5),
            executed_qty: dec!(0.1),
            price: dec!(50000.0),
            avg_price: Decimal::ZERO,
            stop_price: Decimal::ZERO,
            reduce_only: false,
            update_time,
        };
        TrackedOrder::from_exchange(order, NaiveDate::from_ymd_opt(2026, 8, 20).unwrap())
    }

    #[test]
    fn test_missing_file_is_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("orders.csv"));
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn test_merge_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("orders.csv"));

        let mut row = make_row("1", OrderStatus::Filled, 1_700_000_000_000);
        row.realized_pnl = dec!(12.5);
        log.merge(&[row.clone()]).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], row);
    }

    #[test]
    fn test_merge_is_idempotent_and_keeps_latest() {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("orders.csv"));

        log.merge(&[make_row("1", OrderStatus::New, 1_700_000_000_000)])
            .unwrap();
        log.merge(&[
            make_row("1", OrderStatus::Filled, 1_700_000_500_000),
            make_row("2", OrderStatus::Canceled, 1_700_000_600_000),
        ])
        .unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 2);
        let row1 = loaded.iter().find(|r| r.order_id == "1").unwrap();
        assert_eq!(row1.status, OrderStatus::Filled);
        assert_eq!(row1.update_time, 1_700_000_500_000);
    }

    #[test]
    fn test_merge_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("nested/data/orders.csv"));
        log.merge(&[make_row("1", OrderStatus::New, 1)]).unwrap();
        assert_eq!(log.load().unwrap().len(), 1);
    }
}
