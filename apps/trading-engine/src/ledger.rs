//! Order ledger: the authoritative local record of every submitted order.
//!
//! A reconciled upsert-by-id table. The exchange is the source of truth
//! for order lifecycle fields; the ledger derives realized P&L and the
//! retention date locally and never lets the exchange overwrite them.
//! Orders stay in memory while open or dated today; everything else is
//! archived to the durable order log and evicted at the daily rollover.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::IntervalsConfig;
use crate::market::MarketData;
use crate::models::{ExchangeOrder, OrderSide, OrderStatus, Position, TrackedOrder};
use crate::ports::ExchangeGateway;
use crate::storage::{OrderLog, StorageError};
use crate::time::Clock;

/// Reconciled order table shared by the execution engine and the risk
/// manager.
///
/// The table lock guards every read-modify-write sequence; gateway
/// calls never happen under it.
pub struct OrderLedger {
    table: Mutex<HashMap<String, TrackedOrder>>,
    gateway: Arc<dyn ExchangeGateway>,
    market: Arc<MarketData>,
    archive: OrderLog,
    clock: Arc<dyn Clock>,
    reconcile_interval: Duration,
    rollover_check_interval: Duration,
}

impl OrderLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        market: Arc<MarketData>,
        archive: OrderLog,
        clock: Arc<dyn Clock>,
        intervals: &IntervalsConfig,
    ) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            gateway,
            market,
            archive,
            clock,
            reconcile_interval: Duration::from_secs(intervals.reconcile_secs),
            rollover_check_interval: Duration::from_secs(intervals.rollover_check_secs),
        }
    }

    /// Seed the table from the durable archive: only orders dated today
    /// or still open come back into memory.
    pub fn load_from_archive(&self) -> Result<usize, StorageError> {
        let today = self.clock.today_utc();
        let rows = self.archive.load()?;
        let mut table = self.table.lock();
        let mut loaded = 0;
        for row in rows {
            if row.order_date == today || row.status.is_active() {
                table.insert(row.order_id.clone(), row);
                loaded += 1;
            }
        }
        info!(orders = loaded, "Order ledger seeded from archive");
        Ok(loaded)
    }

    /// Upsert an order by `order_id`.
    ///
    /// Exchange-owned fields take the new values; a pre-existing row's
    /// derived `realized_pnl` and `order_date` survive the upsert.
    pub fn append(&self, order: TrackedOrder) {
        let mut table = self.table.lock();
        match table.entry(order.order_id.clone()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                let realized_pnl = row.realized_pnl;
                let order_date = row.order_date;
                *row = order;
                row.realized_pnl = realized_pnl;
                row.order_date = order_date;
            }
            Entry::Vacant(entry) => {
                debug!(order_id = %order.order_id, status = ?order.status, "Order tracked");
                entry.insert(order);
            }
        }
    }

    /// Builds and appends a ledger row from an exchange response, deriving
    /// the retention date from the response timestamp or today.
    pub fn track(&self, order: ExchangeOrder) {
        self.append(TrackedOrder::from_exchange(order, self.clock.today_utc()));
    }

    /// One row by order ID.
    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<TrackedOrder> {
        self.table.lock().get(order_id).cloned()
    }

    /// Snapshot of every in-memory row.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TrackedOrder> {
        self.table.lock().values().cloned().collect()
    }

    /// Number of in-memory rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Whether the ledger holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// One reconciliation pass over every order still reported open.
    ///
    /// The position reference is snapshotted once at the start of the
    /// pass so a fill observed mid-pass cannot shift the entry price
    /// used to value its own delta.
    pub async fn reconcile_once(&self) {
        let open_ids: Vec<String> = {
            let table = self.table.lock();
            table
                .values()
                .filter(|row| row.status.is_active())
                .map(|row| row.order_id.clone())
                .collect()
        };
        if open_ids.is_empty() {
            return;
        }

        let reference = self.market.position();
        for order_id in open_ids {
            match self.gateway.order_status(&order_id).await {
                Ok(update) => self.merge_update(&update, &reference),
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Order status query failed, will retry");
                }
            }
        }
    }

    /// Merge a fresh exchange response into the table, attributing
    /// realized P&L for any newly filled quantity.
    fn merge_update(&self, update: &ExchangeOrder, reference: &Position) {
        let mut table = self.table.lock();
        let Some(row) = table.get_mut(&update.order_id) else {
            return;
        };

        let delta_qty = update.executed_qty - row.executed_qty;
        let realizes = matches!(
            update.status,
            OrderStatus::Filled | OrderStatus::PartiallyFilled | OrderStatus::Canceled
        );
        if delta_qty > Decimal::ZERO && realizes {
            let realized = realized_pnl_delta(
                update.side,
                update.fill_price(),
                reference.entry_price,
                delta_qty,
            );
            row.realized_pnl += realized;
            info!(
                order_id = %update.order_id,
                delta_qty = %delta_qty,
                fill_price = %update.fill_price(),
                realized = %realized,
                "Fill reconciled"
            );
        }

        row.apply_exchange(update);
    }

    /// Merge-write every in-memory row into the durable archive.
    pub fn persist(&self) -> Result<(), StorageError> {
        let rows = self.snapshot();
        self.archive.merge(&rows)
    }

    /// End-of-day rollover: archive every row dated before today, then
    /// evict the archived rows that are no longer open.
    pub fn rollover(&self) -> Result<(), StorageError> {
        let today = self.clock.today_utc();
        let stale: Vec<TrackedOrder> = {
            let table = self.table.lock();
            table
                .values()
                .filter(|row| row.order_date < today)
                .cloned()
                .collect()
        };
        if stale.is_empty() {
            return Ok(());
        }

        self.archive.merge(&stale)?;

        let mut table = self.table.lock();
        table.retain(|_, row| row.order_date >= today || row.status.is_active());
        info!(
            archived = stale.len(),
            retained = table.len(),
            "End-of-day ledger rollover"
        );
        Ok(())
    }

    /// Background reconciliation loop.
    pub async fn run_reconcile(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(interval_secs = self.reconcile_interval.as_secs(), "Reconciliation loop started");
        let mut interval = tokio::time::interval(self.reconcile_interval);
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Reconciliation loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.reconcile_once().await;
                }
            }
        }
    }

    /// Background rollover loop: fires once per calendar-day change.
    pub async fn run_rollover(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(
            interval_secs = self.rollover_check_interval.as_secs(),
            "Rollover loop started"
        );
        let mut last_day = self.clock.today_utc();
        let mut interval = tokio::time::interval(self.rollover_check_interval);
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    info!("Rollover loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    let today = self.clock.today_utc();
                    if today > last_day {
                        match self.rollover() {
                            Ok(()) => last_day = today,
                            // Not advancing last_day retries on the next tick.
                            Err(e) => error!(error = %e, "Ledger rollover failed"),
                        }
                    }
                }
            }
        }
    }
}

/// Realized P&L for a fill delta against the pre-fill entry price.
///
/// The side factor is +1 for SELL and -1 for BUY: closing a long
/// realizes gain when the fill price exceeds entry, closing a short
/// when it is below entry.
pub(crate) fn realized_pnl_delta(
    side: OrderSide,
    fill_price: Decimal,
    reference_entry: Decimal,
    delta_qty: Decimal,
) -> Decimal {
    let side_factor = match side {
        OrderSide::Sell => Decimal::ONE,
        OrderSide::Buy => Decimal::NEGATIVE_ONE,
    };
    (fill_price - reference_entry) * delta_qty * side_factor
}
