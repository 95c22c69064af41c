//! Risk management.
//!
//! The pre-trade margin gate, protective-stop maintenance, margin and
//! VaR monitoring, and daily P&L bookkeeping all live here.

mod manager;
mod var;

pub use manager::RiskManager;
pub use var::{log_returns, percentile};
