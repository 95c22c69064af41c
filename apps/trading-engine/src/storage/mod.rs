//! Durable CSV storage for the order archive and the risk journal.
//!
//! Two small file-backed stores: [`OrderLog`] (merge-by-id order
//! archive) and [`RiskJournal`] (append-only daily P&L log). Both are
//! plain CSV so operators can audit them with standard tooling.

mod order_log;
mod risk_log;

use thiserror::Error;

pub use order_log::OrderLog;
pub use risk_log::RiskJournal;

/// Durable storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure on a durable log.
    #[error("Storage IO error on '{path}': {source}")]
    Io {
        /// Path involved.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// CSV encode/decode failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
