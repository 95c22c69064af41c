//! Alert channel port and the non-blocking dispatcher in front of it.
//!
//! Risk loops raise alerts from hot paths, so the dispatcher's
//! `warning`/`critical` must never block or fail: alerts go through a
//! bounded queue drained by a forwarder task, and overflow drops the
//! alert with a log line rather than stalling a trading loop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    /// Operator attention requested.
    Warning,
    /// Immediate operator attention required; collaborators are expected
    /// to repeat critical alerts until acknowledged.
    Critical,
}

/// Port for delivering alerts to an external channel.
///
/// Implementations handle their own transport failures internally (log
/// and drop); delivery is best-effort by design.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Deliver one alert.
    async fn send(&self, severity: AlertSeverity, text: &str);
}

/// Alert channel that writes to the process log.
///
/// The safe default, and the only channel wired in paper mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerts;

#[async_trait]
impl AlertChannel for LogAlerts {
    async fn send(&self, severity: AlertSeverity, text: &str) {
        match severity {
            AlertSeverity::Warning => warn!(alert = text, "Alert"),
            AlertSeverity::Critical => error!(alert = text, "Critical alert"),
        }
    }
}

#[derive(Debug)]
struct Alert {
    severity: AlertSeverity,
    text: String,
}

/// Non-blocking front end to an [`AlertChannel`].
///
/// Cheap to clone; every component that raises alerts holds one.
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
}

impl AlertDispatcher {
    /// Default queue depth between the trading loops and the channel.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Start a dispatcher draining into `channel`.
    ///
    /// The forwarder task ends once every dispatcher clone is dropped
    /// and the queue has drained; await the handle during shutdown to
    /// flush pending alerts.
    #[must_use]
    pub fn start(channel: Arc<dyn AlertChannel>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Alert>(capacity);
        let handle = tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                channel.send(alert.severity, &alert.text).await;
            }
        });
        (Self { tx }, handle)
    }

    /// Queue a warning alert. Never blocks.
    pub fn warning(&self, text: impl Into<String>) {
        self.push(AlertSeverity::Warning, text.into());
    }

    /// Queue a critical alert. Never blocks.
    pub fn critical(&self, text: impl Into<String>) {
        self.push(AlertSeverity::Critical, text.into());
    }

    fn push(&self, severity: AlertSeverity, text: String) {
        if let Err(e) = self.tx.try_send(Alert { severity, text }) {
            warn!(error = %e, "Alert queue full, dropping alert");
        }
    }
}
