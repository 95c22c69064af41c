//! Durable log locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Paths for the durable CSV logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding all durable files; created on startup if absent.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Order archive file name, relative to `data_dir`.
    #[serde(default = "default_order_log")]
    pub order_log: String,
    /// Risk journal file name, relative to `data_dir`.
    #[serde(default = "default_risk_log")]
    pub risk_log: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_order_log() -> String {
    "orders.csv".to_string()
}

fn default_risk_log() -> String {
    "risk_history.csv".to_string()
}

impl StorageConfig {
    /// Full path of the order archive.
    #[must_use]
    pub fn order_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.order_log)
    }

    /// Full path of the risk journal.
    #[must_use]
    pub fn risk_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.risk_log)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            order_log: default_order_log(),
            risk_log: default_risk_log(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_join_data_dir() {
        let config = StorageConfig::default();
        assert_eq!(config.order_log_path(), PathBuf::from("data/orders.csv"));
        assert_eq!(config.risk_log_path(), PathBuf::from("data/risk_history.csv"));
    }
}
