//! Tree service configuration
//!
//! ```json
//! {
//!   "databasePath": "./data/tree.db",
//!   "maxAllocationRetries": 3,
//!   "busyTimeoutMs": 5000,
//!   "eventChannelCapacity": 256,
//!   "retryBackoffMs": 10
//! }
//! ```
//!
//! Every field is optional in the file; missing fields take their defaults.

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of retries when a racing writer takes the allocated path
pub const DEFAULT_MAX_ALLOCATION_RETRIES: usize = 3;

/// Default broadcast capacity for tree events
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound accepted for `retry_backoff_ms`
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

/// Settings for [`TreeService`](crate::services::TreeService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeConfig {
    /// libsql database file; `None` keeps the forest in memory
    pub database_path: Option<PathBuf>,

    /// Retries after a `DuplicatePath` race (0 = single attempt)
    pub max_allocation_retries: usize,

    /// SQLite busy timeout applied to every connection
    pub busy_timeout_ms: u64,

    pub event_channel_capacity: usize,

    /// First retry delay; doubles on every further retry
    pub retry_backoff_ms: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_allocation_retries: DEFAULT_MAX_ALLOCATION_RETRIES,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            retry_backoff_ms: 10,
        }
    }
}

impl TreeConfig {
    /// Configuration backed by a libsql file at `path`
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("Invalid config {}: {}", path.display(), reason))?;
        Ok(config)
    }

    /// Check values that would make the service unusable
    pub fn validate(&self) -> Result<(), String> {
        if self.event_channel_capacity == 0 {
            return Err("eventChannelCapacity must be greater than zero".to_string());
        }
        if self.max_allocation_retries > 16 {
            return Err(format!(
                "maxAllocationRetries must be at most 16, got {}",
                self.max_allocation_retries
            ));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(format!(
                "retryBackoffMs must be at most {}, got {}",
                MAX_RETRY_BACKOFF_MS, self.retry_backoff_ms
            ));
        }
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err("databasePath must not be empty".to_string());
            }
        }
        Ok(())
    }
}
