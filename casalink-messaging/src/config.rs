//! Session Configuration
//!
//! Tuning knobs for the sync scheduler and the API client. Loaded from the
//! application's config file by the binary; defaults match the hosted
//! backend's rate expectations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sync and request timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between background refreshes of the active thread and the
    /// conversation list
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SyncConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
