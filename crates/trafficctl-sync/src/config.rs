//! Polling cadence configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use trafficctl_core::DIRECTION_COUNT;

use crate::error::{SyncError, SyncResult};

/// Refresh cadences for the synchronizers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Status poll interval in milliseconds.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    /// Camera cycle interval in milliseconds.
    #[serde(default = "default_camera_interval_ms")]
    pub camera_interval_ms: u64,
    /// Analytics poll interval in milliseconds.
    #[serde(default = "default_analytics_interval_ms")]
    pub analytics_interval_ms: u64,
    /// Number of camera endpoints polled per cycle.
    #[serde(default = "default_camera_count")]
    pub camera_count: usize,
    /// Consecutive failures after which a snapshot is reported offline.
    #[serde(default = "default_offline_after_failures")]
    pub offline_after_failures: u32,
}

fn default_status_interval_ms() -> u64 {
    1_000
}

fn default_camera_interval_ms() -> u64 {
    1_000
}

fn default_analytics_interval_ms() -> u64 {
    30_000
}

fn default_camera_count() -> usize {
    DIRECTION_COUNT
}

fn default_offline_after_failures() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
            camera_interval_ms: default_camera_interval_ms(),
            analytics_interval_ms: default_analytics_interval_ms(),
            camera_count: default_camera_count(),
            offline_after_failures: default_offline_after_failures(),
        }
    }
}

impl PollingConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn camera_interval(&self) -> Duration {
        Duration::from_millis(self.camera_interval_ms)
    }

    pub fn analytics_interval(&self) -> Duration {
        Duration::from_millis(self.analytics_interval_ms)
    }

    /// Reject zero intervals and camera counts beyond the controller's four.
    pub fn validate(&self) -> SyncResult<()> {
        if self.status_interval_ms == 0
            || self.camera_interval_ms == 0
            || self.analytics_interval_ms == 0
        {
            return Err(SyncError::Config("intervals must be non-zero".to_string()));
        }
        if self.camera_count > DIRECTION_COUNT {
            return Err(SyncError::Config(format!(
                "camera_count must be at most {DIRECTION_COUNT}, got {}",
                self.camera_count
            )));
        }
        Ok(())
    }
}
