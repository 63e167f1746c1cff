//! Controller connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the controller lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Controller origin, e.g. `http://localhost:5000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with default timeouts.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
