//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use trafficctl_client::ClientConfig;
use trafficctl_sync::PollingConfig;

/// Logging and metrics exposition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when `RUST_LOG` is unset (e.g. `"info"`).
    #[serde(default)]
    pub log_level: Option<String>,
    /// Serve Prometheus metrics on `127.0.0.1:<port>/metrics` in monitor mode.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ClientConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    ///
    /// The flag is false when defaults were used, so the caller can warn
    /// once logging is up.
    pub fn load_or_default(path: &str) -> AppResult<(Self, bool)> {
        if Path::new(path).exists() {
            Ok((Self::from_file(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.polling
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        if self.controller.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "controller.request_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
