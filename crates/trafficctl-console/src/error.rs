//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Client error: {0}")]
    Client(#[from] trafficctl_client::ClientError),

    #[error("Sync error: {0}")]
    Sync(#[from] trafficctl_sync::SyncError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] trafficctl_telemetry::TelemetryError),

    #[error("Invalid arguments: {0}")]
    Usage(String),

    #[error("Command failed: {0}")]
    Dispatch(String),

    #[error("Controller unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
