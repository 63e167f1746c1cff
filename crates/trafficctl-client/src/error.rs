//! Client error types.

use thiserror::Error;
use trafficctl_core::CoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] CoreError),

    #[error("Invalid camera index: {0}")]
    InvalidCamera(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the controller answered but the body failed validation.
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::InvalidPayload(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
