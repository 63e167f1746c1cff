//! Core error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid status payload: {0}")]
    InvalidStatus(String),

    #[error("Invalid analytics payload: {0}")]
    InvalidAnalytics(String),

    #[error("Invalid signal state: {0}")]
    InvalidSignalState(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
