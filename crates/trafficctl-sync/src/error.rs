//! Synchronization error types.

use thiserror::Error;
use trafficctl_client::ClientError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A command is already being dispatched")]
    DispatchInProgress,

    #[error("Session has been shut down")]
    ShutDown,

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid polling configuration: {0}")]
    Config(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
