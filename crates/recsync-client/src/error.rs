//! Client error types.

use recsync_engine::{LedgerError, SyncError};
use recsync_providers::ProviderError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The sync run stopped.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),

    /// The completion ledger could not be read.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The run finished but some recordings need another run.
    #[error("incomplete: {0}")]
    Incomplete(String),

    /// A lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),
}
