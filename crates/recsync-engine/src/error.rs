//! Sync engine error types.

use std::time::Duration;

use recsync_core::{DateWindow, MeetingId, TimeError};
use recsync_providers::ProviderError;
use thiserror::Error;

use crate::download::DownloadError;
use crate::ledger::LedgerError;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
///
/// Only the run-fatal variants ([`SyncError::is_fatal`]) are ever returned
/// from the driver; the others are collected per recording and reported in
/// the summary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested date range is unusable.
    #[error("invalid date range: {0}")]
    InvalidRange(#[from] TimeError),

    /// No access token could be obtained, or it stopped working.
    #[error("provider authentication failed: {0}")]
    ProviderAuthFailed(#[source] ProviderError),

    /// The owner list could not be fetched.
    #[error("failed to list users: {0}")]
    OwnerListing(#[source] ProviderError),

    /// Listing failed for a window.
    #[error("provider unavailable while listing {owner} in {window}: {source}")]
    ProviderUnavailable {
        owner: String,
        window: DateWindow,
        #[source]
        source: ProviderError,
    },

    /// A recording has no file entries yet.
    #[error("no files found for recording {meeting_id}")]
    NoFilesFound { meeting_id: MeetingId },

    /// A file could not be downloaded and verified.
    #[error("file {file_id} of recording {meeting_id} failed: {source}")]
    DownloadFailed {
        meeting_id: MeetingId,
        file_id: String,
        #[source]
        source: DownloadError,
    },

    /// Remote deletion failed after all files were verified.
    #[error("failed to delete recording {meeting_id}: {source}")]
    DeleteFailed {
        meeting_id: MeetingId,
        #[source]
        source: ProviderError,
    },

    /// The completion ledger could not be read or written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classifies a listing failure for `owner` in `window`.
    pub fn listing(owner: impl Into<String>, window: DateWindow, source: ProviderError) -> Self {
        if source.is_auth() {
            Self::ProviderAuthFailed(source)
        } else {
            Self::ProviderUnavailable {
                owner: owner.into(),
                window,
                source,
            }
        }
    }

    fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::ProviderAuthFailed(source)
            | Self::OwnerListing(source)
            | Self::ProviderUnavailable { source, .. }
            | Self::DeleteFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true if the provider failure may clear up on a later run
    /// without any change on our side.
    pub fn is_transient(&self) -> bool {
        self.provider_error().is_some_and(ProviderError::is_retryable)
    }

    /// How long the provider asked us to wait, when it was rate limiting.
    pub fn retry_after(&self) -> Option<Duration> {
        self.provider_error().and_then(ProviderError::retry_after)
    }

    /// Returns true if the error ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::NoFilesFound { .. } | Self::DownloadFailed { .. } | Self::DeleteFailed { .. }
        )
    }
}
