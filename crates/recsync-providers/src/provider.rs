//! RecordingProvider trait definition.
//!
//! [`RecordingProvider`] is the seam between the sync engine and a cloud
//! recording service. The engine only ever talks to a provider through it,
//! which lets tests drive the engine with in-memory fakes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use recsync_core::{DateWindow, FileDescriptor, MeetingId, Recording};
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the engine can hold a
/// `&dyn RecordingProvider`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An account whose recordings are synchronized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    /// Provider identifier of the user.
    pub id: String,
    /// Email address, used for filtering.
    pub email: String,
    /// Name shown in reports.
    pub display_name: String,
}

impl Owner {
    /// Creates a new owner whose display name is its email.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: id.into(),
            display_name: email.clone(),
            email,
        }
    }

    /// Builder method to set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name == self.email {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} - {}", self.display_name, self.email)
        }
    }
}

/// One page of a recording listing.
#[derive(Debug, Clone, Default)]
pub struct RecordingPage {
    /// Recordings on this page.
    pub recordings: Vec<Recording>,
    /// Token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

impl RecordingPage {
    /// Creates a final page.
    pub fn last(recordings: Vec<Recording>) -> Self {
        Self {
            recordings,
            next_page_token: None,
        }
    }

    /// Builder method to set the next page token.
    pub fn with_next_page_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }
}

/// What the provider should do with a recording on deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteAction {
    /// Move to the provider's trash, recoverable for a while.
    #[default]
    Trash,
    /// Delete permanently.
    Delete,
}

impl DeleteAction {
    /// Returns the wire value of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trash => "trash",
            Self::Delete => "delete",
        }
    }
}

/// The core abstraction for recording providers.
///
/// Implementations hold the single access credential obtained for the run;
/// nothing here refreshes it behind the caller's back.
pub trait RecordingProvider: Send + Sync {
    /// Returns the name of this provider (e.g. "zoom").
    fn name(&self) -> &str;

    /// Lists every account whose recordings may be synchronized.
    fn list_owners(&self) -> BoxFuture<'_, ProviderResult<Vec<Owner>>>;

    /// Fetches one page of recordings of `owner_id` inside `window`.
    fn list_recordings<'a>(
        &'a self,
        owner_id: &'a str,
        window: DateWindow,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<RecordingPage>>;

    /// Deletes the remote copy of a recording.
    fn delete_recording<'a>(&'a self, meeting_id: &'a MeetingId)
    -> BoxFuture<'a, ProviderResult<()>>;

    /// Derives the download-ready file set of a recording.
    ///
    /// Fails with [`ProviderErrorCode::NoFilesFound`](crate::ProviderErrorCode::NoFilesFound)
    /// when the recording has no file entries.
    fn extract_files(&self, recording: &Recording) -> ProviderResult<Vec<FileDescriptor>>;
}
