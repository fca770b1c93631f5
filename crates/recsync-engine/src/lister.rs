//! Paginated recording enumeration per owner and window.

use std::collections::HashSet;

use recsync_core::{DateWindow, MeetingId, Recording};
use recsync_providers::{Owner, RecordingProvider};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Collects the recordings of one owner, window by window.
///
/// A recording returned by more than one window is yielded only the first
/// time it is seen.
pub struct RecordingLister<'a> {
    provider: &'a dyn RecordingProvider,
    owner: &'a Owner,
    seen: HashSet<MeetingId>,
}

impl<'a> RecordingLister<'a> {
    /// Creates a lister for `owner`.
    pub fn new(provider: &'a dyn RecordingProvider, owner: &'a Owner) -> Self {
        Self {
            provider,
            owner,
            seen: HashSet::new(),
        }
    }

    /// Lists every recording in `window`, following all pages.
    ///
    /// # Errors
    ///
    /// Any page failure fails the whole window:
    /// [`SyncError::ProviderAuthFailed`] for rejected credentials,
    /// [`SyncError::ProviderUnavailable`] otherwise.
    pub async fn list_window(&mut self, window: DateWindow) -> SyncResult<Vec<Recording>> {
        let mut recordings = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;
        let mut duplicates = 0usize;

        loop {
            let page = self
                .provider
                .list_recordings(&self.owner.id, window, page_token.as_deref())
                .await
                .map_err(|e| SyncError::listing(&self.owner.id, window, e))?;
            pages += 1;

            for recording in page.recordings {
                if self.seen.insert(recording.meeting_id.clone()) {
                    recordings.push(recording);
                } else {
                    duplicates += 1;
                }
            }

            match page.next_page_token {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    warn!(
                        owner = %self.owner.email,
                        %window,
                        "provider repeated a page token, stopping pagination"
                    );
                    break;
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(
            owner = %self.owner.email,
            %window,
            pages,
            recordings = recordings.len(),
            duplicates,
            "listed window"
        );
        Ok(recordings)
    }
}
