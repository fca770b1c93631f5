//! In-memory provider and fetcher for engine tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{NaiveDate, TimeZone, Utc};
use recsync_core::{DateWindow, FileDescriptor, MeetingId, Recording, RecordingFile};
use recsync_providers::{
    BoxFuture, Owner, ProviderError, ProviderResult, RecordingPage, RecordingProvider,
};

use crate::download::{
    DownloadError, DownloadOutcome, FetchRequest, FileFetcher, ProgressObserver, Verified,
};

/// A window inside January 2024, `[Jan start, Jan end)`.
pub fn window(start: u32, end: u32) -> DateWindow {
    DateWindow {
        start: NaiveDate::from_ymd_opt(2024, 1, start).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 1, end).unwrap(),
    }
}

/// A completed file whose listing declares `size` bytes.
pub fn completed_file(recording_id: &str, n: usize, size: u64) -> RecordingFile {
    RecordingFile {
        id: Some(format!("{}-f{}", recording_id, n)),
        file_type: "MP4".into(),
        file_extension: "MP4".into(),
        recording_type: Some(format!("view_{}", n)),
        download_url: Some(format!("https://zoom.test/rec/{}/{}", recording_id, n)),
        file_size: Some(size),
    }
}

/// A file the provider is still processing.
pub fn incomplete_file(recording_id: &str) -> RecordingFile {
    RecordingFile {
        id: Some(format!("{}-pending", recording_id)),
        file_type: String::new(),
        file_extension: "M4A".into(),
        recording_type: Some("audio_only".into()),
        download_url: None,
        file_size: None,
    }
}

/// A recording with `files` completed files of 4 bytes each.
pub fn recording(id: &str, files: usize) -> Recording {
    let mut recording = Recording::new(
        id,
        format!("Meeting {}", id),
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap(),
    );
    recording.files = (1..=files).map(|n| completed_file(id, n, 4)).collect();
    recording
}

#[derive(Default)]
pub struct FakeProvider {
    pub owners: Vec<Owner>,
    pages: Mutex<HashMap<(String, DateWindow), VecDeque<ProviderResult<RecordingPage>>>>,
    owners_error: Mutex<Option<ProviderError>>,
    failing_deletes: HashSet<MeetingId>,
    missing_on_delete: HashSet<MeetingId>,
    pub list_calls: Mutex<Vec<(DateWindow, Option<String>)>>,
    pub delete_calls: Mutex<Vec<MeetingId>>,
}

impl FakeProvider {
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owners.push(owner);
        self
    }

    /// Queues a page for owner `u1`.
    pub fn with_page(self, window: DateWindow, page: RecordingPage) -> Self {
        self.with_owner_page("u1", window, page)
    }

    pub fn with_owner_page(self, owner: &str, window: DateWindow, page: RecordingPage) -> Self {
        self.push(owner, window, Ok(page));
        self
    }

    pub fn with_list_error(self, window: DateWindow, error: ProviderError) -> Self {
        self.push("u1", window, Err(error));
        self
    }

    pub fn with_owners_error(self, error: ProviderError) -> Self {
        *self.owners_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_failing_delete(mut self, id: &str) -> Self {
        self.failing_deletes.insert(MeetingId::new(id));
        self
    }

    pub fn with_missing_on_delete(mut self, id: &str) -> Self {
        self.missing_on_delete.insert(MeetingId::new(id));
        self
    }

    pub fn deletes(&self) -> Vec<String> {
        self.delete_calls
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    fn push(&self, owner: &str, window: DateWindow, page: ProviderResult<RecordingPage>) {
        self.pages
            .lock()
            .unwrap()
            .entry((owner.to_string(), window))
            .or_default()
            .push_back(page);
    }
}

impl RecordingProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn list_owners(&self) -> BoxFuture<'_, ProviderResult<Vec<Owner>>> {
        Box::pin(async move {
            match self.owners_error.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(self.owners.clone()),
            }
        })
    }

    fn list_recordings<'a>(
        &'a self,
        owner_id: &'a str,
        window: DateWindow,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<RecordingPage>> {
        Box::pin(async move {
            self.list_calls
                .lock()
                .unwrap()
                .push((window, page_token.map(String::from)));
            self.pages
                .lock()
                .unwrap()
                .get_mut(&(owner_id.to_string(), window))
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(RecordingPage::default()))
        })
    }

    fn delete_recording<'a>(
        &'a self,
        meeting_id: &'a MeetingId,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.delete_calls.lock().unwrap().push(meeting_id.clone());
            if self.failing_deletes.contains(meeting_id) {
                Err(ProviderError::server("delete rejected"))
            } else if self.missing_on_delete.contains(meeting_id) {
                Err(ProviderError::not_found("This recording does not exist."))
            } else {
                Ok(())
            }
        })
    }

    fn extract_files(&self, recording: &Recording) -> ProviderResult<Vec<FileDescriptor>> {
        recsync_providers::extract_files(recording, "tok")
    }
}

/// Writes the declared number of bytes for every URL except failing ones.
#[derive(Default)]
pub struct FakeFetcher {
    failing: Vec<String>,
    short: Vec<String>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    /// Requests whose URL starts with `prefix` fail with a transport error.
    pub fn failing(mut self, prefix: impl Into<String>) -> Self {
        self.failing.push(prefix.into());
        self
    }

    /// Requests whose URL starts with `prefix` deliver one byte too few.
    pub fn short(mut self, prefix: impl Into<String>) -> Self {
        self.short.push(prefix.into());
        self
    }

    pub fn count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

impl FileFetcher for FakeFetcher {
    fn fetch<'a>(
        &'a self,
        request: FetchRequest<'a>,
        _progress: &'a dyn ProgressObserver,
    ) -> BoxFuture<'a, DownloadOutcome> {
        Box::pin(async move {
            self.fetched.lock().unwrap().push(request.url.to_string());
            if self.failing.iter().any(|p| request.url.starts_with(p.as_str())) {
                return Err(DownloadError::Transport("connection reset".into()));
            }
            let expected = request.declared_size.ok_or(DownloadError::MissingLength)?;
            if self.short.iter().any(|p| request.url.starts_with(p.as_str())) {
                return Err(DownloadError::SizeMismatch {
                    expected,
                    actual: expected.saturating_sub(1),
                });
            }

            if let Some(parent) = request.dest.parent() {
                std::fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(request.dest, vec![0u8; expected as usize]).map_err(|source| {
                DownloadError::Io {
                    path: request.dest.to_path_buf(),
                    source,
                }
            })?;
            Ok(Verified {
                path: request.dest.to_path_buf(),
                bytes: expected,
            })
        })
    }
}
