//! Recording and file descriptor types.
//!
//! A [`Recording`] is one meeting instance as returned by a provider, with
//! its raw [`RecordingFile`] entries. A [`FileDescriptor`] is the classified,
//! download-ready form of one of those entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical identifier of a recorded meeting instance.
///
/// This is the value written to the completion ledger, used in log fields and
/// passed to the provider's delete endpoint. Nothing else may be used for
/// those three purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    /// Wraps a provider identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MeetingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MeetingId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One raw file entry of a recording, as declared by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingFile {
    /// Per-file identifier.
    pub id: Option<String>,
    /// File type tag (`MP4`, `M4A`, `TIMELINE`, ...). Empty while the
    /// provider is still processing the file.
    pub file_type: String,
    /// File extension without the dot.
    pub file_extension: String,
    /// Provider recording subtype (`shared_screen_with_speaker_view`, ...).
    pub recording_type: Option<String>,
    /// Download URL without credentials.
    pub download_url: Option<String>,
    /// Size declared in the listing, in bytes.
    pub file_size: Option<u64>,
}

/// A recorded meeting instance with its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Canonical identifier.
    pub meeting_id: MeetingId,
    /// Human-facing meeting number, for display only.
    pub meeting_number: Option<u64>,
    /// Meeting topic.
    pub topic: String,
    /// When the meeting started.
    pub start_time: DateTime<Utc>,
    /// Raw file entries, in provider order.
    pub files: Vec<RecordingFile>,
}

impl Recording {
    /// Creates a recording with no files.
    pub fn new(
        meeting_id: impl Into<MeetingId>,
        topic: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            meeting_number: None,
            topic: topic.into(),
            start_time,
            files: Vec::new(),
        }
    }

    /// Builder method to add a file entry.
    pub fn with_file(mut self, file: RecordingFile) -> Self {
        self.files.push(file);
        self
    }

    /// Builder method to set the meeting number.
    pub fn with_meeting_number(mut self, number: u64) -> Self {
        self.meeting_number = Some(number);
        self
    }
}

impl From<String> for MeetingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Logical category of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FileCategory {
    /// The provider has not finished producing the file.
    Incomplete,
    /// A reserved, non-media marker type (e.g. `TIMELINE`).
    Marker(String),
    /// A regular recording artifact with its provider subtype.
    Recording(String),
}

impl FileCategory {
    /// Returns true if files of this category should be downloaded.
    pub fn is_downloadable(&self) -> bool {
        !matches!(self, Self::Incomplete)
    }

    /// Returns the raw category label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Marker(tag) => tag,
            Self::Recording(kind) => kind,
        }
    }

    /// Human-readable label: `shared_screen_with_speaker_view` becomes
    /// `Shared Screen With Speaker View`.
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .filter(|word| !word.is_empty())
            .map(title_word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A download-ready file of a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Per-file identifier, or a positional fallback when the provider
    /// omitted it.
    pub id: String,
    /// File type tag.
    pub file_type: String,
    /// File extension without the dot.
    pub file_extension: String,
    /// Authorized download URL. Empty for incomplete files.
    pub download_url: String,
    /// Logical category.
    pub category: FileCategory,
    /// Size declared in the listing.
    pub file_size: Option<u64>,
}

impl FileDescriptor {
    /// Returns true if the file should be downloaded.
    pub fn is_downloadable(&self) -> bool {
        self.category.is_downloadable()
    }

    /// The download URL cut to 64 characters, for log lines.
    pub fn truncated_url(&self) -> String {
        let mut chars = self.download_url.chars();
        let head: String = chars.by_ref().take(64).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}
