//! Recording to file-set conversion.
//!
//! [`extract_files`] turns the raw file entries of a [`Recording`] into
//! classified [`FileDescriptor`]s whose download URLs carry the run's access
//! token.
//!
//! Classification:
//! 1. An entry with an empty file type is still being processed by the
//!    provider and is [`FileCategory::Incomplete`]
//! 2. An entry whose file type is a reserved marker keeps that marker as its
//!    category
//! 3. Everything else takes the provider's recording subtype

use recsync_core::{FileCategory, FileDescriptor, Recording, RecordingFile};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// File types that describe meeting metadata rather than a recording subtype.
pub const MARKER_FILE_TYPES: &[&str] = &["TIMELINE"];

/// Query parameter carrying the access token on download URLs.
const TOKEN_PARAM: &str = "access_token";

/// Derives the file set of a recording.
///
/// # Errors
///
/// Returns a `NoFilesFound` error if the recording has no file entries. A
/// recording whose entries are all incomplete is *not* an error.
pub fn extract_files(recording: &Recording, access_token: &str) -> ProviderResult<Vec<FileDescriptor>> {
    if recording.files.is_empty() {
        return Err(ProviderError::no_files(format!(
            "no files found for recording {}",
            recording.meeting_id
        )));
    }

    Ok(recording
        .files
        .iter()
        .enumerate()
        .map(|(index, file)| describe(index, file, access_token))
        .collect())
}

fn describe(index: usize, file: &RecordingFile, access_token: &str) -> FileDescriptor {
    let category = categorize(file);
    let download_url = match (&category, file.download_url.as_deref()) {
        (FileCategory::Incomplete, _) | (_, None) => String::new(),
        (_, Some(url)) => authorize_url(url, access_token),
    };
    // A file we cannot fetch can never be verified.
    let category = if download_url.is_empty() {
        FileCategory::Incomplete
    } else {
        category
    };

    FileDescriptor {
        id: file
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("file-{}", index + 1)),
        file_type: file.file_type.clone(),
        file_extension: file.file_extension.clone(),
        download_url,
        category,
        file_size: file.file_size,
    }
}

/// Classifies one raw file entry.
pub fn categorize(file: &RecordingFile) -> FileCategory {
    let file_type = file.file_type.trim();
    if file_type.is_empty() {
        return FileCategory::Incomplete;
    }
    if MARKER_FILE_TYPES.contains(&file_type) {
        return FileCategory::Marker(file_type.to_string());
    }
    match file.recording_type.as_deref().filter(|t| !t.is_empty()) {
        Some(kind) => FileCategory::Recording(kind.to_string()),
        // Transcripts and chat logs come without a subtype on some accounts.
        None => FileCategory::Recording(file_type.to_ascii_lowercase()),
    }
}

/// Appends the access token to a download URL.
///
/// URLs that do not parse are given the token with a plain `?`/`&` suffix so
/// the later request fails with a transport error the reconciler reports.
pub fn authorize_url(download_url: &str, access_token: &str) -> String {
    match Url::parse(download_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(TOKEN_PARAM, access_token);
            url.into()
        }
        Err(_) => {
            let separator = if download_url.contains('?') { '&' } else { '?' };
            format!(
                "{}{}{}={}",
                download_url,
                separator,
                TOKEN_PARAM,
                urlencoding::encode(access_token)
            )
        }
    }
}
