//! Streaming file download with size verification.
//!
//! A file is written to `<name>.part` next to its destination, its byte count
//! is compared with the expected size, and only an exact match is fsynced and
//! renamed into place. Any failure removes the partial file, so a final file
//! on disk is always a verified one.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
pub use recsync_core::PART_SUFFIX;
use recsync_providers::BoxFuture;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::shutdown::ShutdownHandle;

/// Default time to wait for the next chunk before giving up.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a file could not be downloaded and verified.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The provider has not finished processing the file.
    #[error("file is still being processed by the provider")]
    NotReady,

    /// The request or the body stream failed.
    #[error("transfer failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server responded with status {0}")]
    Status(u16),

    /// Neither the response nor the listing gave a size to verify against.
    #[error("cannot verify download: size unknown")]
    MissingLength,

    /// The number of bytes written differs from the expected size.
    #[error("size mismatch: expected {expected} bytes, wrote {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Writing to disk failed.
    #[error("disk error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was interrupted.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A file that is on disk with exactly the expected size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// Final location of the file.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Result of one download attempt.
pub type DownloadOutcome = Result<Verified, DownloadError>;

/// What to download and where.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Authorized download URL.
    pub url: &'a str,
    /// Final destination.
    pub dest: &'a Path,
    /// Size the listing declared, used when the response has no length.
    pub declared_size: Option<u64>,
}

/// Receives byte counts while a file downloads.
pub trait ProgressObserver: Send + Sync {
    /// A download of `total` bytes started.
    fn started(&self, _name: &str, _total: u64) {}

    /// `written` of `total` bytes are on disk.
    fn advanced(&self, _written: u64, _total: u64) {}

    /// The download ended.
    fn finished(&self, _name: &str, _outcome: &DownloadOutcome) {}
}

/// Observer that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Observer that emits a debug event at every quarter of a download.
#[derive(Debug, Default)]
pub struct TracingProgress {
    quarter: AtomicU64,
}

impl ProgressObserver for TracingProgress {
    fn started(&self, name: &str, total: u64) {
        self.quarter.store(0, Ordering::Relaxed);
        debug!(file = name, total_bytes = total, "download started");
    }

    fn advanced(&self, written: u64, total: u64) {
        if total == 0 {
            return;
        }
        let quarter = (written.saturating_mul(4) / total).min(4);
        if quarter > self.quarter.fetch_max(quarter, Ordering::Relaxed) {
            debug!(percent = quarter * 25, written, total, "download progress");
        }
    }

    fn finished(&self, name: &str, outcome: &DownloadOutcome) {
        match outcome {
            Ok(verified) => debug!(file = name, bytes = verified.bytes, "download finished"),
            Err(e) => debug!(file = name, error = %e, "download aborted"),
        }
    }
}

/// Downloads one file to disk and verifies it.
pub trait FileFetcher: Send + Sync {
    /// Fetches `request.url` into `request.dest`.
    fn fetch<'a>(
        &'a self,
        request: FetchRequest<'a>,
        progress: &'a dyn ProgressObserver,
    ) -> BoxFuture<'a, DownloadOutcome>;
}

/// [`FileFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    shutdown: ShutdownHandle,
    idle_timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher that aborts when `shutdown` is triggered.
    ///
    /// `connect_timeout` bounds connection setup only; a body may take as
    /// long as it needs as long as chunks keep arriving.
    pub fn new(connect_timeout: Duration, shutdown: ShutdownHandle) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| DownloadError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            shutdown,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Builder method to set how long to wait for the next chunk.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    async fn download(
        &self,
        request: FetchRequest<'_>,
        progress: &dyn ProgressObserver,
    ) -> DownloadOutcome {
        if self.shutdown.is_shutdown() {
            return Err(DownloadError::Cancelled);
        }

        // Download URLs carry the access token; keep it out of error text.
        let response = self
            .client
            .get(request.url)
            .send()
            .await
            .map_err(|e| DownloadError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let expected = match (response.content_length(), request.declared_size) {
            (Some(length), declared) => {
                if declared.is_some_and(|d| d != length) {
                    debug!(
                        content_length = length,
                        declared = ?declared,
                        "declared size differs from Content-Length"
                    );
                }
                length
            }
            (None, Some(declared)) => declared,
            (None, None) => return Err(DownloadError::MissingLength),
        };

        progress.started(&display_name(request.dest), expected);
        let body = response.bytes_stream().map(|chunk| chunk.map_err(|e| e.without_url()));
        write_verified(
            body,
            request.dest,
            expected,
            progress,
            &self.shutdown,
            self.idle_timeout,
        )
        .await
    }
}

impl FileFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        request: FetchRequest<'a>,
        progress: &'a dyn ProgressObserver,
    ) -> BoxFuture<'a, DownloadOutcome> {
        Box::pin(async move {
            let outcome = self.download(request, progress).await;
            progress.finished(&display_name(request.dest), &outcome);
            outcome
        })
    }
}

/// Returns the in-progress path for `dest`.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writes `stream` to `dest` through a `.part` file and verifies its size.
///
/// The partial file is removed on every failure, including cancellation.
pub async fn write_verified<S, B, E>(
    stream: S,
    dest: &Path,
    expected: u64,
    progress: &dyn ProgressObserver,
    shutdown: &ShutdownHandle,
    idle_timeout: Duration,
) -> DownloadOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(DownloadError::io(parent))?;
    }

    let part = part_path(dest);
    let result = match write_part(stream, &part, expected, progress, shutdown, idle_timeout).await {
        Ok(bytes) => fs::rename(&part, dest)
            .await
            .map(|()| bytes)
            .map_err(DownloadError::io(dest)),
        Err(e) => Err(e),
    };

    match result {
        Ok(bytes) => Ok(Verified {
            path: dest.to_path_buf(),
            bytes,
        }),
        Err(e) => {
            if let Err(rm) = fs::remove_file(&part).await
                && rm.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %part.display(), error = %rm, "failed to remove partial file");
            }
            Err(e)
        }
    }
}

async fn write_part<S, B, E>(
    stream: S,
    part: &Path,
    expected: u64,
    progress: &dyn ProgressObserver,
    shutdown: &ShutdownHandle,
    idle_timeout: Duration,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = fs::File::create(part).await.map_err(DownloadError::io(part))?;
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(DownloadError::Cancelled),
            next = tokio::time::timeout(idle_timeout, stream.next()) => next,
        };

        let chunk = match next {
            Err(_) => {
                return Err(DownloadError::Transport(format!(
                    "no data received for {}s",
                    idle_timeout.as_secs()
                )));
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => return Err(DownloadError::Transport(e.to_string())),
            Ok(Some(Ok(chunk))) => chunk,
        };

        let bytes = chunk.as_ref();
        file.write_all(bytes).await.map_err(DownloadError::io(part))?;
        written += bytes.len() as u64;
        progress.advanced(written, expected);

        if written > expected {
            return Err(DownloadError::SizeMismatch {
                expected,
                actual: written,
            });
        }
    }

    if written != expected {
        return Err(DownloadError::SizeMismatch {
            expected,
            actual: written,
        });
    }

    file.flush().await.map_err(DownloadError::io(part))?;
    file.sync_all().await.map_err(DownloadError::io(part))?;
    Ok(written)
}
