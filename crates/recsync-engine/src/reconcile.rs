//! Per-recording reconciliation.
//!
//! A recording moves through these states within one run:
//!
//! ```text
//! Pending ──► FilesOk ──► RemoteDeleted ──► Ledgered
//!    │           │
//!    │           └──► DeleteFailed   (retried next run)
//!    └──► FilesFailed                (retried next run)
//! ```
//!
//! It reaches the ledger only when every file was verified on disk and the
//! remote copy is gone (or deletion is disabled). A recording with any
//! failed or still-processing file is never deleted and never ledgered.

use std::fmt;
use std::path::{Path, PathBuf};

use recsync_core::{FileDescriptor, NamingScheme, Recording};
use recsync_providers::{ProviderErrorCode, RecordingProvider};
use tracing::{debug, info, warn};

use crate::download::{DownloadError, FetchRequest, FileFetcher, NoProgress, ProgressObserver};
use crate::error::{SyncError, SyncResult};
use crate::ledger::CompletionLedger;
use crate::shutdown::ShutdownHandle;

/// Policy switches for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Delete the remote copy once every file is verified.
    pub delete_after_download: bool,
    /// Report what would happen without touching disk, provider or ledger.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            delete_after_download: true,
            dry_run: false,
        }
    }
}

/// What happened to one recording.
#[derive(Debug)]
pub enum RecordingOutcome {
    /// Already in the ledger; nothing was done.
    AlreadyComplete,
    /// The recording has no file entries yet.
    NoFiles,
    /// At least one file is still processing or failed to download.
    FilesFailed { verified: usize, failures: Vec<SyncError> },
    /// Every file is on disk but the remote copy could not be deleted.
    DeleteFailed { verified: usize, error: SyncError },
    /// Every file is on disk and the recording is in the ledger.
    Ledgered { verified: usize, deleted: bool },
    /// Dry run: the files that would be downloaded.
    Planned { files: Vec<PathBuf>, incomplete: usize },
    /// The run was interrupted while this recording was in progress.
    Cancelled,
}

impl RecordingOutcome {
    /// Returns true if the recording is done and will be skipped next run.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::AlreadyComplete | Self::Ledgered { .. })
    }
}

/// Drives one recording at a time through download, deletion and ledger.
pub struct Reconciler<'a> {
    provider: &'a dyn RecordingProvider,
    fetcher: &'a dyn FileFetcher,
    naming: &'a NamingScheme,
    download_dir: &'a Path,
    progress: &'a dyn ProgressObserver,
    shutdown: ShutdownHandle,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler with default options.
    pub fn new(
        provider: &'a dyn RecordingProvider,
        fetcher: &'a dyn FileFetcher,
        naming: &'a NamingScheme,
        download_dir: &'a Path,
    ) -> Self {
        Self {
            provider,
            fetcher,
            naming,
            download_dir,
            progress: &NoProgress,
            shutdown: ShutdownHandle::default(),
            options: ReconcileOptions::default(),
        }
    }

    /// Builder method to set the progress observer.
    pub fn with_progress(mut self, progress: &'a dyn ProgressObserver) -> Self {
        self.progress = progress;
        self
    }

    /// Builder method to set the shutdown handle.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Builder method to set the policy.
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// The policy in effect.
    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// One distinct destination per file, in the order of `files`.
    fn destinations(&self, recording: &Recording, files: &[FileDescriptor]) -> Vec<PathBuf> {
        self.naming
            .file_paths(recording, files)
            .into_iter()
            .map(|relative| self.download_dir.join(relative))
            .collect()
    }

    /// Reconciles one recording against the ledger.
    ///
    /// # Errors
    ///
    /// Only ledger I/O failures are returned; everything else is an outcome.
    pub async fn reconcile(
        &self,
        recording: &Recording,
        ledger: &mut CompletionLedger,
    ) -> SyncResult<RecordingOutcome> {
        let meeting_id = &recording.meeting_id;
        if ledger.is_complete(meeting_id) {
            debug!(meeting_id = %meeting_id, "already synchronized, skipping");
            return Ok(RecordingOutcome::AlreadyComplete);
        }

        let files = match self.provider.extract_files(recording) {
            Ok(files) => files,
            Err(e) if e.code() == ProviderErrorCode::NoFilesFound => {
                let error = SyncError::NoFilesFound {
                    meeting_id: meeting_id.clone(),
                };
                warn!(topic = %recording.topic, error = %error, "skipping recording");
                return Ok(RecordingOutcome::NoFiles);
            }
            Err(e) => {
                warn!(meeting_id = %meeting_id, error = %e, "cannot read file list, skipping");
                return Ok(RecordingOutcome::NoFiles);
            }
        };

        info!(
            meeting_id = %meeting_id,
            topic = %recording.topic,
            start_time = %recording.start_time,
            files = files.len(),
            "reconciling recording"
        );

        let destinations = self.destinations(recording, &files);

        if self.options.dry_run {
            let incomplete = files.iter().filter(|f| !f.is_downloadable()).count();
            let planned: Vec<PathBuf> = files
                .iter()
                .zip(destinations)
                .filter(|(f, _)| f.is_downloadable())
                .map(|(_, dest)| dest)
                .collect();
            for path in &planned {
                info!(meeting_id = %meeting_id, path = %path.display(), "would download");
            }
            return Ok(RecordingOutcome::Planned {
                files: planned,
                incomplete,
            });
        }

        let mut verified = 0usize;
        let mut failures = Vec::new();

        for (file, dest) in files.iter().zip(&destinations) {
            if self.shutdown.is_shutdown() {
                return Ok(RecordingOutcome::Cancelled);
            }

            if !file.is_downloadable() {
                let error = SyncError::DownloadFailed {
                    meeting_id: meeting_id.clone(),
                    file_id: file.id.clone(),
                    source: DownloadError::NotReady,
                };
                warn!(meeting_id = %meeting_id, file_id = %file.id, "file not ready");
                failures.push(error);
                continue;
            }

            debug!(
                meeting_id = %meeting_id,
                file_id = %file.id,
                category = %file.category,
                url = %file.truncated_url(),
                "downloading"
            );

            let request = FetchRequest {
                url: &file.download_url,
                dest,
                declared_size: file.file_size,
            };
            match self.fetcher.fetch(request, self.progress).await {
                Ok(done) => {
                    verified += 1;
                    info!(
                        meeting_id = %meeting_id,
                        file_id = %file.id,
                        path = %done.path.display(),
                        bytes = done.bytes,
                        "file verified"
                    );
                }
                Err(DownloadError::Cancelled) => return Ok(RecordingOutcome::Cancelled),
                Err(source) => {
                    let error = SyncError::DownloadFailed {
                        meeting_id: meeting_id.clone(),
                        file_id: file.id.clone(),
                        source,
                    };
                    warn!(error = %error, "download failed");
                    failures.push(error);
                }
            }
        }

        if !failures.is_empty() || verified == 0 {
            warn!(
                meeting_id = %meeting_id,
                verified,
                failed = failures.len(),
                "recording incomplete, keeping remote copy"
            );
            return Ok(RecordingOutcome::FilesFailed { verified, failures });
        }

        if !self.options.delete_after_download {
            ledger.mark_complete(meeting_id)?;
            info!(meeting_id = %meeting_id, "all files verified, remote deletion disabled");
            return Ok(RecordingOutcome::Ledgered {
                verified,
                deleted: false,
            });
        }

        match self.provider.delete_recording(meeting_id).await {
            Ok(()) => {}
            Err(e) if e.code() == ProviderErrorCode::NotFound => {
                info!(meeting_id = %meeting_id, "remote copy already gone");
            }
            Err(source) => {
                let error = SyncError::DeleteFailed {
                    meeting_id: meeting_id.clone(),
                    source,
                };
                warn!(
                    error = %error,
                    transient = error.is_transient(),
                    "files kept locally, will retry deletion next run"
                );
                return Ok(RecordingOutcome::DeleteFailed { verified, error });
            }
        }

        ledger.mark_complete(meeting_id)?;
        info!(meeting_id = %meeting_id, verified, "recording synchronized and deleted remotely");
        Ok(RecordingOutcome::Ledgered {
            verified,
            deleted: true,
        })
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Owners processed.
    pub owners: usize,
    /// Windows listed.
    pub windows: usize,
    /// Recordings returned by listing (after de-duplication).
    pub listed: usize,
    /// Skipped because already in the ledger.
    pub already_complete: usize,
    /// Skipped because they have no files yet.
    pub no_files: usize,
    /// Kept remotely because a file failed or is still processing.
    pub files_failed: usize,
    /// Downloaded but not yet deleted remotely.
    pub delete_failed: usize,
    /// Newly added to the ledger.
    pub ledgered: usize,
    /// Of those, deleted remotely.
    pub deleted: usize,
    /// Files verified on disk.
    pub files_verified: usize,
    /// Files that would be downloaded (dry run).
    pub files_planned: usize,
    /// The run stopped early on an interrupt.
    pub cancelled: bool,
}

impl SyncSummary {
    /// Adds one recording's outcome.
    pub fn record(&mut self, outcome: &RecordingOutcome) {
        match outcome {
            RecordingOutcome::AlreadyComplete => self.already_complete += 1,
            RecordingOutcome::NoFiles => self.no_files += 1,
            RecordingOutcome::FilesFailed { verified, .. } => {
                self.files_failed += 1;
                self.files_verified += verified;
            }
            RecordingOutcome::DeleteFailed { verified, .. } => {
                self.delete_failed += 1;
                self.files_verified += verified;
            }
            RecordingOutcome::Ledgered { verified, deleted } => {
                self.ledgered += 1;
                self.files_verified += verified;
                if *deleted {
                    self.deleted += 1;
                }
            }
            RecordingOutcome::Planned { files, .. } => self.files_planned += files.len(),
            RecordingOutcome::Cancelled => self.cancelled = true,
        }
    }

    /// Returns true if nothing needs attention.
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.delete_failed == 0 && !self.cancelled
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} recordings listed for {} users in {} windows",
            self.listed, self.owners, self.windows
        )?;
        writeln!(f, "  synchronized:            {}", self.ledgered)?;
        writeln!(f, "  deleted remotely:        {}", self.deleted)?;
        writeln!(f, "  already synchronized:    {}", self.already_complete)?;
        writeln!(f, "  no files yet:            {}", self.no_files)?;
        writeln!(f, "  download failures:       {}", self.files_failed)?;
        writeln!(f, "  downloaded, not deleted: {}", self.delete_failed)?;
        write!(f, "  files verified:          {}", self.files_verified)?;
        if self.files_planned > 0 {
            write!(f, "\n  files to download:       {}", self.files_planned)?;
        }
        if self.cancelled {
            write!(f, "\n  run interrupted")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, FakeProvider, completed_file, incomplete_file, recording};
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
        naming: NamingScheme,
        ledger: CompletionLedger,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let ledger = CompletionLedger::open(dir.path().join("completed.log")).unwrap();
            Self {
                dir,
                naming: NamingScheme::new("{topic}", "{recording_id}.{file_extension}", "UTC", "%Y").unwrap(),
                ledger,
            }
        }

        fn downloads(&self) -> PathBuf {
            self.dir.path().join("downloads")
        }

        async fn run(
            &mut self,
            provider: &FakeProvider,
            fetcher: &FakeFetcher,
            options: ReconcileOptions,
            recording: &Recording,
        ) -> RecordingOutcome {
            let downloads = self.downloads();
            let reconciler =
                Reconciler::new(provider, fetcher, &self.naming, &downloads).with_options(options);
            reconciler.reconcile(recording, &mut self.ledger).await.unwrap()
        }
    }

    #[tokio::test]
    async fn all_files_verified_is_ledgered_and_deleted_once() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r1 = recording("R1", 2);

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r1).await;

        assert!(matches!(outcome, RecordingOutcome::Ledgered { verified: 2, deleted: true }));
        assert_eq!(provider.deletes(), vec!["R1"]);
        assert!(fx.ledger.is_complete(&r1.meeting_id));
        assert!(fx.downloads().join("Meeting R1").join("R1-f1.mp4").exists());
        assert!(fx.downloads().join("Meeting R1").join("R1-f2.mp4").exists());
    }

    #[tokio::test]
    async fn incomplete_file_fails_the_recording() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r2 = Recording::new("R2", "Half done", recording("x", 0).start_time)
            .with_file(incomplete_file("R2"))
            .with_file(completed_file("R2", 1, 4));

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r2).await;

        match outcome {
            RecordingOutcome::FilesFailed { verified, failures } => {
                assert_eq!(verified, 1, "the completed file is still downloaded");
                assert_eq!(failures.len(), 1);
                assert!(matches!(
                    failures[0],
                    SyncError::DownloadFailed { source: DownloadError::NotReady, .. }
                ));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(provider.deletes().is_empty());
        assert!(!fx.ledger.is_complete(&r2.meeting_id));
        assert_eq!(fetcher.count(), 1);
    }

    #[tokio::test]
    async fn no_files_is_skipped_without_download() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r3 = recording("R3", 0);

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r3).await;

        assert!(matches!(outcome, RecordingOutcome::NoFiles));
        assert_eq!(fetcher.count(), 0);
        assert!(provider.deletes().is_empty());
        assert!(!fx.ledger.is_complete(&r3.meeting_id));
    }

    #[tokio::test]
    async fn any_download_failure_blocks_delete_but_attempts_every_file() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default().short("https://zoom.test/rec/R4/1");
        let r4 = recording("R4", 3);

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r4).await;

        assert!(matches!(outcome, RecordingOutcome::FilesFailed { verified: 2, .. }));
        assert_eq!(fetcher.count(), 3);
        assert!(provider.deletes().is_empty());
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_keeps_remote_copy() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default().failing("https://zoom.test/rec/R10/2");
        let r10 = recording("R10", 2);

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r10).await;

        match outcome {
            RecordingOutcome::FilesFailed { verified, failures } => {
                assert_eq!(verified, 1);
                assert!(matches!(
                    failures.as_slice(),
                    [SyncError::DownloadFailed { source: DownloadError::Transport(_), .. }]
                ));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fetcher.count(), 2);
        assert!(provider.deletes().is_empty());
        assert!(!fx.ledger.is_complete(&r10.meeting_id));
    }

    #[tokio::test]
    async fn files_with_the_same_rendered_name_are_all_kept() {
        use crate::download::HttpFetcher;
        use recsync_core::RecordingFile;
        use std::time::Duration;

        let mut server = mockito::Server::new_async().await;
        let speaker = server
            .mock("GET", "/a")
            .match_query(mockito::Matcher::Any)
            .with_body("AAAA")
            .create_async()
            .await;
        let gallery = server
            .mock("GET", "/b")
            .match_query(mockito::Matcher::Any)
            .with_body("BBBB")
            .create_async()
            .await;

        let mut fx = Fixture::new();
        fx.naming = NamingScheme::new("{topic}", "{topic}.{file_extension}", "UTC", "%Y").unwrap();
        let provider = FakeProvider::default();
        let fetcher = HttpFetcher::new(Duration::from_secs(5), ShutdownHandle::default()).unwrap();
        let standup = Recording::new("R==", "Standup", recording("x", 0).start_time)
            .with_file(RecordingFile {
                download_url: Some(format!("{}/a", server.url())),
                ..completed_file("R", 1, 4)
            })
            .with_file(RecordingFile {
                download_url: Some(format!("{}/b", server.url())),
                ..completed_file("R", 2, 4)
            });

        let downloads = fx.downloads();
        let outcome = Reconciler::new(&provider, &fetcher, &fx.naming, &downloads)
            .reconcile(&standup, &mut fx.ledger)
            .await
            .unwrap();

        speaker.assert_async().await;
        gallery.assert_async().await;
        assert!(matches!(outcome, RecordingOutcome::Ledgered { verified: 2, deleted: true }));
        let folder = downloads.join("Standup");
        assert_eq!(std::fs::read(folder.join("Standup.mp4")).unwrap(), b"AAAA");
        assert_eq!(std::fs::read(folder.join("Standup - R-f2.mp4")).unwrap(), b"BBBB");
    }

    #[tokio::test]
    async fn second_pass_is_idempotent() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r1 = recording("R1", 2);

        fx.run(&provider, &fetcher, ReconcileOptions::default(), &r1).await;
        let again = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r1).await;

        assert!(matches!(again, RecordingOutcome::AlreadyComplete));
        assert_eq!(fetcher.count(), 2);
        assert_eq!(provider.deletes(), vec!["R1"]);
    }

    #[tokio::test]
    async fn ledger_survives_restart() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r1 = recording("R1", 1);
        fx.run(&provider, &fetcher, ReconcileOptions::default(), &r1).await;

        // Simulate a new process.
        fx.ledger = CompletionLedger::open(fx.dir.path().join("completed.log")).unwrap();
        let again = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r1).await;
        assert!(again.is_complete());
        assert_eq!(fetcher.count(), 1);
    }

    #[tokio::test]
    async fn delete_failure_keeps_files_but_not_ledger() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default().with_failing_delete("R5");
        let fetcher = FakeFetcher::default();
        let r5 = recording("R5", 1);

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r5).await;

        assert!(matches!(
            outcome,
            RecordingOutcome::DeleteFailed { error: SyncError::DeleteFailed { .. }, .. }
        ));
        assert!(!fx.ledger.is_complete(&r5.meeting_id));
        assert!(fx.downloads().join("Meeting R5").join("R5-f1.mp4").exists());
    }

    #[tokio::test]
    async fn remote_already_gone_counts_as_deleted() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default().with_missing_on_delete("R6");
        let fetcher = FakeFetcher::default();
        let r6 = recording("R6", 1);

        let outcome = fx.run(&provider, &fetcher, ReconcileOptions::default(), &r6).await;
        assert!(matches!(outcome, RecordingOutcome::Ledgered { deleted: true, .. }));
        assert!(fx.ledger.is_complete(&r6.meeting_id));
    }

    #[tokio::test]
    async fn deletion_disabled_still_ledgers() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r7 = recording("R7", 1);
        let options = ReconcileOptions {
            delete_after_download: false,
            dry_run: false,
        };

        let outcome = fx.run(&provider, &fetcher, options, &r7).await;
        assert!(matches!(outcome, RecordingOutcome::Ledgered { deleted: false, .. }));
        assert!(provider.deletes().is_empty());
        assert!(fx.ledger.is_complete(&r7.meeting_id));
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let r8 = recording("R8", 2).with_file(incomplete_file("R8"));
        let options = ReconcileOptions {
            delete_after_download: true,
            dry_run: true,
        };

        let outcome = fx.run(&provider, &fetcher, options, &r8).await;
        match outcome {
            RecordingOutcome::Planned { files, incomplete } => {
                assert_eq!(files.len(), 2);
                assert_eq!(incomplete, 1);
                assert!(files[0].ends_with("Meeting R8/R8-f1.mp4"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fetcher.count(), 0);
        assert!(provider.deletes().is_empty());
        assert!(fx.ledger.is_empty());
        assert!(!fx.downloads().exists());
    }

    #[tokio::test]
    async fn shutdown_cancels_before_next_file() {
        let mut fx = Fixture::new();
        let provider = FakeProvider::default();
        let fetcher = FakeFetcher::default();
        let shutdown = ShutdownHandle::default();
        shutdown.trigger();

        let downloads = fx.downloads();
        let reconciler =
            Reconciler::new(&provider, &fetcher, &fx.naming, &downloads).with_shutdown(shutdown);
        let outcome = reconciler
            .reconcile(&recording("R9", 2), &mut fx.ledger)
            .await
            .unwrap();

        assert!(matches!(outcome, RecordingOutcome::Cancelled));
        assert_eq!(fetcher.count(), 0);
        assert!(provider.deletes().is_empty());
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = SyncSummary::default();
        summary.record(&RecordingOutcome::Ledgered { verified: 2, deleted: true });
        summary.record(&RecordingOutcome::Ledgered { verified: 1, deleted: false });
        summary.record(&RecordingOutcome::AlreadyComplete);
        summary.record(&RecordingOutcome::NoFiles);
        summary.record(&RecordingOutcome::DeleteFailed {
            verified: 1,
            error: SyncError::config("x"),
        });

        assert_eq!(summary.ledgered, 2);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.files_verified, 4);
        assert_eq!(summary.delete_failed, 1);
        assert!(!summary.is_clean());
        assert!(summary.to_string().contains("downloaded, not deleted: 1"));
    }
}
