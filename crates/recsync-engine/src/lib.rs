//! Sync engine: ledger, downloader, reconciler.
//!
//! This crate drives a synchronization run:
//! - Windowed, paginated listing of each owner's recordings
//! - Streaming downloads verified against the expected size
//! - All-or-nothing reconciliation per recording
//! - An append-only completion ledger that makes reruns idempotent
//! - Remote deletion only after every file is safely on disk
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use recsync_core::{DateRange, NamingScheme};
//! use recsync_engine::{
//!     CompletionLedger, HttpFetcher, Reconciler, ShutdownHandle, SyncDriver, SyncPlan,
//! };
//! use recsync_providers::RecordingProvider;
//!
//! async fn sync(provider: &dyn RecordingProvider, range: DateRange) -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = ShutdownHandle::new();
//!     shutdown.listen_for_signals();
//!
//!     let fetcher = HttpFetcher::new(Duration::from_secs(30), shutdown.clone())?;
//!     let naming = NamingScheme::default();
//!     let reconciler = Reconciler::new(provider, &fetcher, &naming, Path::new("downloads"))
//!         .with_shutdown(shutdown.clone());
//!
//!     let mut ledger = CompletionLedger::open("completed-downloads.log")?;
//!     let summary = SyncDriver::new(provider, reconciler, shutdown)
//!         .run(&SyncPlan::new(range, 30), &mut ledger)
//!         .await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

mod download;
mod error;
mod ledger;
mod lister;
mod reconcile;
mod shutdown;
mod sync;
#[cfg(test)]
mod testing;

pub use download::{
    DEFAULT_IDLE_TIMEOUT, DownloadError, DownloadOutcome, FetchRequest, FileFetcher, HttpFetcher,
    NoProgress, PART_SUFFIX, ProgressObserver, TracingProgress, Verified, part_path,
    write_verified,
};
pub use error::{SyncError, SyncResult};
pub use ledger::{CompletionLedger, LedgerError};
pub use lister::RecordingLister;
pub use reconcile::{ReconcileOptions, Reconciler, RecordingOutcome, SyncSummary};
pub use shutdown::ShutdownHandle;
pub use sync::{SyncDriver, SyncPlan};
