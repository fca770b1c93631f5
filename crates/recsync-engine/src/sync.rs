//! The sync driver: owners, then windows, then recordings.

use recsync_core::DateRange;
use recsync_providers::{Owner, RecordingProvider};
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::ledger::CompletionLedger;
use crate::lister::RecordingLister;
use crate::reconcile::{Reconciler, RecordingOutcome, SyncSummary};
use crate::shutdown::ShutdownHandle;

/// What a run covers.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Days to enumerate, half-open.
    pub range: DateRange,
    /// Maximum days per listing window.
    pub window_days: u32,
    /// Emails of the owners to include; empty means everyone.
    pub include_owners: Vec<String>,
}

impl SyncPlan {
    /// Creates a plan covering every owner.
    pub fn new(range: DateRange, window_days: u32) -> Self {
        Self {
            range,
            window_days,
            include_owners: Vec::new(),
        }
    }

    /// Builder method to restrict the run to some owners.
    pub fn with_owners(mut self, emails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include_owners = emails.into_iter().map(Into::into).collect();
        self
    }

    /// Keeps the owners this plan includes, warning about unknown emails.
    pub fn select_owners(&self, owners: Vec<Owner>) -> Vec<Owner> {
        if self.include_owners.is_empty() {
            return owners;
        }

        for email in &self.include_owners {
            if !owners.iter().any(|o| o.email.eq_ignore_ascii_case(email)) {
                warn!(email = %email, "configured user not found in account");
            }
        }
        owners
            .into_iter()
            .filter(|o| {
                self.include_owners
                    .iter()
                    .any(|email| o.email.eq_ignore_ascii_case(email))
            })
            .collect()
    }
}

/// Runs a plan against a provider, one recording at a time.
pub struct SyncDriver<'a> {
    provider: &'a dyn RecordingProvider,
    reconciler: Reconciler<'a>,
    shutdown: ShutdownHandle,
}

impl<'a> SyncDriver<'a> {
    /// Creates a driver. The reconciler should share `shutdown`.
    pub fn new(
        provider: &'a dyn RecordingProvider,
        reconciler: Reconciler<'a>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            provider,
            reconciler,
            shutdown,
        }
    }

    /// Runs the plan.
    ///
    /// # Errors
    ///
    /// Returns only run-fatal errors: an unusable range, authentication
    /// failure, an unavailable provider and ledger I/O. Per-recording
    /// problems end up in the summary.
    pub async fn run(
        &self,
        plan: &SyncPlan,
        ledger: &mut CompletionLedger,
    ) -> SyncResult<SyncSummary> {
        let windows = plan.range.windows(plan.window_days)?;
        let mut summary = SyncSummary::default();

        let owners = self.provider.list_owners().await.map_err(|e| {
            if e.is_auth() {
                SyncError::ProviderAuthFailed(e)
            } else {
                SyncError::OwnerListing(e)
            }
        })?;
        let owners = plan.select_owners(owners);

        info!(
            provider = self.provider.name(),
            range = %plan.range,
            window_days = plan.window_days,
            owners = owners.len(),
            dry_run = self.reconciler.options().dry_run,
            "starting sync"
        );

        'owners: for owner in &owners {
            info!(owner = %owner, "synchronizing recordings");
            summary.owners += 1;
            let mut lister = RecordingLister::new(self.provider, owner);

            for window in windows.clone() {
                if self.shutdown.is_shutdown() {
                    summary.cancelled = true;
                    break 'owners;
                }

                let recordings = lister.list_window(window).await?;
                summary.windows += 1;
                summary.listed += recordings.len();

                for recording in &recordings {
                    if self.shutdown.is_shutdown() {
                        summary.cancelled = true;
                        break 'owners;
                    }

                    let outcome = self.reconciler.reconcile(recording, ledger).await?;
                    summary.record(&outcome);
                    if matches!(outcome, RecordingOutcome::Cancelled) {
                        break 'owners;
                    }
                }
            }
        }

        if summary.cancelled {
            warn!("sync interrupted, remaining recordings will be picked up next run");
        }
        info!(
            ledgered = summary.ledgered,
            files_failed = summary.files_failed,
            delete_failed = summary.delete_failed,
            "sync finished"
        );
        Ok(summary)
    }
}
