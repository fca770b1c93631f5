//! The `sync` command.

use chrono::{Local, NaiveDate};
use recsync_engine::{
    CompletionLedger, HttpFetcher, ReconcileOptions, Reconciler, ShutdownHandle, SyncDriver,
    SyncPlan, SyncSummary, TracingProgress,
};
use tracing::warn;

use crate::cli::SyncArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Builds the plan for this invocation from the config and CLI overrides.
pub fn build_plan(config: &ClientConfig, args: &SyncArgs, today: NaiveDate) -> ClientResult<SyncPlan> {
    let range = config
        .date_range(args.from, args.to, today)
        .map_err(ClientError::Config)?;
    let include = if args.users.is_empty() {
        &config.users.include
    } else {
        &args.users
    };
    Ok(SyncPlan::new(range, config.recordings.window_days).with_owners(include.iter().cloned()))
}

/// Reconciliation switches for this invocation.
pub fn build_options(config: &ClientConfig, args: &SyncArgs) -> ReconcileOptions {
    ReconcileOptions {
        delete_after_download: config.recordings.delete_after_download && !args.no_delete,
        dry_run: args.dry_run,
    }
}

/// Runs one synchronization and returns its totals.
pub async fn run_sync(
    config: &ClientConfig,
    args: &SyncArgs,
    shutdown: ShutdownHandle,
) -> ClientResult<SyncSummary> {
    let naming = config.naming_scheme().map_err(ClientError::Config)?;
    let plan = build_plan(config, args, Local::now().date_naive())?;
    let options = build_options(config, args);

    let mut ledger = CompletionLedger::open(config.ledger_path())?;

    let provider = super::connect(config).await?;
    let fetcher = HttpFetcher::new(config.http.timeout(), shutdown.clone())
        .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
    let progress = TracingProgress::default();

    let reconciler = Reconciler::new(
        &provider,
        &fetcher,
        &naming,
        &config.recordings.download_dir,
    )
    .with_progress(&progress)
    .with_shutdown(shutdown.clone())
    .with_options(options);

    let summary = SyncDriver::new(&provider, reconciler, shutdown)
        .run(&plan, &mut ledger)
        .await?;
    Ok(summary)
}

/// Runs `recsync sync` and prints the summary.
///
/// Fails when any recording still needs attention, so cron and systemd
/// see the run as unsuccessful.
pub async fn sync(config: &ClientConfig, args: &SyncArgs, shutdown: ShutdownHandle) -> ClientResult<()> {
    let summary = match run_sync(config, args, shutdown).await {
        Ok(summary) => summary,
        Err(ClientError::Sync(e)) => {
            if let Some(delay) = e.retry_after() {
                warn!(
                    retry_after_secs = delay.as_secs(),
                    "provider is rate limiting, wait before the next run"
                );
            }
            return Err(ClientError::Sync(e));
        }
        Err(e) => return Err(e),
    };
    println!("{}", summary);

    if args.dry_run || summary.is_clean() {
        Ok(())
    } else {
        Err(ClientError::Incomplete(
            "some recordings were kept in the cloud, run again to retry".to_string(),
        ))
    }
}
