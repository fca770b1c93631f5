//! Interrupt handling for a sync run.
//!
//! The first SIGINT or SIGTERM asks the run to stop: the driver checks the
//! flag before each recording and file, and the downloader between chunks,
//! so an interrupted run never leaves a half-written final file behind. A
//! second signal exits immediately.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Exit status after a forced stop (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

/// A cloneable stop flag shared by the driver, reconciler and downloader.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Creates an untriggered handle.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Asks every holder of this handle to stop.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once [`trigger`](Self::trigger) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The handle owns a sender, so the channel cannot close under us.
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Spawns a task that triggers this handle on SIGINT or SIGTERM.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen_for_signals(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                warn!(error = %e, "failed to install signal handlers, interrupts will kill the run");
                return;
            }
            info!("interrupt received, stopping after the current chunk (interrupt again to exit now)");
            handle.trigger();

            if wait_for_signal().await.is_ok() {
                warn!("second interrupt, exiting immediately");
                std::process::exit(FORCED_EXIT_CODE);
            }
        });
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_the_flag() {
        let handle = ShutdownHandle::new();
        let other = handle.clone();

        assert!(!handle.is_shutdown());
        other.trigger();
        assert!(handle.is_shutdown());

        // Triggering twice is harmless.
        handle.trigger();
        assert!(other.is_shutdown());
    }

    #[tokio::test]
    async fn cancelled_completes_after_trigger() {
        let handle = ShutdownHandle::new();

        let waiter = handle.clone();
        let task = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.trigger();

        let result = tokio::time::timeout(Duration::from_millis(100), task).await;
        assert!(result.unwrap().unwrap());
    }

    #[tokio::test]
    async fn cancelled_is_immediate_when_already_triggered() {
        let handle = ShutdownHandle::new();
        handle.trigger();
        let result = tokio::time::timeout(Duration::from_millis(50), handle.cancelled()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn untriggered_handle_stays_pending() {
        let handle = ShutdownHandle::new();
        let result = tokio::time::timeout(Duration::from_millis(20), handle.cancelled()).await;
        assert!(result.is_err());
    }
}
