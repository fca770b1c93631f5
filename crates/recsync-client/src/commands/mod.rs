//! Subcommand implementations.

pub mod config;
pub mod ledger;
pub mod sync;
pub mod users;

use recsync_engine::SyncError;
use recsync_providers::zoom::ZoomProvider;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Resolves the credentials and obtains the run's access token.
pub async fn connect(config: &ClientConfig) -> ClientResult<ZoomProvider> {
    let zoom = config.zoom_config().map_err(ClientError::Config)?;
    ZoomProvider::connect(zoom).await.map_err(|e| {
        if e.is_auth() {
            ClientError::Sync(SyncError::ProviderAuthFailed(e))
        } else {
            ClientError::Provider(e)
        }
    })
}
