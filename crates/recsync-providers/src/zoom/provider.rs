//! Zoom cloud recording provider implementation.
//!
//! This module implements the [`RecordingProvider`] trait for Zoom.

use recsync_core::{DateWindow, FileDescriptor, MeetingId, Recording};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::normalize;
use crate::provider::{BoxFuture, Owner, RecordingPage, RecordingProvider};

use super::client::ZoomApiClient;
use super::config::ZoomConfig;
use super::oauth::ZoomOAuthClient;

/// Zoom cloud recording provider.
///
/// Holds the one access token obtained in [`ZoomProvider::connect`]; listing,
/// download URLs and deletion all use it.
#[derive(Debug)]
pub struct ZoomProvider {
    client: ZoomApiClient,
}

impl ZoomProvider {
    /// Validates the configuration and obtains an access token.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings and an
    /// authentication error if no token could be obtained.
    pub async fn connect(config: ZoomConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let oauth = ZoomOAuthClient::new(
            config.credentials.clone(),
            config.oauth_url.clone(),
            config.timeout,
        )?;
        let token = oauth
            .fetch_access_token()
            .await
            .map_err(|e| e.with_provider("zoom"))?;

        info!(
            api_base = %config.api_base,
            delete_action = config.delete_action.as_str(),
            "connected to zoom"
        );
        Ok(Self {
            client: ZoomApiClient::new(&config, token)?,
        })
    }
}

impl RecordingProvider for ZoomProvider {
    fn name(&self) -> &str {
        "zoom"
    }

    fn list_owners(&self) -> BoxFuture<'_, ProviderResult<Vec<Owner>>> {
        Box::pin(async move {
            self.client
                .list_users()
                .await
                .map_err(|e| e.with_provider("zoom"))
        })
    }

    fn list_recordings<'a>(
        &'a self,
        owner_id: &'a str,
        window: DateWindow,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<RecordingPage>> {
        Box::pin(async move {
            debug!(owner = owner_id, %window, "listing recordings");
            self.client
                .list_recordings_page(owner_id, window, page_token)
                .await
                .map_err(|e| e.with_provider("zoom"))
        })
    }

    fn delete_recording<'a>(
        &'a self,
        meeting_id: &'a MeetingId,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.client
                .delete_recordings(meeting_id)
                .await
                .map_err(|e| e.with_provider("zoom"))
        })
    }

    fn extract_files(&self, recording: &Recording) -> ProviderResult<Vec<FileDescriptor>> {
        normalize::extract_files(recording, self.client.access_token().secret())
            .map_err(|e| e.with_provider("zoom"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::zoom::config::ZoomCredentials;
    use chrono::{NaiveDate, TimeZone, Utc};
    use mockito::Matcher;
    use recsync_core::RecordingFile;

    fn config(server: &mockito::ServerGuard) -> ZoomConfig {
        ZoomConfig::new(ZoomCredentials::new("acct", "client", "secret"))
            .with_api_base(format!("{}/v2", server.url()))
            .with_oauth_url(format!("{}/oauth/token", server.url()))
    }

    async fn token_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"access_token":"tok","expires_in":3600}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn connect_then_list_and_extract() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        server
            .mock("GET", "/v2/users/u1/recordings")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"next_page_token":"","meetings":[]}"#)
            .create_async()
            .await;

        let provider = ZoomProvider::connect(config(&server)).await.unwrap();
        token.assert_async().await;
        assert_eq!(provider.name(), "zoom");

        let window = DateWindow {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        let page = provider.list_recordings("u1", window, None).await.unwrap();
        assert!(page.recordings.is_empty());
        assert!(page.next_page_token.is_none());

        let recording = Recording::new("m==", "Topic", Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
            .with_file(RecordingFile {
                id: Some("f".into()),
                file_type: "MP4".into(),
                file_extension: "MP4".into(),
                recording_type: Some("active_speaker".into()),
                download_url: Some("https://zoom.us/rec/download/f".into()),
                file_size: Some(10),
            });
        let files = provider.extract_files(&recording).unwrap();
        assert!(files[0].download_url.ends_with("access_token=tok"));
    }

    #[tokio::test]
    async fn connect_fails_on_bad_credentials() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"reason":"Invalid client_id or client_secret"}"#)
            .create_async()
            .await;

        let err = ZoomProvider::connect(config(&server)).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("zoom"));
    }

    #[tokio::test]
    async fn connect_rejects_invalid_config() {
        let config = ZoomConfig::new(ZoomCredentials::new("", "client", "secret"));
        let err = ZoomProvider::connect(config).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }
}
