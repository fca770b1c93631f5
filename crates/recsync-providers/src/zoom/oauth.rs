//! Server-to-server OAuth for the Zoom API.
//!
//! Zoom's account credentials grant exchanges the app's client ID and secret
//! (HTTP Basic) plus the account ID for a short-lived bearer token. There is
//! no refresh token: a new token is simply requested. The sync engine asks
//! for exactly one token per run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::config::ZoomCredentials;

/// A bearer token for API calls and file downloads.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Wraps a token value.
    pub fn new(value: impl Into<String>, expires_in_secs: Option<i64>) -> Self {
        Self {
            value: value.into(),
            expires_at: expires_in_secs.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }

    /// The raw token.
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// When the token stops working, if the server said.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    reason: Option<String>,
}

/// OAuth client for the account credentials grant.
#[derive(Debug)]
pub struct ZoomOAuthClient {
    credentials: ZoomCredentials,
    token_url: String,
    http_client: reqwest::Client,
}

impl ZoomOAuthClient {
    /// Creates a new OAuth client.
    pub fn new(
        credentials: ZoomCredentials,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::configuration("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            credentials,
            token_url: token_url.into(),
            http_client,
        })
    }

    /// Requests a new access token.
    ///
    /// # Errors
    ///
    /// Every failure, including transport errors, is reported as an
    /// authentication error: without a token the run cannot start.
    pub async fn fetch_access_token(&self) -> ProviderResult<AccessToken> {
        debug!(account_id = %self.credentials.account_id, "requesting access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.credentials.account_id.as_str()),
            ])
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|e| {
                ProviderError::authentication(format!("token request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::authentication(format!("failed to read token response: {}", e))
        })?;

        let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let reason = parsed
                .and_then(|r| r.reason)
                .unwrap_or_else(|| body.trim().to_string());
            return Err(ProviderError::authentication(format!(
                "token request rejected ({}): {}",
                status, reason
            )));
        }

        let parsed = parsed.ok_or_else(|| {
            ProviderError::authentication("token response is not valid JSON")
        })?;
        let value = parsed.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            ProviderError::authentication("token response has no access_token")
        })?;

        info!("obtained access token");
        Ok(AccessToken::new(value, parsed.expires_in))
    }
}
