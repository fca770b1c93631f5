//! Zoom provider configuration.

use std::time::Duration;

use crate::provider::DeleteAction;

/// Default REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.zoom.us/v2";

/// Default OAuth token endpoint.
pub const DEFAULT_OAUTH_URL: &str = "https://zoom.us/oauth/token";

/// Largest page size the recordings endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 300;

/// Server-to-server OAuth app credentials.
#[derive(Clone)]
pub struct ZoomCredentials {
    /// The Zoom account the app is installed on.
    pub account_id: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

impl ZoomCredentials {
    /// Creates new credentials.
    pub fn new(
        account_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Checks that no field is empty.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.account_id.trim().is_empty() {
            return Err("account_id is required");
        }
        if self.client_id.trim().is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ZoomCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoomCredentials")
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for the Zoom provider.
#[derive(Debug, Clone)]
pub struct ZoomConfig {
    /// App credentials.
    pub credentials: ZoomCredentials,
    /// REST API base URL.
    pub api_base: String,
    /// OAuth token endpoint.
    pub oauth_url: String,
    /// HTTP timeout for API calls.
    pub timeout: Duration,
    /// Page size for listings, at most [`MAX_PAGE_SIZE`].
    pub page_size: u32,
    /// What deletion does on the Zoom side.
    pub delete_action: DeleteAction,
}

impl ZoomConfig {
    /// Creates a configuration with default endpoints.
    pub fn new(credentials: ZoomCredentials) -> Self {
        Self {
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            timeout: Duration::from_secs(30),
            page_size: MAX_PAGE_SIZE,
            delete_action: DeleteAction::default(),
        }
    }

    /// Builder method to point at another API base (tests, proxies).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder method to set the OAuth token endpoint.
    pub fn with_oauth_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_url = url.into();
        self
    }

    /// Builder method to set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the listing page size, clamped to `1..=300`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Builder method to set the delete action.
    pub fn with_delete_action(mut self, action: DeleteAction) -> Self {
        self.delete_action = action;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials.validate().map_err(String::from)?;
        if url::Url::parse(&self.api_base).is_err() {
            return Err(format!("invalid api_base URL: {}", self.api_base));
        }
        if url::Url::parse(&self.oauth_url).is_err() {
            return Err(format!("invalid oauth_url: {}", self.oauth_url));
        }
        Ok(())
    }
}
