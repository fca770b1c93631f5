//! Error types for recording provider operations.
//!
//! Every call into a provider (token exchange, user and recording listing,
//! deletion, file-set extraction) reports failures as a [`ProviderError`]
//! classified by a [`ProviderErrorCode`]. The engine decides from the code
//! whether a failure ends the run, skips one recording, or means the remote
//! copy is already gone.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// What went wrong, independent of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials were rejected or the access token expired.
    AuthenticationFailed,
    /// The app lacks a scope or the account forbids the call.
    AuthorizationFailed,
    /// The request never got an HTTP answer.
    NetworkError,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// The body could not be decoded.
    InvalidResponse,
    /// HTTP 404, e.g. a recording that was already deleted.
    NotFound,
    /// Any other HTTP 4xx.
    BadRequest,
    /// Local settings are unusable.
    ConfigurationError,
    /// The recording has no file entries at all.
    NoFilesFound,
}

impl ProviderErrorCode {
    /// Returns true if the same call may succeed on a later run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError | Self::NoFilesFound
        )
    }

    /// Returns the snake_case name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::NoFilesFound => "no_files_found",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed provider call.
#[derive(Debug, Error)]
#[error("{}{code}: {message}", ProviderTag(.provider.as_deref()))]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    provider: Option<String>,
    retry_after: Option<Duration>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Renders `[zoom] ` in front of messages that know their provider.
struct ProviderTag<'a>(Option<&'a str>);

impl fmt::Display for ProviderTag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(name) => write!(f, "[{}] ", name),
            None => Ok(()),
        }
    }
}

macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ProviderErrorCode::$code, message)
            }
        )*
    };
}

impl ProviderError {
    /// Creates an error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            retry_after: None,
            source: None,
        }
    }

    constructors! {
        /// Credentials or token rejected.
        authentication => AuthenticationFailed;
        /// Missing scope or forbidden call.
        authorization => AuthorizationFailed;
        network => NetworkError;
        rate_limited => RateLimited;
        server => ServerError;
        invalid_response => InvalidResponse;
        /// The addressed resource does not exist.
        not_found => NotFound;
        bad_request => BadRequest;
        configuration => ConfigurationError;
        /// A recording without file entries.
        no_files => NoFilesFound;
    }

    /// Builder method to name the provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Builder method to attach the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Builder method to record the server's `Retry-After` hint.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// How long the server asked us to wait, for rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Returns true if the same call may succeed on a later run.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the provider rejected the credentials.
    pub fn is_auth(&self) -> bool {
        matches!(
            self.code,
            ProviderErrorCode::AuthenticationFailed | ProviderErrorCode::AuthorizationFailed
        )
    }

    /// Maps a reqwest transport error to a network error.
    ///
    /// The URL is stripped from the cause since download URLs carry the
    /// access token.
    #[cfg(feature = "zoom")]
    pub(crate) fn from_transport(context: &str, err: reqwest::Error) -> Self {
        let what = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "could not connect"
        } else {
            "request failed"
        };
        Self::network(format!("{}: {}", context, what)).with_source(err.without_url())
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
