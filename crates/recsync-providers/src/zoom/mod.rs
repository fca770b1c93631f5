//! Zoom cloud recording provider.
//!
//! Authenticates with a server-to-server OAuth app (account credentials
//! grant) and talks to the Zoom REST API v2:
//!
//! - `GET /users` to enumerate owners
//! - `GET /users/{id}/recordings` for one date window, paginated
//! - `DELETE /meetings/{uuid}/recordings` to trash or delete a recording
//!
//! # Example
//!
//! ```ignore
//! use recsync_providers::zoom::{ZoomConfig, ZoomCredentials, ZoomProvider};
//!
//! let config = ZoomConfig::new(ZoomCredentials::new(account_id, client_id, client_secret));
//! let provider = ZoomProvider::connect(config).await?;
//! let owners = provider.list_owners().await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;

pub use client::{ZoomApiClient, encode_meeting_uuid};
pub use config::{DEFAULT_API_BASE, DEFAULT_OAUTH_URL, MAX_PAGE_SIZE, ZoomConfig, ZoomCredentials};
pub use oauth::{AccessToken, ZoomOAuthClient};
pub use provider::ZoomProvider;
