//! RecordingProvider trait and implementations.
//!
//! This crate provides the abstraction layer for cloud recording services:
//!
//! - [`RecordingProvider`] - The core trait that all recording backends implement
//! - [`extract_files`] - Conversion of a recording to classified, download-ready files
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//!          ┌─────────────────┐
//!          │   Zoom API v2   │
//!          └────────┬────────┘
//!                   │
//!                   ▼
//!          ┌─────────────────┐
//!          │  ZoomProvider   │
//!          └────────┬────────┘
//!                   │ RecordingProvider
//!                   ▼
//!            ┌─────────────┐
//!            │  Recording  │
//!            └──────┬──────┘
//!                   │
//!                   ▼ extract_files()
//!          ┌──────────────────┐
//!          │  FileDescriptor  │
//!          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use recsync_providers::{RecordingProvider, zoom::ZoomProvider};
//!
//! async fn first_page(provider: &dyn RecordingProvider, owner: &str, window: DateWindow) {
//!     let page = provider.list_recordings(owner, window, None).await?;
//!     for recording in &page.recordings {
//!         let files = provider.extract_files(recording)?;
//!     }
//! }
//! ```

pub mod error;
pub mod normalize;
pub mod provider;
#[cfg(feature = "zoom")]
pub mod zoom;

// Re-export main types at crate root
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use normalize::{MARKER_FILE_TYPES, authorize_url, categorize, extract_files};
pub use provider::{BoxFuture, DeleteAction, Owner, RecordingPage, RecordingProvider};
