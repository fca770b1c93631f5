//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/recsync/config.toml` by default.
//!
//! OAuth values (`account_id`, `client_id`, `client_secret`) support secret
//! references:
//! - `pass::path/in/store` is resolved via `pass show`
//! - `env::VAR_NAME` is read from the environment
//! - `file::/path` reads the first line of a file
//! - plain text is used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use recsync_core::naming::{DEFAULT_FILENAME_TEMPLATE, DEFAULT_FOLDER_TEMPLATE, DEFAULT_STRFTIME};
use recsync_core::{DateRange, NamingScheme};
use recsync_providers::DeleteAction;
use recsync_providers::zoom::{ZoomConfig, ZoomCredentials};
use serde::{Deserialize, Serialize};

/// File name of the completion ledger when `ledger_path` is not set.
pub const DEFAULT_LEDGER_FILE: &str = "completed-downloads.log";

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the recsync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server-to-server OAuth app credentials.
    pub oauth: OAuthSettings,

    /// What to download, where, and how to name it.
    pub recordings: RecordingSettings,

    /// Which users to synchronize.
    pub users: UserSettings,

    /// HTTP settings.
    pub http: HttpSettings,

    /// File this configuration was read from.
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// Zoom server-to-server OAuth credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Account ID (supports `pass::` and `env::` prefixes).
    pub account_id: Option<String>,

    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,
}

/// Recording selection, storage and naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// First day to synchronize (`"YYYY-MM-DD"`). Defaults to January 1st
    /// of the current year.
    pub start_date: Option<NaiveDate>,

    /// Last day to synchronize, inclusive. Defaults to today.
    pub end_date: Option<NaiveDate>,

    /// Maximum days per listing request.
    pub window_days: u32,

    /// Listing page size, at most 300.
    pub page_size: u32,

    /// IANA timezone used for `{meeting_time}` and the date placeholders.
    pub timezone: String,

    /// strftime pattern for `{meeting_time}`.
    pub strftime: String,

    /// File name template.
    pub filename: String,

    /// Folder template, relative to `download_dir`.
    pub folder: String,

    /// Root directory for downloads.
    pub download_dir: PathBuf,

    /// Completion ledger. Defaults to `<download_dir>/completed-downloads.log`.
    pub ledger_path: Option<PathBuf>,

    /// Delete recordings from the cloud once every file is verified.
    pub delete_after_download: bool,

    /// `trash` (recoverable) or `delete` (permanent).
    pub delete_action: DeleteAction,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            window_days: 30,
            page_size: 300,
            timezone: "UTC".to_string(),
            strftime: DEFAULT_STRFTIME.to_string(),
            filename: DEFAULT_FILENAME_TEMPLATE.to_string(),
            folder: DEFAULT_FOLDER_TEMPLATE.to_string(),
            download_dir: PathBuf::from("downloads"),
            ledger_path: None,
            delete_after_download: true,
            delete_action: DeleteAction::default(),
        }
    }
}

/// User selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Emails of the users to synchronize. Empty means every active user.
    pub include: Vec<String>,
}

/// HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Timeout in seconds for API calls and download connection setup.
    pub timeout_secs: u64,

    /// REST API base URL override.
    pub api_base: Option<String>,

    /// OAuth token endpoint override.
    pub oauth_url: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            api_base: None,
            oauth_url: None,
        }
    }
}

impl HttpSettings {
    /// The timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// The file this configuration came from, or the default location.
    pub fn source_path(&self) -> PathBuf {
        self.source.clone().unwrap_or_else(Self::default_path)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recsync")
    }

    /// Returns the completion ledger path.
    pub fn ledger_path(&self) -> PathBuf {
        self.recordings
            .ledger_path
            .clone()
            .unwrap_or_else(|| self.recordings.download_dir.join(DEFAULT_LEDGER_FILE))
    }

    /// Parses the naming templates and time format.
    pub fn naming_scheme(&self) -> Result<NamingScheme, String> {
        let r = &self.recordings;
        NamingScheme::new(&r.folder, &r.filename, &r.timezone, &r.strftime)
            .map_err(|e| format!("invalid [recordings] naming settings: {}", e))
    }

    /// Returns the half-open day range to synchronize.
    ///
    /// `from` and `to` override the configured dates; both ends are
    /// inclusive days, so the range ends the day after `to`.
    pub fn date_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<DateRange, String> {
        let start = from.or(self.recordings.start_date).unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today)
        });
        let last = to.or(self.recordings.end_date).unwrap_or(today);
        let end = last
            .succ_opt()
            .ok_or_else(|| format!("end date {} is out of range", last))?;

        if start > last {
            return Err(format!(
                "start date {} is after end date {}",
                start, last
            ));
        }
        DateRange::new(start, end).map_err(|e| e.to_string())
    }

    /// Builds the Zoom provider configuration, resolving secret references.
    pub fn zoom_config(&self) -> Result<ZoomConfig, String> {
        let credentials = self.oauth.resolve_credentials(&self.source_path())?;
        credentials.validate().map_err(|e| e.to_string())?;

        let mut config = ZoomConfig::new(credentials)
            .with_timeout(self.http.timeout())
            .with_page_size(self.recordings.page_size)
            .with_delete_action(self.recordings.delete_action);
        if let Some(ref base) = self.http.api_base {
            config = config.with_api_base(base);
        }
        if let Some(ref url) = self.http.oauth_url {
            config = config.with_oauth_url(url);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that can be checked without network access.
    pub fn validate(&self) -> Result<(), String> {
        if self.recordings.window_days == 0 {
            return Err("[recordings] window_days must be at least 1".to_string());
        }
        if self.recordings.page_size == 0 {
            return Err("[recordings] page_size must be at least 1".to_string());
        }
        self.naming_scheme()?;
        self.zoom_config()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OAuth credential resolution
// ---------------------------------------------------------------------------

impl OAuthSettings {
    /// Resolves the three credential values.
    ///
    /// Each value is passed through `secret::resolve()` to expand `pass::`,
    /// `env::` and `file::` references. `config_path` is named in the error
    /// for a missing value.
    pub fn resolve_credentials(&self, config_path: &Path) -> Result<ZoomCredentials, String> {
        let field = |key, value: &Option<String>| {
            Self::resolve_field(key, value.as_deref(), config_path)
        };
        let account_id = field("account_id", &self.account_id)?;
        let client_id = field("client_id", &self.client_id)?;
        let client_secret = field("client_secret", &self.client_secret)?;
        Ok(ZoomCredentials::new(account_id, client_id, client_secret))
    }

    fn resolve_field(key: &str, value: Option<&str>, config_path: &Path) -> Result<String, String> {
        let raw = value.ok_or_else(|| {
            format!(
                "no value provided for [oauth] {} in {}:\n  \
                 [oauth]\n  \
                 account_id = \"YOUR_ACCOUNT_ID\"\n  \
                 client_id = \"YOUR_CLIENT_ID\"\n  \
                 client_secret = \"pass::zoom/client-secret\"",
                key,
                config_path.display()
            )
        })?;
        crate::secret::resolve(raw).map_err(|e| format!("failed to resolve {}: {}", key, e))
    }
}
