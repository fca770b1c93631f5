//! Tracing setup shared by the recsync crates.
//!
//! Interactive runs use the compact formatter; unattended runs (cron,
//! systemd timers) usually want [`TracingOutputFormat::Json`] so each
//! recording outcome ends up as one machine-readable line on stderr.
//!
//! ```ignore
//! use recsync_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::unattended())?;
//! ```

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Crates whose events are shown by default.
const LOG_TARGETS: &[&str] = &[
    "recsync",
    "recsync_client",
    "recsync_core",
    "recsync_engine",
    "recsync_providers",
];

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("unknown log format `{0}` (expected pretty, compact or json)")]
    UnknownFormat(String),
}

/// How events are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, for reading a single run closely
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for TracingOutputFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TracingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for the recsync crates when `RUST_LOG` is not set
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Add file, line and module path to each event
    pub verbose: bool,
    /// Log span open/close, which brackets each recording
    pub span_events: bool,
    /// Explicit filter directive, takes precedence over `RUST_LOG`
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Compact,
            verbose: false,
            span_events: false,
            filter: None,
        }
    }
}

impl TracingConfig {
    /// Settings for `--debug`
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            verbose: true,
            ..Self::default()
        }
    }

    /// JSON settings for runs nobody watches
    #[must_use]
    pub fn unattended() -> Self {
        Self {
            format: TracingOutputFormat::Json,
            span_events: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// The directive used when neither an explicit filter nor `RUST_LOG` is set.
    fn default_directive(&self) -> String {
        let level = self.level.to_string().to_ascii_lowercase();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(ref filter) = self.filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.default_directive())?),
        }
    }

    fn build_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.verbose)
            .with_line_number(self.verbose)
            .with_target(self.verbose)
            .with_span_events(span_events);

        match self.format {
            TracingOutputFormat::Pretty => layer.pretty().boxed(),
            TracingOutputFormat::Compact => layer.compact().boxed(),
            TracingOutputFormat::Json => layer.json().boxed(),
        }
    }
}

/// Initialize tracing with the given configuration.
///
/// Call once at startup.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.build_filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.build_layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
