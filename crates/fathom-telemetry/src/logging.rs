//! Subscriber installation.
//!
//! One `fmt` layer, in the configured [`LogFormat`], sits behind an
//! [`EnvFilter`]. A non-empty `RUST_LOG` replaces the configured level so
//! operators can raise verbosity without editing configuration.
//!
//! ```rust,no_run
//! use fathom_telemetry::{init_logging, LogConfig};
//!
//! # fn main() -> Result<(), fathom_telemetry::TelemetryError> {
//! init_logging(&LogConfig::production())?;
//! tracing::info!(http.method = "GET", http.path = "/hello", "Request completed");
//! # Ok(())
//! # }
//! ```

use crate::error::{TelemetryError, TelemetryResult};
use fathom_config::{LogFormat, LoggingSettings};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// What gets logged and how it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// When `false`, [`init_logging`] installs nothing.
    pub enabled: bool,
    /// `EnvFilter` directives, e.g. `info` or `fathom_server=debug,warn`.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
    /// Also log span open and close, e.g. per connection.
    pub span_events: bool,
    /// Source file and line of each event.
    pub file_line_info: bool,
    /// Worker thread ids.
    pub thread_ids: bool,
    /// Module path of each event.
    pub include_target: bool,
    /// Reported once, when logging starts.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingSettings::default())
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            enabled: settings.enabled,
            level: settings.level.clone(),
            format: settings.format,
            span_events: settings.span_events,
            file_line_info: settings.file_line_info,
            thread_ids: settings.thread_ids,
            include_target: settings.include_target,
            service_name: settings.service_name.clone(),
        }
    }
}

impl LogConfig {
    /// Pretty `debug` output with span events and source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".into(),
            format: LogFormat::Pretty,
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// JSON lines at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Json,
            ..Self::default()
        }
    }

    fn directives(&self) -> String {
        std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.level.clone())
    }

    fn layer(&self) -> BoxedLayer {
        let spans = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = tracing_subscriber::fmt::layer()
            .with_span_events(spans)
            .with_file(self.file_line_info)
            .with_line_number(self.file_line_info)
            .with_thread_ids(self.thread_ids)
            .with_target(self.include_target);

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] when the level does not parse, and
/// [`TelemetryError::LoggingInit`] when a global subscriber already exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.directives())?;
    tracing_subscriber::registry()
        .with(config.layer().with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        { fields::SERVICE_NAME } = %config.service_name,
        format = ?config.format,
        "Logging initialized"
    );
    Ok(())
}

/// Parses `EnvFilter` directives.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] when a directive does not parse.
pub fn create_env_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| TelemetryError::InvalidFilter(e.to_string()))
}

/// Field names shared by events across the workspace, for log queries.
pub mod fields {
    /// Per-process connection counter.
    pub const CONNECTION_ID: &str = "connection_id";
    /// Peer socket address.
    pub const REMOTE_ADDR: &str = "remote_addr";
    /// Request method.
    pub const HTTP_METHOD: &str = "http.method";
    /// Request path without the query string.
    pub const HTTP_PATH: &str = "http.path";
    /// Response status.
    pub const HTTP_STATUS: &str = "http.status_code";
    /// Time from parsed request to written response, in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// Description of the handler being called.
    pub const DESCRIPTION: &str = "description";
    /// Display form of a failure.
    pub const ERROR: &str = "error";
    /// Configured service name.
    pub const SERVICE_NAME: &str = "service.name";
}
