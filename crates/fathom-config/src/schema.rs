//! Configuration section types.

use serde::{Deserialize, Serialize};

/// Listener and connection settings.
///
/// Every key is optional in a file; missing keys take the defaults below.
///
/// # Example
///
/// ```
/// use fathom_config::ServerSettings;
///
/// let settings = ServerSettings::default();
/// assert_eq!(settings.port, 8080);
/// assert_eq!(settings.keep_alive_secs, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Host name or address to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Number of worker threads driving the event loop.
    pub workers: usize,
    /// Idle time allowed between requests on a persistent connection.
    pub keep_alive_secs: u64,
    /// Time between the shutdown signal and stopping the event loop.
    pub graceful_shutdown_secs: u64,
    /// Value of the `Server` response header; `None` uses the built-in value.
    pub server_header: Option<String>,
    /// Largest accepted request line plus header block.
    pub max_header_bytes: usize,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Honor `Connection: keep-alive` on HTTP/1.0 requests.
    pub http10_keep_alive: bool,
    /// Install SIGINT/SIGTERM handlers that start graceful shutdown.
    pub handle_signals: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 1,
            keep_alive_secs: 5,
            graceful_shutdown_secs: 1,
            server_header: None,
            max_header_bytes: 64 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
            http10_keep_alive: false,
            handle_signals: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Whether logging is installed at all.
    pub enabled: bool,
    /// Default level or `EnvFilter` directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Emit span open/close events.
    pub span_events: bool,
    /// Include source file and line.
    pub file_line_info: bool,
    /// Include thread ids.
    pub thread_ids: bool,
    /// Include the event target.
    pub include_target: bool,
    /// Service name attached to every event.
    pub service_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "fathom".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_settings_partial_toml() {
        let settings: ServerSettings = toml::from_str("port = 9000\nworkers = 4").unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.host, "0.0.0.0");
        assert!(settings.handle_signals);
    }

    #[test]
    fn test_server_settings_rejects_unknown_key() {
        let result: Result<ServerSettings, _> = toml::from_str("prot = 9000");
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"compact\"").unwrap();
        assert_eq!(format, LogFormat::Compact);
        assert_eq!(serde_json::to_string(&LogFormat::Pretty).unwrap(), "\"pretty\"");
    }
}
