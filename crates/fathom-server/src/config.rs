//! Server configuration types.
//!
//! # Example
//!
//! ```rust
//! use fathom_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .host("127.0.0.1")
//!     .port(3000)
//!     .workers(4)
//!     .graceful_shutdown(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.addr(), "127.0.0.1:3000");
//! assert_eq!(config.workers(), 4);
//! ```

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use fathom_config::ServerSettings;

use crate::parser::ParseLimits;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default keep-alive timeout in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 5;

/// Default graceful shutdown period in seconds.
pub const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 1;

/// Default `Server` header value.
pub const DEFAULT_SERVER_HEADER: &str = concat!("fathom/", env!("CARGO_PKG_VERSION"));

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] to construct instances, or
/// [`ServerConfig::from_settings`] to take values from a loaded
/// configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    host: String,
    port: u16,
    workers: usize,
    keep_alive_timeout: Duration,
    graceful_shutdown: Duration,
    server_header: String,
    limits: ParseLimits,
    http10_keep_alive: bool,
    handle_signals: bool,
}

impl ServerConfig {
    /// Creates a new server configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Production preset: one worker per available core, 10 second grace period.
    #[must_use]
    pub fn production() -> Self {
        Self::builder()
            .workers(thread::available_parallelism().map_or(4, NonZeroUsize::get))
            .graceful_shutdown(Duration::from_secs(10))
            .build()
    }

    /// Builds the configuration from the `[server]` section of a config file.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fathom_config::ServerSettings;
    /// use fathom_server::ServerConfig;
    ///
    /// let settings = ServerSettings {
    ///     port: 9000,
    ///     server_header: Some("demo".to_string()),
    ///     ..ServerSettings::default()
    /// };
    /// let config = ServerConfig::from_settings(&settings);
    /// assert_eq!(config.port(), 9000);
    /// assert_eq!(config.server_header(), "demo");
    /// ```
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        let mut builder = Self::builder()
            .host(settings.host.clone())
            .port(settings.port)
            .workers(settings.workers)
            .keep_alive_timeout(Duration::from_secs(settings.keep_alive_secs))
            .graceful_shutdown(Duration::from_secs(settings.graceful_shutdown_secs))
            .max_header_bytes(settings.max_header_bytes)
            .max_body_bytes(settings.max_body_bytes)
            .http10_keep_alive(settings.http10_keep_alive)
            .handle_signals(settings.handle_signals);
        if let Some(header) = &settings.server_header {
            builder = builder.server_header(header.clone());
        }
        builder.build()
    }

    /// Returns the bind host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the bind port. Port 0 picks an ephemeral port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the number of event-loop threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns how long an idle connection waits for its next request.
    #[must_use]
    pub fn keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    /// Returns the delay between a shutdown request and the event loop stopping.
    #[must_use]
    pub fn graceful_shutdown(&self) -> Duration {
        self.graceful_shutdown
    }

    /// Returns the `Server` header value.
    #[must_use]
    pub fn server_header(&self) -> &str {
        &self.server_header
    }

    /// Returns the parser limits.
    #[must_use]
    pub fn limits(&self) -> ParseLimits {
        self.limits
    }

    /// Returns whether HTTP/1.0 clients may keep connections open.
    #[must_use]
    pub fn http10_keep_alive(&self) -> bool {
        self.http10_keep_alive
    }

    /// Returns whether SIGINT and SIGTERM trigger a graceful shutdown.
    #[must_use]
    pub fn handle_signals(&self) -> bool {
        self.handle_signals
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                workers: 1,
                keep_alive_timeout: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
                graceful_shutdown: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
                server_header: DEFAULT_SERVER_HEADER.to_string(),
                limits: ParseLimits::default(),
                http10_keep_alive: false,
                handle_signals: true,
            },
        }
    }

    /// Sets the bind host (name or address).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the bind port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the number of event-loop threads. Zero is treated as one.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Sets the keep-alive timeout.
    #[must_use]
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.config.keep_alive_timeout = timeout;
        self
    }

    /// Sets the graceful shutdown period.
    #[must_use]
    pub fn graceful_shutdown(mut self, period: Duration) -> Self {
        self.config.graceful_shutdown = period;
        self
    }

    /// Sets the `Server` header value.
    #[must_use]
    pub fn server_header(mut self, value: impl Into<String>) -> Self {
        self.config.server_header = value.into();
        self
    }

    /// Sets the maximum size of the request line plus headers.
    #[must_use]
    pub fn max_header_bytes(mut self, bytes: usize) -> Self {
        self.config.limits.max_header_bytes = bytes;
        self
    }

    /// Sets the maximum request body size.
    #[must_use]
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.limits.max_body_bytes = bytes;
        self
    }

    /// Allows HTTP/1.0 clients that send `Connection: keep-alive` to reuse
    /// the connection.
    #[must_use]
    pub fn http10_keep_alive(mut self, enabled: bool) -> Self {
        self.config.http10_keep_alive = enabled;
        self
    }

    /// Enables or disables SIGINT/SIGTERM handling.
    #[must_use]
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.config.handle_signals = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
