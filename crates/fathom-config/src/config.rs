//! Root configuration type.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::thread;

use crate::{ConfigError, LogFormat, LoggingSettings, ServerSettings};

/// Complete Fathom configuration.
///
/// Application-specific configuration stays with the application; this
/// covers only what the framework itself consumes.
///
/// # Example
///
/// ```
/// use fathom_config::FathomConfig;
///
/// let config = FathomConfig::default();
/// assert_eq!(config.server.port, 8080);
/// assert_eq!(config.logging.level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct FathomConfig {
    /// Server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl FathomConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for the first field that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }
        if self.server.workers == 0 {
            return Err(ConfigError::invalid(
                "server.workers",
                "at least one worker thread is required",
            ));
        }
        if self.server.max_header_bytes == 0 {
            return Err(ConfigError::invalid(
                "server.max_header_bytes",
                "must be greater than 0",
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "server.max_body_bytes",
                "must be greater than 0",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }

    /// Development preset: one worker, pretty debug logs with source locations.
    ///
    /// # Example
    ///
    /// ```
    /// use fathom_config::{FathomConfig, LogFormat};
    ///
    /// let config = FathomConfig::development();
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// assert_eq!(config.server.host, "127.0.0.1");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.server.host = "127.0.0.1".to_string();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.file_line_info = true;

        config
    }

    /// Production preset: one worker per available core and JSON logs.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.server.workers = thread::available_parallelism().map_or(4, NonZeroUsize::get);
        config.server.graceful_shutdown_secs = 10;

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FathomConfig::default().validate().is_ok());
        assert!(FathomConfig::development().validate().is_ok());
        assert!(FathomConfig::production().validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = FathomConfig::default();
        config.server.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.workers"));
    }

    #[test]
    fn test_production_uses_every_core() {
        let config = FathomConfig::production();
        assert!(config.server.workers >= 1);
        assert!(config.server.graceful_shutdown_secs > FathomConfig::default().server.graceful_shutdown_secs);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<FathomConfig, _> = toml::from_str("[database]\nurl = \"x\"");
        assert!(result.is_err());
    }
}
