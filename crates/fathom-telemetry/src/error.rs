//! Logging setup failures.

use thiserror::Error;

/// Logging could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level or filter directive is malformed.
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// Another global subscriber is already installed.
    #[error("cannot install log subscriber: {0}")]
    LoggingInit(String),
}

/// Shorthand for telemetry results.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
