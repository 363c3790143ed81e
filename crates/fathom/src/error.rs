//! Top-level error type.

use fathom_config::ConfigError;
use fathom_server::ServerError;
use fathom_telemetry::TelemetryError;
use thiserror::Error;

/// Any error raised while configuring or running a Fathom application.
#[derive(Error, Debug)]
pub enum FathomError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server could not be built or started.
    #[error(transparent)]
    Server(#[from] ServerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_message() {
        let err: FathomError = TelemetryError::InvalidFilter("bad".into()).into();
        assert!(matches!(err, FathomError::Telemetry(_)));
        assert_eq!(
            err.to_string(),
            TelemetryError::InvalidFilter("bad".into()).to_string()
        );

        let err: FathomError = ServerError::InvalidSetting("workers".into()).into();
        assert!(err.to_string().contains("workers"));
    }
}
