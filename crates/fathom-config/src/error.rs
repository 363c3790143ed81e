//! Errors raised while loading configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A configuration layer could not be applied, or the result is unusable.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required file does not exist.
    #[error("configuration file {} does not exist", .path.display())]
    Missing {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// A file exists but could not be read.
    #[error("cannot read {}", .path.display())]
    Read {
        /// The file being read.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },

    /// A file extension or format name other than `toml` or `json`.
    #[error("unsupported configuration format `{0}`")]
    UnsupportedFormat(String),

    /// A TOML layer is not valid TOML.
    #[error("malformed TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A layer is not valid JSON, or names keys or types the schema does not have.
    #[error("configuration does not fit the schema: {0}")]
    Shape(#[from] serde_json::Error),

    /// A `.env` file could not be parsed.
    #[error("cannot load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// An environment override could not be applied.
    #[error("environment variable {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A loaded value is out of range.
    #[error("{field} {reason}")]
    Invalid {
        /// Dotted key, e.g. `server.workers`.
        field: &'static str,
        /// What the value must satisfy.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn env(var: &str, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
