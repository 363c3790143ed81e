//! Layered configuration for Fathom servers.
//!
//! This crate loads the settings the framework itself consumes:
//! - TOML and JSON configuration files, merged key by key
//! - `.env` files via `dotenvy`
//! - Environment variable overrides (`PREFIX__SECTION__KEY`)
//! - Strict validation (unknown keys are errors)
//!
//! Application configuration is a separate, application-defined type that
//! the server passes through to handlers untouched.
//!
//! # Example
//!
//! ```no_run
//! use fathom_config::ConfigLoader;
//!
//! # fn main() -> Result<(), fathom_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("fathom.toml")?
//!     .with_env_prefix("FATHOM")
//!     .load()?;
//!
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! workers = 4
//! keep_alive_secs = 5
//! graceful_shutdown_secs = 1
//! max_header_bytes = 65536
//! max_body_bytes = 8388608
//! http10_keep_alive = false
//! handle_signals = true
//!
//! [logging]
//! level = "info"
//! format = "json"
//! service_name = "my-service"
//! ```

mod config;
mod error;
mod loader;
mod schema;

pub use config::FathomConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingSettings, ServerSettings};
