//! Structured logging for Fathom.
//!
//! Every Fathom crate emits `tracing` events; this crate installs the
//! subscriber that formats them. Output is JSON by default, with pretty and
//! compact formats for development.
//!
//! # Example
//!
//! ```rust,no_run
//! use fathom_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).expect("logging");
//! tracing::info!(http.path = "/hello", "Serving");
//! ```

mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use fathom_config::LogFormat;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};
