//! Server error types.

use fathom_router::RouterError;
use http::StatusCode;
use std::io;
use thiserror::Error;

/// Reasons a request head or body could not be parsed.
///
/// Every parse error ends the connection; [`ParseError::status_code`] is the
/// status of the best-effort response written before closing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The request line is not `METHOD SP target SP version`.
    #[error("invalid request line")]
    InvalidRequestLine,

    /// The method token is not a valid HTTP method.
    #[error("invalid HTTP method")]
    InvalidMethod,

    /// The version is not HTTP/1.0 or HTTP/1.1.
    #[error("unsupported HTTP version")]
    UnsupportedVersion,

    /// A header line is malformed.
    #[error("invalid header")]
    InvalidHeader,

    /// `Content-Length` is not a number, or is repeated with different values.
    #[error("invalid content-length")]
    InvalidContentLength,

    /// The request line and headers exceed the configured limit.
    #[error("header block exceeds {limit} bytes")]
    HeadersTooLarge {
        /// The configured limit.
        limit: usize,
    },

    /// The declared body exceeds the configured limit.
    #[error("body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge {
        /// Declared body length.
        length: usize,
        /// The configured limit.
        limit: usize,
    },

    /// The request uses `Transfer-Encoding`, which is not supported.
    #[error("transfer-encoding is not supported")]
    UnsupportedTransferEncoding,
}

impl ParseError {
    /// Returns the status code for the response written before closing.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::HeadersTooLarge { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedTransferEncoding => StatusCode::NOT_IMPLEMENTED,
            Self::UnsupportedVersion => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors raised while building or starting a server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The host name did not resolve to any address.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        /// The `host:port` that was looked up.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was tried.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Routes or shared state are inconsistent.
    #[error("invalid server configuration: {0}")]
    Configuration(#[from] RouterError),

    /// A server setting has an unusable value.
    #[error("invalid server setting: {0}")]
    InvalidSetting(String),

    /// The event loop could not be started.
    #[error("failed to start the event loop: {0}")]
    Runtime(#[source] io::Error),
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
