//! Router error types.

use fathom_core::StateError;
use http::Method;
use thiserror::Error;

/// Errors raised while building a router or its documentation.
///
/// All of these are configuration errors: they surface before the server
/// starts accepting connections.
#[derive(Error, Debug)]
pub enum RouterError {
    /// A route pattern is not a valid regular expression.
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as declared.
        pattern: String,
        /// The regex compiler's error.
        #[source]
        source: Box<regex::Error>,
    },

    /// A handler needs a shared-state service that is not available.
    #[error("route {method} {pattern} ({handler}) cannot be served: {source}")]
    MissingState {
        /// Route method.
        method: Method,
        /// Route pattern.
        pattern: String,
        /// Handler type name.
        handler: &'static str,
        /// Which service is missing.
        #[source]
        source: StateError,
    },

    /// The OpenAPI document could not be serialized.
    #[error("failed to serialize OpenAPI document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Result type alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_display() {
        let err = RouterError::MissingState {
            method: Method::GET,
            pattern: "/cache".into(),
            handler: "CacheHandler",
            source: StateError::Omitted { type_name: "Cache" },
        };
        let msg = err.to_string();
        assert!(msg.contains("GET /cache"));
        assert!(msg.contains("CacheHandler"));
        assert!(msg.contains("Cache"));
    }

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = RouterError::InvalidPattern {
            pattern: "(".into(),
            source: Box::new(source),
        };
        assert!(err.to_string().starts_with("invalid route pattern `(`"));
    }
}
