//! Error types for Fathom core.
//!
//! - [`DecodeError`] - a request body or query string did not match the declared shape
//! - [`StateError`] - a handler asked for a shared-state type that was never provided
//! - [`HandlerError`] - a handler failed; always reported to the client as a 500

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Error produced while converting wire data into a typed value.
///
/// Decode errors never terminate a connection; the dispatcher turns them
/// into a 4xx response (see [`DecodeError::status_code`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body was not syntactically valid JSON.
    #[error("malformed JSON: {message}")]
    Syntax {
        /// Parser diagnostic.
        message: String,
    },

    /// The body was not valid UTF-8 text.
    #[error("body is not valid UTF-8")]
    InvalidUtf8,

    /// A required field was absent.
    #[error("missing required field `{label}`")]
    MissingField {
        /// Label of the missing field.
        label: String,
    },

    /// A value had the wrong JSON type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected JSON type name.
        expected: &'static str,
        /// Actual JSON type name.
        found: &'static str,
    },

    /// A number did not fit the target integer type.
    #[error("{value} is out of range for {target}")]
    OutOfRange {
        /// The rejected value as text.
        value: String,
        /// The target type name.
        target: &'static str,
    },

    /// A nested value failed to decode.
    #[error("field `{label}`: {source}")]
    Field {
        /// Label of the enclosing field.
        label: String,
        /// The underlying error.
        #[source]
        source: Box<DecodeError>,
    },

    /// A label-addressed access named a field the record does not have.
    #[error("record `{record}` has no field `{label}`")]
    UnknownField {
        /// Record type name.
        record: &'static str,
        /// The unknown label.
        label: String,
    },

    /// The query string could not be parsed.
    #[error("invalid query string: {message}")]
    Query {
        /// Parser diagnostic.
        message: String,
    },
}

impl DecodeError {
    /// Creates a syntax error from a parser diagnostic.
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    #[must_use]
    pub fn missing_field(label: impl Into<String>) -> Self {
        Self::MissingField {
            label: label.into(),
        }
    }

    /// Creates a type mismatch error against the actual JSON value.
    #[must_use]
    pub fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected,
            found: json_type_name(found),
        }
    }

    /// Creates an out of range error.
    #[must_use]
    pub fn out_of_range(value: impl ToString, target: &'static str) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target,
        }
    }

    /// Wraps this error with the label of the field it occurred in.
    #[must_use]
    pub fn in_field(self, label: impl Into<String>) -> Self {
        Self::Field {
            label: label.into(),
            source: Box::new(self),
        }
    }

    /// Returns the HTTP status code the dispatcher responds with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Error resolving shared state for a handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// No factory was registered for the type.
    #[error("shared state `{type_name}` was never registered")]
    NotRegistered {
        /// The requested type.
        type_name: &'static str,
    },

    /// A factory was registered but returned no value at startup.
    #[error("shared state `{type_name}` was omitted because its factory returned no value")]
    Omitted {
        /// The requested type.
        type_name: &'static str,
    },
}

impl StateError {
    /// Returns the name of the type that could not be resolved.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::NotRegistered { type_name } | Self::Omitted { type_name } => type_name,
        }
    }
}

/// Error returned by a handler.
///
/// Handlers that want to answer with a 4xx status set it on the response
/// themselves; any `Err` is treated as a fault and answered with a generic 500.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Internal failure inside the handler.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message (not exposed to clients).
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl HandlerError {
    /// Creates an internal error with a message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error wrapping a source error.
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

impl From<StateError> for HandlerError {
    fn from(err: StateError) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

impl From<DecodeError> for HandlerError {
    fn from(err: DecodeError) -> Self {
        Self::with_source(err.to_string(), err)
    }
}
