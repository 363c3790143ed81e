//! # Fathom Core
//!
//! Core types and traits for the Fathom server framework.
//!
//! This crate provides the foundational types used throughout Fathom:
//!
//! - [`Record`] / [`FieldValue`] - Labeled, typed, documented body shapes
//! - [`codec`] - JSON encode/decode for records
//! - [`Body`] / [`Json`] - Request and response body conversions
//! - [`Request`] / [`Response`] - Typed messages seen by handlers
//! - [`RawRequest`] / [`RawResponse`] - Untyped messages exchanged with the connection engine
//! - [`SharedState`] / [`StateRegistry`] / [`Shared`] - Process-lifetime services
//! - [`Handler`] - Core handler trait
//!
//! # Example
//!
//! ```rust
//! use fathom_core::{codec, Record};
//!
//! #[derive(Debug, Default, PartialEq, Record)]
//! struct Echo {
//!     #[field(description = "Text sent back to the caller")]
//!     echo: String,
//! }
//!
//! let decoded: Echo = codec::from_slice(br#"{"echo":"hi"}"#).unwrap();
//! assert_eq!(decoded.echo, "hi");
//! assert_eq!(codec::to_bytes(&decoded).as_ref(), br#"{"echo":"hi"}"#);
//! ```

#![doc(html_root_url = "https://docs.rs/fathom-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Lets code generated by `#[derive(Record)]` refer to `::fathom_core` from inside this crate.
extern crate self as fathom_core;

mod body;
pub mod codec;
mod cookie;
mod error;
mod handler;
mod message;
mod params;
mod query;
pub mod record;
pub mod state;

pub use body::{Body, Json};
pub use cookie::Cookies;
pub use error::{DecodeError, HandlerError, StateError};
pub use handler::{Handler, DEFAULT_DESCRIPTION};
pub use message::{RawRequest, RawResponse, Request, Response};
pub use params::Params;
pub use query::{Query, QueryParams};
pub use record::{FieldDescriptor, FieldValue, Record, Schema};
pub use state::{FromSharedState, Shared, SharedState, StateRegistry, StateRequirement};

pub use fathom_macros::Record;

/// JSON value types used by records and generated code.
pub use serde_json;

/// HTTP vocabulary re-exported for handler code.
pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode, Version};
