//! HTTP/1.1 connection engine and listener for Fathom.
//!
//! The listener binds a TCP socket, runs a pool of worker threads sharing
//! one event loop and starts a [`connection::Connection`] per accepted
//! socket. Each connection parses requests incrementally, dispatches them
//! through a [`fathom_router::Router`] and writes responses in order,
//! keeping the socket open between requests when the protocol allows it.
//!
//! ## Behavior
//!
//! - Pipelined requests are answered strictly in arrival order.
//! - An idle connection is closed once the keep-alive timeout elapses
//!   without the first byte of a new request.
//! - Handler errors and panics become `500 Internal server error`; the
//!   connection stays usable.
//! - Malformed requests get a best-effort error response and the
//!   connection is closed.
//! - After shutdown is triggered no new connections are accepted; the event
//!   loop keeps serving open connections until the grace period elapses.

#![doc(html_root_url = "https://docs.rs/fathom-server/0.1.0")]

pub mod config;
pub mod connection;
mod error;
pub mod parser;
pub mod response;
mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{ParseError, ServerError, ServerResult};
pub use parser::{ParseLimits, ParseStatus, ParsedRequest, RequestParser};
pub use server::{RunningServer, Server, ServerBuilder};
pub use shutdown::ShutdownHandle;
