//! # Fathom
//!
//! **Embeddable HTTP/1.1 server framework with typed handlers**
//!
//! Fathom accepts TCP connections, parses HTTP/1.1 requests, dispatches them
//! by path and method to strongly-typed handlers and writes the typed
//! responses back, managing keep-alive, idle timeouts and graceful shutdown.
//!
//! - **Typed handlers**: request body, query string, response body and the
//!   shared services a handler needs are all associated types
//! - **Records**: `#[derive(Record)]` structs encode to and decode from JSON
//!   with field metadata available for documentation; crates that only
//!   depend on `fathom` add `#[record(crate = "fathom::core")]`
//! - **Ordered routing**: regex patterns with named captures, first match wins
//! - **Startup validation**: missing services and bad patterns fail before
//!   the first connection is accepted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fathom::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default, Clone, Record)]
//! #[record(crate = "fathom::core")]
//! struct Greeting {
//!     #[field(description = "Greeting text")]
//!     message: String,
//! }
//!
//! struct Hello;
//!
//! impl Handler<()> for Hello {
//!     type RequestBody = ();
//!     type Query = ();
//!     type ResponseBody = Json<Greeting>;
//!     type State = ();
//!
//!     const DESCRIPTION: &'static str = "Says hello";
//!
//!     fn new(_config: Arc<()>, _state: ()) -> Self {
//!         Hello
//!     }
//!
//!     fn handle(
//!         &mut self,
//!         _request: &Request<()>,
//!         response: &mut Response<Json<Greeting>>,
//!     ) -> Result<(), HandlerError> {
//!         response.body_mut().message = "Hello, World!".to_string();
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), fathom::FathomError> {
//!     let config = ConfigLoader::new()
//!         .with_development()
//!         .with_env_prefix("FATHOM")
//!         .load()?;
//!     init_logging(&LogConfig::from(&config.logging))?;
//!
//!     fathom::serve(&config, (), StateRegistry::new(), RouteTable::new().get::<Hello>("/hello"))
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/fathom/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;

pub use error::FathomError;

// Re-export the member crates
pub use fathom_config as config;
pub use fathom_core as core;
pub use fathom_router as router;
pub use fathom_server as server;
pub use fathom_telemetry as telemetry;

// Re-export the derive macro
pub use fathom_core::Record;

use fathom_config::FathomConfig;
use fathom_core::StateRegistry;
use fathom_router::RouteTable;
use fathom_server::{Server, ServerConfig};

/// Builds a server from loaded configuration and runs it until shutdown.
///
/// Logging is left to the caller so that it can be initialized before
/// configuration-dependent services are constructed.
///
/// # Errors
///
/// Returns [`FathomError::Server`] if the listener cannot be bound, a route
/// is invalid or a handler needs a service the registry did not provide.
pub fn serve<C: Send + Sync + 'static>(
    config: &FathomConfig,
    app_config: C,
    state: StateRegistry<C>,
    routes: RouteTable<C>,
) -> Result<(), FathomError> {
    Server::builder(app_config)
        .config(ServerConfig::from_settings(&config.server))
        .state(state)
        .routes(routes)
        .build()?
        .run()?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use fathom::prelude::*;
/// ```
pub mod prelude {
    pub use fathom_core::{
        header, Body, Cookies, FieldValue, Handler, HandlerError, HeaderValue, Json, Method,
        Params, Query, QueryParams, Record, Request, Response, Shared, StateRegistry, StatusCode,
    };

    pub use fathom_router::{OpenApiGenerator, RouteTable};

    pub use fathom_server::{RunningServer, Server, ServerConfig, ShutdownHandle};

    pub use fathom_config::{ConfigLoader, FathomConfig};

    pub use fathom_telemetry::{init_logging, LogConfig};
}
