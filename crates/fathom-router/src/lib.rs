//! Ordered first-match router for Fathom.
//!
//! Routes are declared once at startup as `(pattern, method, handler type)`
//! triples. Patterns are regular expressions matched against the whole
//! request path; named capture groups become [`Params`].
//!
//! # Features
//!
//! - **Declaration Order**: the first route whose method and pattern match wins
//! - **Typed Dispatch**: bodies and query strings are decoded into the handler's declared types
//! - **Startup Validation**: bad patterns and missing shared state fail before serving
//! - **OpenAPI**: a 3.0.0 document generated from the same route table
//!
//! # Example
//!
//! ```rust
//! use fathom_core::{Handler, HandlerError, RawRequest, Request, Response, SharedState};
//! use fathom_router::{Dispatch, RouteTable, Router};
//! use http::Method;
//! use std::sync::Arc;
//!
//! struct Greet;
//!
//! impl Handler<()> for Greet {
//!     type RequestBody = ();
//!     type Query = ();
//!     type ResponseBody = String;
//!     type State = ();
//!
//!     fn new(_config: Arc<()>, _state: ()) -> Self {
//!         Greet
//!     }
//!
//!     fn handle(&mut self, req: &Request<()>, resp: &mut Response<String>) -> Result<(), HandlerError> {
//!         resp.set_body(format!("Hello {}!", req.param("name").unwrap_or("world")));
//!         Ok(())
//!     }
//! }
//!
//! let table = RouteTable::new().get::<Greet>("/greet/(?<name>[a-z]+)");
//! let router = Router::new(table, Arc::new(()), Arc::new(SharedState::new())).unwrap();
//!
//! let dispatch = router.dispatch(RawRequest::new(Method::GET, "/greet/ada")).unwrap();
//! let Dispatch::Handled(response) = dispatch else { panic!("no match") };
//! assert_eq!(response.body, "Hello ada!");
//!
//! let miss = router.dispatch(RawRequest::new(Method::GET, "/greet/Ada")).unwrap();
//! assert_eq!(miss, Dispatch::NotFound);
//! ```

mod error;
pub mod openapi;
mod route;
mod router;

pub use error::{RouterError, RouterResult};
pub use fathom_core::Params;
pub use openapi::{OpenApi, OpenApiGenerator};
pub use route::{Route, RouteDoc, RouteTable};
pub use router::{Dispatch, Router};
