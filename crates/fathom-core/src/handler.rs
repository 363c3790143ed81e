//! Handler trait for request processing.
//!
//! A handler is a type that the router constructs for every matched request
//! from the application configuration and the filtered shared state it
//! declared. Its associated types tell the router how to decode the request
//! body and query string and how to encode the response body.

use crate::state::FromSharedState;
use crate::{Body, HandlerError, QueryParams, Request, Response};
use std::sync::Arc;

/// Description used when a handler does not provide one.
pub const DEFAULT_DESCRIPTION: &str = "This endpoint has no description";

/// A typed request handler.
///
/// `C` is the application configuration type passed through by the server.
///
/// # Example
///
/// ```rust
/// use fathom_core::{Handler, HandlerError, Json, Record, Request, Response};
/// use std::sync::Arc;
///
/// #[derive(Debug, Default, Record)]
/// struct Echo {
///     #[field(description = "Text to echo")]
///     echo: String,
/// }
///
/// struct EchoHandler;
///
/// impl Handler<()> for EchoHandler {
///     type RequestBody = Json<Echo>;
///     type Query = ();
///     type ResponseBody = Json<Echo>;
///     type State = ();
///
///     const DESCRIPTION: &'static str = "Sends the request body back";
///
///     fn new(_config: Arc<()>, _state: ()) -> Self {
///         EchoHandler
///     }
///
///     fn handle(
///         &mut self,
///         request: &Request<Json<Echo>>,
///         response: &mut Response<Json<Echo>>,
///     ) -> Result<(), HandlerError> {
///         response.body_mut().echo = request.body().echo.clone();
///         Ok(())
///     }
/// }
/// ```
pub trait Handler<C>: Sized + Send + 'static {
    /// Declared request body type.
    type RequestBody: Body;
    /// Declared query parameter type; `()` ignores the query string.
    type Query: QueryParams;
    /// Declared response body type, default-constructed before the call.
    type ResponseBody: Body + Default;
    /// Shared-state services this handler needs.
    type State: FromSharedState;

    /// Human-readable description, used in logs and generated documentation.
    const DESCRIPTION: &'static str = DEFAULT_DESCRIPTION;

    /// Builds the handler for one request.
    fn new(config: Arc<C>, state: Self::State) -> Self;

    /// Handles the request, filling in the response.
    ///
    /// The response starts as `200 OK` with a default body. Handlers answer
    /// client errors by setting the status themselves.
    ///
    /// # Errors
    ///
    /// Any error is treated as a handler fault: it is logged and the client
    /// receives a generic `500 Internal Server Error`.
    fn handle(
        &mut self,
        request: &Request<Self::RequestBody, Self::Query>,
        response: &mut Response<Self::ResponseBody>,
    ) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawRequest, SharedState, Shared, StateRegistry};
    use http::{Method, StatusCode};

    struct Greeting(String);

    struct Hello {
        greeting: Shared<Greeting>,
    }

    impl Handler<()> for Hello {
        type RequestBody = ();
        type Query = ();
        type ResponseBody = String;
        type State = Shared<Greeting>;

        fn new(_config: Arc<()>, greeting: Shared<Greeting>) -> Self {
            Self { greeting }
        }

        fn handle(
            &mut self,
            request: &Request<(), ()>,
            response: &mut Response<String>,
        ) -> Result<(), HandlerError> {
            if request.path() != "/hello" {
                response.set_status(StatusCode::NOT_FOUND);
                return Ok(());
            }
            response.set_body(self.greeting.0.clone());
            Ok(())
        }
    }

    fn state() -> SharedState {
        let mut registry = StateRegistry::<()>::new();
        registry.register(|_: &()| Some(Greeting("Hello world!".into())));
        registry.initialize(&())
    }

    #[test]
    fn test_default_description() {
        assert_eq!(<Hello as Handler<()>>::DESCRIPTION, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_handler_invocation() {
        let view = <Shared<Greeting>>::from_shared_state(&state()).unwrap();
        let mut handler = Hello::new(Arc::new(()), view);
        let request = Request::from_raw(
            RawRequest::new(Method::GET, "/hello"),
            (),
            (),
            crate::Params::new(),
        );
        let mut response = Response::default();
        handler.handle(&request, &mut response).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "Hello world!");
    }

    #[test]
    fn test_handler_sets_client_error() {
        let view = <Shared<Greeting>>::from_shared_state(&state()).unwrap();
        let mut handler = Hello::new(Arc::new(()), view);
        let request = Request::from_raw(
            RawRequest::new(Method::GET, "/elsewhere"),
            (),
            (),
            crate::Params::new(),
        );
        let mut response = Response::default();
        handler.handle(&request, &mut response).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
