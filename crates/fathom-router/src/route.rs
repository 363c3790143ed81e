//! Route declarations.
//!
//! A [`RouteTable`] is the ordered list of (pattern, method, handler type)
//! bindings declared at startup. Declaration order is match priority.

use crate::error::{RouterError, RouterResult};
use fathom_core::{
    Body, FieldDescriptor, FromSharedState, Handler, HandlerError, Params, QueryParams,
    RawRequest, RawResponse, Request, Response, Schema, SharedState, StateRequirement,
};
use fathom_telemetry::fields;
use http::Method;
use regex::Regex;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Type-erased entry point into one route's handler type.
type DispatchFn<C> =
    Box<dyn Fn(&Arc<C>, &SharedState, RawRequest, Params) -> Result<RawResponse, HandlerError> + Send + Sync>;

/// Documentation-facing description of a route's bodies and parameters.
#[derive(Debug, Clone)]
pub struct RouteDoc {
    /// Request body shape, if structured.
    pub request_body: Option<Schema>,
    /// Request body content type.
    pub request_content_type: Option<&'static str>,
    /// Response body shape, if structured.
    pub response_body: Option<Schema>,
    /// Response body content type.
    pub response_content_type: Option<&'static str>,
    /// Query string fields.
    pub query: &'static [FieldDescriptor],
    /// Named capture groups of the path pattern.
    pub captures: Vec<String>,
}

/// One immutable route.
pub struct Route<C> {
    pattern: String,
    method: Method,
    regex: Regex,
    handler: &'static str,
    description: &'static str,
    requirements: Vec<StateRequirement>,
    doc: RouteDoc,
    invoke: DispatchFn<C>,
}

impl<C: Send + Sync + 'static> Route<C> {
    /// Creates a route bound to handler type `H`.
    ///
    /// The pattern must match the whole path; it is anchored automatically.
    pub fn new<H: Handler<C>>(pattern: &str, method: Method) -> RouterResult<Self> {
        let regex = compile(pattern).map_err(|source| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;
        Ok(Self::with_regex::<H>(pattern, method, regex))
    }

    fn with_regex<H: Handler<C>>(pattern: &str, method: Method, regex: Regex) -> Self {
        let captures = regex.capture_names().flatten().map(str::to_string).collect();

        Self {
            pattern: pattern.to_string(),
            method,
            regex,
            handler: type_name::<H>(),
            description: H::DESCRIPTION,
            requirements: H::State::requirements(),
            doc: RouteDoc {
                request_body: H::RequestBody::schema(),
                request_content_type: H::RequestBody::CONTENT_TYPE,
                response_body: H::ResponseBody::schema(),
                response_content_type: H::ResponseBody::CONTENT_TYPE,
                query: H::Query::fields(),
                captures,
            },
            invoke: Box::new(invoke::<C, H>),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

impl<C> Route<C> {
    /// Returns the pattern as declared.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the handler type name.
    pub fn handler_name(&self) -> &'static str {
        self.handler
    }

    /// Returns the handler description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Returns the shared-state types the handler needs.
    pub fn requirements(&self) -> &[StateRequirement] {
        &self.requirements
    }

    /// Returns the documentation metadata.
    pub fn doc(&self) -> &RouteDoc {
        &self.doc
    }

    /// Matches a request against this route.
    ///
    /// The method is compared first; the path is only tested when the
    /// method agrees. Returns the named captures on a match.
    pub fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        if self.method != *method {
            return None;
        }
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                params.push(name, value.as_str());
            }
        }
        Some(params)
    }

    /// Runs the handler for a matched request.
    pub(crate) fn call(
        &self,
        config: &Arc<C>,
        state: &SharedState,
        request: RawRequest,
        params: Params,
    ) -> Result<RawResponse, HandlerError> {
        (self.invoke)(config, state, request, params)
    }
}

impl<C> fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

/// Decodes, constructs, invokes and encodes for handler type `H`.
fn invoke<C, H>(
    config: &Arc<C>,
    state: &SharedState,
    raw: RawRequest,
    params: Params,
) -> Result<RawResponse, HandlerError>
where
    C: Send + Sync + 'static,
    H: Handler<C>,
{
    let body = match H::RequestBody::decode(&raw.body) {
        Ok(body) => body,
        Err(err) => {
            debug!({ fields::ERROR } = %err, "Request body rejected");
            return Ok(bad_request(&err));
        }
    };
    let query = match H::Query::from_query(raw.query.as_deref()) {
        Ok(query) => query,
        Err(err) => {
            debug!({ fields::ERROR } = %err, "Query string rejected");
            return Ok(bad_request(&err));
        }
    };

    let view = H::State::from_shared_state(state)?;
    let mut handler = H::new(Arc::clone(config), view);

    let request = Request::from_raw(raw, body, query, params);
    let mut response = Response::<H::ResponseBody>::default();

    info!({ fields::DESCRIPTION } = H::DESCRIPTION, "Calling a handler");
    handler.handle(&request, &mut response)?;

    Ok(response.into_raw())
}

fn bad_request(err: &fathom_core::DecodeError) -> RawResponse {
    RawResponse::text(err.status_code(), format!("Bad request: {err}"))
}

/// Ordered list of routes declared at startup.
///
/// # Example
///
/// ```rust
/// use fathom_router::RouteTable;
/// use fathom_core::{Handler, HandlerError, Request, Response};
/// use http::Method;
/// use std::sync::Arc;
///
/// struct Hello;
///
/// impl Handler<()> for Hello {
///     type RequestBody = ();
///     type Query = ();
///     type ResponseBody = String;
///     type State = ();
///
///     fn new(_config: Arc<()>, _state: ()) -> Self {
///         Hello
///     }
///
///     fn handle(&mut self, _req: &Request<()>, resp: &mut Response<String>) -> Result<(), HandlerError> {
///         resp.set_body("Hello world!".into());
///         Ok(())
///     }
/// }
///
/// let table = RouteTable::<()>::new()
///     .get::<Hello>("/hello")
///     .route::<Hello>("/greet/(?<name>[a-z]+)", Method::GET);
/// assert_eq!(table.len(), 2);
/// ```
pub struct RouteTable<C> {
    routes: Vec<Route<C>>,
    invalid: Option<(String, regex::Error)>,
}

impl<C> Default for RouteTable<C> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            invalid: None,
        }
    }
}

impl<C: Send + Sync + 'static> RouteTable<C> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route.
    ///
    /// An invalid pattern is reported when the router is built.
    #[must_use]
    pub fn route<H: Handler<C>>(mut self, pattern: &str, method: Method) -> Self {
        match compile(pattern) {
            Ok(regex) => self
                .routes
                .push(Route::with_regex::<H>(pattern, method, regex)),
            Err(source) => {
                self.invalid.get_or_insert((pattern.to_string(), source));
            }
        }
        self
    }

    /// Appends a `GET` route.
    #[must_use]
    pub fn get<H: Handler<C>>(self, pattern: &str) -> Self {
        self.route::<H>(pattern, Method::GET)
    }

    /// Appends a `POST` route.
    #[must_use]
    pub fn post<H: Handler<C>>(self, pattern: &str) -> Self {
        self.route::<H>(pattern, Method::POST)
    }

    /// Appends a `PUT` route.
    #[must_use]
    pub fn put<H: Handler<C>>(self, pattern: &str) -> Self {
        self.route::<H>(pattern, Method::PUT)
    }

    /// Appends a `PATCH` route.
    #[must_use]
    pub fn patch<H: Handler<C>>(self, pattern: &str) -> Self {
        self.route::<H>(pattern, Method::PATCH)
    }

    /// Appends a `DELETE` route.
    #[must_use]
    pub fn delete<H: Handler<C>>(self, pattern: &str) -> Self {
        self.route::<H>(pattern, Method::DELETE)
    }
}

impl<C> RouteTable<C> {
    /// Returns the routes in priority order.
    pub fn routes(&self) -> &[Route<C>] {
        &self.routes
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are declared.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Checks every route's shared-state requirements against `state`.
    ///
    /// Also reports the first invalid pattern, if any.
    pub fn validate(&self, state: &SharedState) -> RouterResult<()> {
        if let Some((pattern, source)) = &self.invalid {
            return Err(RouterError::InvalidPattern {
                pattern: pattern.clone(),
                source: Box::new(source.clone()),
            });
        }
        for route in &self.routes {
            for requirement in &route.requirements {
                state
                    .check(requirement)
                    .map_err(|source| RouterError::MissingState {
                        method: route.method.clone(),
                        pattern: route.pattern.clone(),
                        handler: route.handler,
                        source,
                    })?;
            }
        }
        Ok(())
    }

    pub(crate) fn into_routes(self) -> RouterResult<Vec<Route<C>>> {
        match self.invalid {
            Some((pattern, source)) => Err(RouterError::InvalidPattern {
                pattern,
                source: Box::new(source),
            }),
            None => Ok(self.routes),
        }
    }
}

impl<C> fmt::Debug for RouteTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Static;

    impl Handler<()> for Static {
        type RequestBody = ();
        type Query = ();
        type ResponseBody = String;
        type State = ();

        const DESCRIPTION: &'static str = "Serves files";

        fn new(_config: Arc<()>, _state: ()) -> Self {
            Static
        }

        fn handle(
            &mut self,
            request: &Request<()>,
            response: &mut Response<String>,
        ) -> Result<(), HandlerError> {
            response.set_body(request.param("path").unwrap_or_default().to_string());
            Ok(())
        }
    }

    #[test]
    fn test_route_metadata() {
        let route = Route::<()>::new::<Static>("/static/(?<path>.*)", Method::GET).unwrap();
        assert_eq!(route.pattern(), "/static/(?<path>.*)");
        assert_eq!(route.method(), Method::GET);
        assert_eq!(route.description(), "Serves files");
        assert!(route.handler_name().ends_with("Static"));
        assert_eq!(route.doc().captures, vec!["path".to_string()]);
        assert_eq!(route.doc().response_content_type, Some("text/plain; charset=utf-8"));
        assert!(route.requirements().is_empty());
    }

    #[test]
    fn test_matches_full_path_only() {
        let route = Route::<()>::new::<Static>("/echo", Method::POST).unwrap();
        assert!(route.matches(&Method::POST, "/echo").is_some());
        assert!(route.matches(&Method::POST, "/echo/more").is_none());
        assert!(route.matches(&Method::POST, "/x/echo").is_none());
        assert!(route.matches(&Method::GET, "/echo").is_none());
    }

    #[test]
    fn test_matches_alternation_is_anchored() {
        let route = Route::<()>::new::<Static>("/a|/b", Method::GET).unwrap();
        assert!(route.matches(&Method::GET, "/a").is_some());
        assert!(route.matches(&Method::GET, "/b").is_some());
        assert!(route.matches(&Method::GET, "/ab").is_none());
        assert!(route.matches(&Method::GET, "x/b").is_none());
    }

    #[test]
    fn test_matches_binds_named_groups() {
        let route = Route::<()>::new::<Static>(
            "/users/(?<id>[0-9]+)/files/(?<path>.*)",
            Method::GET,
        )
        .unwrap();
        let params = route.matches(&Method::GET, "/users/42/files/a/b.txt").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("path"), Some("a/b.txt"));
    }

    #[test]
    fn test_invalid_pattern_deferred() {
        let table = RouteTable::<()>::new()
            .get::<Static>("/ok")
            .get::<Static>("/broken(");
        assert_eq!(table.len(), 1);
        let err = table.validate(&SharedState::new()).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { .. }));
        assert!(table.into_routes().is_err());
    }
}
