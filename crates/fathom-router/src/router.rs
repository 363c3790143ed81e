//! First-match dispatch over a validated route table.

use crate::error::RouterResult;
use crate::route::{Route, RouteTable};
use fathom_core::{HandlerError, Params, RawRequest, RawResponse, SharedState};
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A route matched and its handler produced a response.
    Handled(RawResponse),
    /// No route matched; the caller answers with a 404.
    NotFound,
}

impl Dispatch {
    /// Returns `true` if a route matched.
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    /// Converts into a response, substituting a 404 for a miss.
    pub fn into_response(self) -> RawResponse {
        match self {
            Self::Handled(response) => response,
            Self::NotFound => RawResponse::not_found(),
        }
    }
}

/// Routes requests to typed handlers.
///
/// Construction checks that every route's shared-state requirements are met,
/// so a handler asking for a service that was never provided is reported
/// before the server starts.
pub struct Router<C> {
    routes: Vec<Route<C>>,
    config: Arc<C>,
    state: Arc<SharedState>,
}

impl<C: Send + Sync + 'static> Router<C> {
    /// Validates a route table against the shared state and builds the router.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`](crate::RouterError::InvalidPattern) for a bad
    /// pattern and [`RouterError::MissingState`](crate::RouterError::MissingState) when a
    /// handler needs a service that is absent.
    pub fn new(table: RouteTable<C>, config: Arc<C>, state: Arc<SharedState>) -> RouterResult<Self> {
        table.validate(&state)?;
        let routes = table.into_routes()?;
        debug!(routes = routes.len(), services = state.len(), "Router built");
        Ok(Self {
            routes,
            config,
            state,
        })
    }

    /// Dispatches a request to the first matching route.
    ///
    /// Routes are tried in declaration order; the method is compared before
    /// the path. Decode failures become 400 responses here. Handler errors
    /// are returned to the caller, which answers with a 500.
    pub fn dispatch(&self, request: RawRequest) -> Result<Dispatch, HandlerError> {
        let Some((index, params)) = self.match_route(&request.method, &request.path) else {
            debug!(method = %request.method, path = %request.path, "No route matched");
            return Ok(Dispatch::NotFound);
        };

        let route = &self.routes[index];
        debug!(
            method = %request.method,
            path = %request.path,
            pattern = route.pattern(),
            handler = route.handler_name(),
            "Route matched"
        );
        route
            .call(&self.config, &self.state, request, params)
            .map(Dispatch::Handled)
    }

    /// Finds the first route matching `method` and `path`.
    ///
    /// Returns the route's index in declaration order and its captures.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<(usize, Params)> {
        self.routes
            .iter()
            .enumerate()
            .find_map(|(index, route)| route.matches(method, path).map(|params| (index, params)))
    }
}

impl<C> Router<C> {
    /// Returns the routes in priority order.
    pub fn routes(&self) -> &[Route<C>] {
        &self.routes
    }

    /// Returns the application configuration.
    pub fn config(&self) -> &Arc<C> {
        &self.config
    }

    /// Returns the shared state.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
