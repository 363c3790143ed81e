//! Request and response messages.
//!
//! The connection engine and the router exchange untyped [`RawRequest`] /
//! [`RawResponse`] values; handlers see typed [`Request`] / [`Response`]
//! values whose bodies have already been decoded.

use crate::{Body, Cookies, Params};
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use std::net::SocketAddr;

/// A parsed request as produced by the connection engine.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Request method.
    pub method: Method,
    /// Path component of the request target, without the query string.
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    /// Protocol version from the request line.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw request body.
    pub body: Bytes,
    /// Cookies parsed from the `Cookie` header.
    pub cookies: Cookies,
    /// Peer address of the connection.
    pub remote_addr: Option<SocketAddr>,
}

impl RawRequest {
    /// Creates a request with no headers and an empty body.
    ///
    /// A `?` in `target` splits off the query string.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            cookies: Cookies::new(),
            remote_addr: None,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// A response ready to be written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a response with the given status and no body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a plain text response with `Content-Length` set.
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.body = body.into();
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.set_content_length();
        response
    }

    /// The 404 sent when no route matches.
    #[must_use]
    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "Not found")
    }

    /// The 500 sent when a handler fails.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    /// Overwrites `Content-Length` with the current body length.
    pub fn set_content_length(&mut self) {
        self.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
    }
}

/// A request as seen by a handler.
///
/// `B` is the decoded body type and `Q` the decoded query type.
#[derive(Debug)]
pub struct Request<B, Q = ()> {
    method: Method,
    path: String,
    version: Version,
    headers: HeaderMap,
    body: B,
    query: Q,
    params: Params,
    cookies: Cookies,
    remote_addr: Option<SocketAddr>,
}

impl<B, Q> Request<B, Q> {
    /// Builds a typed request from a raw request and its decoded parts.
    #[must_use]
    pub fn from_raw(raw: RawRequest, body: B, query: Q, params: Params) -> Self {
        Self {
            method: raw.method,
            path: raw.path,
            version: raw.version,
            headers: raw.headers,
            body,
            query,
            params,
            cookies: raw.cookies,
            remote_addr: raw.remote_addr,
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as text, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the decoded body.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Returns the decoded query parameters.
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Returns the route's named captures.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns one named capture.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns the cookie jar.
    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    /// Returns one cookie value.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }

    /// Returns the peer address.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// A response being built by a handler.
///
/// Starts as `200 OK` with a default body.
#[derive(Debug)]
pub struct Response<B> {
    status: StatusCode,
    headers: HeaderMap,
    body: B,
}

impl<B: Default> Default for Response<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B> Response<B> {
    /// Creates a `200 OK` response with the given body.
    #[must_use]
    pub fn new(body: B) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header, replacing any previous value.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns the body.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Returns the body for modification.
    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: B) {
        self.body = body;
    }
}

impl<B: Body> Response<B> {
    /// Encodes the body and finalizes the headers.
    ///
    /// `Content-Type` is defaulted from the body type when the handler did
    /// not set one. `Content-Length` is always recomputed.
    #[must_use]
    pub fn into_raw(self) -> RawResponse {
        let mut raw = RawResponse {
            status: self.status,
            headers: self.headers,
            body: self.body.encode(),
        };
        if !raw.headers.contains_key(CONTENT_TYPE) {
            if let Some(content_type) = B::CONTENT_TYPE {
                raw.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }
        raw.set_content_length();
        raw
    }
}
