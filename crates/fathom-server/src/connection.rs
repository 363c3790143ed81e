//! Per-connection request loop.
//!
//! A connection reads into a fixed buffer, feeds the parser, dispatches each
//! complete request synchronously, writes the response and then either
//! parses the next buffered request or waits for more bytes. Only the wait
//! for the first bytes of a follow-up request is bounded by the keep-alive
//! timeout.

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fathom_core::{Cookies, RawRequest, RawResponse};
use fathom_router::{Dispatch, Router};
use fathom_telemetry::fields;
use http::header::CONNECTION;
use http::{HeaderMap, HeaderValue, Method, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::error::ParseError;
use crate::parser::{ParseLimits, ParseStatus, ParsedRequest, RequestParser};
use crate::response::{encode_response, requests_close, WriteOptions};

/// Size of the socket read buffer.
pub const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Connection behavior shared by every connection of a server.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Idle wait allowed between requests.
    pub keep_alive_timeout: Duration,
    /// Default `Server` header.
    pub server_header: HeaderValue,
    /// Parser limits.
    pub limits: ParseLimits,
    /// Whether HTTP/1.0 clients may keep the connection open.
    pub http10_keep_alive: bool,
}

/// What the loop does after a response has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persistence {
    KeepAlive,
    Close,
}

/// Serves requests on one accepted stream until it closes.
pub struct Connection<C, S> {
    stream: S,
    remote_addr: Option<SocketAddr>,
    router: Arc<Router<C>>,
    settings: Arc<ConnectionSettings>,
    parser: RequestParser,
}

impl<C, S> Connection<C, S>
where
    C: Send + Sync + 'static,
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an accepted stream.
    pub fn new(
        stream: S,
        remote_addr: Option<SocketAddr>,
        router: Arc<Router<C>>,
        settings: Arc<ConnectionSettings>,
    ) -> Self {
        let parser = RequestParser::new(settings.limits);
        Self {
            stream,
            remote_addr,
            router,
            settings,
            parser,
        }
    }

    /// Runs the request loop and shuts the stream down when it ends.
    pub async fn run(mut self) {
        self.serve().await;
        if let Err(err) = self.stream.shutdown().await {
            debug!({ fields::ERROR } = %err, "Error shutting down connection");
        }
        debug!("Connection closed");
    }

    async fn serve(&mut self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        // Armed after a response, disarmed by the next bytes received.
        let mut idle = false;

        loop {
            match self.parser.parse() {
                Ok(ParseStatus::Complete(request)) => {
                    match self.respond(request).await {
                        Ok(Persistence::KeepAlive) => {
                            idle = true;
                            continue;
                        }
                        Ok(Persistence::Close) => return,
                        Err(err) => {
                            debug!({ fields::ERROR } = %err, "Failed to write response");
                            return;
                        }
                    }
                }
                Ok(ParseStatus::Incomplete) => {}
                Err(err) => {
                    self.reject(&err).await;
                    return;
                }
            }

            let read = if idle {
                match tokio::time::timeout(
                    self.settings.keep_alive_timeout,
                    self.stream.read(&mut buf),
                )
                .await
                {
                    Ok(read) => read,
                    Err(_) => {
                        debug!("Keep-alive timeout expired");
                        return;
                    }
                }
            } else {
                self.stream.read(&mut buf).await
            };

            match read {
                Ok(0) => {
                    if self.parser.buffered() > 0 {
                        debug!(
                            buffered = self.parser.buffered(),
                            "Peer closed mid-request"
                        );
                    }
                    return;
                }
                Ok(n) => {
                    idle = false;
                    self.parser.push(&buf[..n]);
                }
                Err(err) => {
                    debug!({ fields::ERROR } = %err, "Read failed");
                    return;
                }
            }
        }
    }

    async fn respond(&mut self, parsed: ParsedRequest) -> std::io::Result<Persistence> {
        let started = Instant::now();
        let method = parsed.method.clone();
        let keep_alive = wants_keep_alive(
            parsed.version,
            &parsed.headers,
            self.settings.http10_keep_alive,
        );
        let announce_keep_alive = keep_alive && parsed.version == Version::HTTP_10;

        let request = self.build_request(parsed);
        let path = request.path.clone();
        let response = dispatch_guarded(&self.router, request);

        let persistence = if keep_alive && !requests_close(&response) {
            Persistence::KeepAlive
        } else {
            Persistence::Close
        };

        let wire = encode_response(
            &response,
            &WriteOptions {
                server_header: &self.settings.server_header,
                close: persistence == Persistence::Close,
                announce_keep_alive,
                method: &method,
            },
        );
        self.stream.write_all(&wire).await?;
        self.stream.flush().await?;

        info!(
            { fields::HTTP_METHOD } = %method,
            { fields::HTTP_PATH } = %path,
            { fields::HTTP_STATUS } = response.status.as_u16(),
            { fields::DURATION_MS } = started.elapsed().as_secs_f64() * 1000.0,
            "Request completed"
        );
        Ok(persistence)
    }

    fn build_request(&self, parsed: ParsedRequest) -> RawRequest {
        let mut request = RawRequest::new(parsed.method, &parsed.target);
        request.version = parsed.version;
        request.cookies = Cookies::from_headers(&parsed.headers);
        request.headers = parsed.headers;
        request.body = parsed.body;
        request.remote_addr = self.remote_addr;
        request
    }

    async fn reject(&mut self, err: &ParseError) {
        warn!(
            { fields::ERROR } = %err,
            { fields::HTTP_STATUS } = err.status_code().as_u16(),
            "Rejecting malformed request"
        );
        let response = RawResponse::text(err.status_code(), err.to_string());
        let wire = encode_response(
            &response,
            &WriteOptions {
                server_header: &self.settings.server_header,
                close: true,
                announce_keep_alive: false,
                method: &Method::GET,
            },
        );
        // Best effort: the peer may already be gone.
        if self.stream.write_all(&wire).await.is_ok() {
            let _ = self.stream.flush().await;
        }
    }
}

/// Dispatches a request, converting handler errors and panics into a 500.
fn dispatch_guarded<C: Send + Sync + 'static>(router: &Router<C>, request: RawRequest) -> RawResponse {
    match panic::catch_unwind(AssertUnwindSafe(|| router.dispatch(request))) {
        Ok(Ok(Dispatch::Handled(response))) => response,
        Ok(Ok(Dispatch::NotFound)) => RawResponse::not_found(),
        Ok(Err(err)) => {
            error!({ fields::ERROR } = %err, "Handler failed");
            RawResponse::internal_error()
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!({ fields::ERROR } = %message, "Handler panicked");
            RawResponse::internal_error()
        }
    }
}

/// Decides whether the connection may stay open after this request.
///
/// HTTP/1.1 persists unless the client sends `Connection: close`. HTTP/1.0
/// persists only when enabled and the client asks for `keep-alive`.
fn wants_keep_alive(version: Version, headers: &HeaderMap, http10_keep_alive: bool) -> bool {
    let has_token = |token: &str| {
        headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    };

    if has_token("close") {
        return false;
    }
    match version {
        Version::HTTP_11 => true,
        Version::HTTP_10 => http10_keep_alive && has_token("keep-alive"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_core::{
        Handler, HandlerError, Json, Record, Request, Response, SharedState, StatusCode,
    };
    use fathom_router::RouteTable;
    use serde_json::json;
    use tokio::io::{duplex, DuplexStream};

    #[derive(Debug, Clone, Default, PartialEq, Record)]
    struct Echo {
        message: String,
    }

    struct EchoHandler;

    impl Handler<()> for EchoHandler {
        type RequestBody = Json<Echo>;
        type Query = ();
        type ResponseBody = Json<Echo>;
        type State = ();

        fn new(_config: Arc<()>, _state: ()) -> Self {
            Self
        }

        fn handle(
            &mut self,
            request: &Request<Self::RequestBody, Self::Query>,
            response: &mut Response<Self::ResponseBody>,
        ) -> Result<(), HandlerError> {
            response.body_mut().message = request.body().message.clone();
            Ok(())
        }
    }

    struct Panicking;

    impl Handler<()> for Panicking {
        type RequestBody = String;
        type Query = ();
        type ResponseBody = String;
        type State = ();

        fn new(_config: Arc<()>, _state: ()) -> Self {
            Self
        }

        fn handle(
            &mut self,
            _request: &Request<Self::RequestBody, Self::Query>,
            _response: &mut Response<Self::ResponseBody>,
        ) -> Result<(), HandlerError> {
            panic!("boom");
        }
    }

    struct SessionCookie;

    impl Handler<()> for SessionCookie {
        type RequestBody = String;
        type Query = ();
        type ResponseBody = String;
        type State = ();

        fn new(_config: Arc<()>, _state: ()) -> Self {
            Self
        }

        fn handle(
            &mut self,
            request: &Request<Self::RequestBody, Self::Query>,
            response: &mut Response<Self::ResponseBody>,
        ) -> Result<(), HandlerError> {
            *response.body_mut() = format!(
                "sid={} cookies={}",
                request.cookie("sid").unwrap_or("-"),
                request.cookies().len()
            );
            Ok(())
        }
    }

    fn router() -> Arc<Router<()>> {
        let table = RouteTable::new()
            .post::<EchoHandler>("/echo")
            .get::<Panicking>("/panic")
            .get::<SessionCookie>("/session");
        Arc::new(Router::new(table, Arc::new(()), Arc::new(SharedState::new())).unwrap())
    }

    fn settings(keep_alive: Duration) -> Arc<ConnectionSettings> {
        Arc::new(ConnectionSettings {
            keep_alive_timeout: keep_alive,
            server_header: HeaderValue::from_static("fathom-test"),
            limits: ParseLimits::default(),
            http10_keep_alive: false,
        })
    }

    fn spawn_connection(keep_alive: Duration) -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = duplex(64 * 1024);
        let connection = Connection::new(server, None, router(), settings(keep_alive));
        (client, tokio::spawn(connection.run()))
    }

    async fn read_all(client: &mut DuplexStream) -> String {
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_echo_and_not_found() {
        let (mut client, task) = spawn_connection(Duration::from_secs(5));
        let body = json!({"message": "hi"}).to_string();
        let request = format!(
            "POST /echo HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}GET /echo HTTP/1.1\r\nConnection: close\r\n\r\n",
            body.len(),
            body
        );
        client.write_all(request.as_bytes()).await.unwrap();

        let wire = read_all(&mut client).await;
        task.await.unwrap();

        let first = wire.find("HTTP/1.1 200 OK").unwrap();
        let second = wire.find("HTTP/1.1 404 Not Found").unwrap();
        assert!(first < second);
        assert!(wire.contains(r#"{"message":"hi"}"#));
        assert!(wire.contains("server: fathom-test\r\n"));
        assert!(wire.ends_with("Not found"));
    }

    #[tokio::test]
    async fn test_cookie_header_reaches_handler() {
        let (mut client, task) = spawn_connection(Duration::from_secs(5));
        client
            .write_all(
                b"GET /session HTTP/1.1\r\nCookie: sid=\"abc\"; x=1\r\n\r\n\
                  GET /session HTTP/1.1\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let wire = read_all(&mut client).await;
        task.await.unwrap();

        let first = wire.find("sid=abc cookies=2").unwrap();
        let second = wire.find("sid=- cookies=0").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_bad_body_is_400() {
        let (mut client, task) = spawn_connection(Duration::from_secs(5));
        client
            .write_all(b"POST /echo HTTP/1.1\r\nConnection: close\r\nContent-Length: 3\r\n\r\n{x}")
            .await
            .unwrap();
        let wire = read_all(&mut client).await;
        task.await.unwrap();
        assert!(wire.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_500_and_connection_survives() {
        let (mut client, task) = spawn_connection(Duration::from_secs(5));
        client
            .write_all(b"GET /panic HTTP/1.1\r\n\r\nGET /missing HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let wire = read_all(&mut client).await;
        task.await.unwrap();
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(wire.contains("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_and_close() {
        let (mut client, task) = spawn_connection(Duration::from_secs(5));
        client
            .write_all(b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        let wire = read_all(&mut client).await;
        task.await.unwrap();
        assert!(wire.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
        assert!(wire.contains("connection: close\r\n"));
    }

    #[tokio::test]
    async fn test_idle_connection_times_out() {
        let (mut client, task) = spawn_connection(Duration::from_millis(50));
        client
            .write_all(b"GET /missing HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let wire = tokio::time::timeout(Duration::from_secs(2), read_all(&mut client))
            .await
            .expect("connection should close after the keep-alive timeout");
        task.await.unwrap();
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(!wire.contains("connection: close"));
    }

    #[tokio::test]
    async fn test_http10_closes_by_default() {
        let (mut client, task) = spawn_connection(Duration::from_secs(5));
        client
            .write_all(b"GET /missing HTTP/1.0\r\nConnection: keep-alive\r\n\r\n")
            .await
            .unwrap();
        let wire = read_all(&mut client).await;
        task.await.unwrap();
        assert!(wire.contains("connection: close\r\n"));
    }

    #[tokio::test]
    async fn test_exact_wire_format() {
        let stream = tokio_test::io::Builder::new()
            .read(b"GET /missing HTTP/1.1\r\nConnection: close\r\n\r\n")
            .write(
                b"HTTP/1.1 404 Not Found\r\n\
                  content-type: text/plain; charset=utf-8\r\n\
                  server: fathom-test\r\n\
                  connection: close\r\n\
                  content-length: 9\r\n\
                  \r\n\
                  Not found",
            )
            .build();
        Connection::new(stream, None, router(), settings(Duration::from_secs(5)))
            .run()
            .await;
    }

    #[test]
    fn test_wants_keep_alive_rules() {
        let mut headers = HeaderMap::new();
        assert!(wants_keep_alive(Version::HTTP_11, &headers, false));
        assert!(!wants_keep_alive(Version::HTTP_10, &headers, true));

        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        assert!(!wants_keep_alive(Version::HTTP_10, &headers, false));
        assert!(wants_keep_alive(Version::HTTP_10, &headers, true));

        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        assert!(!wants_keep_alive(Version::HTTP_11, &headers, false));
    }

    #[test]
    fn test_dispatch_guarded_maps_miss_to_404() {
        let router = router();
        let response = dispatch_guarded(&router, RawRequest::new(Method::GET, "/nope"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}
