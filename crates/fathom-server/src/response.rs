//! Response serialization.

use bytes::{BufMut, BytesMut};
use fathom_core::RawResponse;
use http::header::{CONNECTION, CONTENT_LENGTH, SERVER};
use http::{HeaderValue, Method};

/// Per-response framing decided by the connection.
#[derive(Debug, Clone)]
pub struct WriteOptions<'a> {
    /// Value for the `Server` header when the handler did not set one.
    pub server_header: &'a HeaderValue,
    /// Whether the connection closes after this response.
    pub close: bool,
    /// Whether to advertise `Connection: keep-alive` (HTTP/1.0 clients).
    pub announce_keep_alive: bool,
    /// Request method; `HEAD` responses carry no body.
    pub method: &'a Method,
}

/// Serializes a response as an HTTP/1.1 message.
///
/// `Content-Length` always reflects the body actually produced, whatever the
/// handler set.
#[must_use]
pub fn encode_response(response: &RawResponse, options: &WriteOptions<'_>) -> BytesMut {
    let mut out = BytesMut::with_capacity(256 + response.body.len());

    out.put_slice(b"HTTP/1.1 ");
    out.put_slice(response.status.as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(
        response
            .status
            .canonical_reason()
            .unwrap_or("Unknown")
            .as_bytes(),
    );
    out.put_slice(b"\r\n");

    for (name, value) in &response.headers {
        if *name == CONTENT_LENGTH || *name == CONNECTION {
            continue;
        }
        put_header(&mut out, name.as_str().as_bytes(), value.as_bytes());
    }

    if !response.headers.contains_key(SERVER) {
        put_header(&mut out, b"server", options.server_header.as_bytes());
    }
    if options.close {
        put_header(&mut out, b"connection", b"close");
    } else if options.announce_keep_alive {
        put_header(&mut out, b"connection", b"keep-alive");
    }
    put_header(
        &mut out,
        b"content-length",
        response.body.len().to_string().as_bytes(),
    );

    out.put_slice(b"\r\n");
    if *options.method != Method::HEAD {
        out.put_slice(&response.body);
    }
    out
}

/// Whether the handler asked for the connection to be closed.
#[must_use]
pub fn requests_close(response: &RawResponse) -> bool {
    response
        .headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("close"))
}

fn put_header(out: &mut BytesMut, name: &[u8], value: &[u8]) {
    out.put_slice(name);
    out.put_slice(b": ");
    out.put_slice(value);
    out.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn options<'a>(server: &'a HeaderValue, method: &'a Method, close: bool) -> WriteOptions<'a> {
        WriteOptions {
            server_header: server,
            close,
            announce_keep_alive: false,
            method,
        }
    }

    fn encode(response: &RawResponse, options: &WriteOptions<'_>) -> String {
        String::from_utf8(encode_response(response, options).to_vec()).unwrap()
    }

    #[test]
    fn test_status_line_and_headers() {
        let server = HeaderValue::from_static("fathom/test");
        let response = RawResponse::text(StatusCode::OK, "hi");
        let wire = encode(&response, &options(&server, &Method::GET, false));

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("content-type: text/plain; charset=utf-8\r\n"));
        assert!(wire.contains("server: fathom/test\r\n"));
        assert!(wire.contains("content-length: 2\r\n"));
        assert!(!wire.contains("connection:"));
        assert!(wire.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn test_content_length_is_overwritten() {
        let server = HeaderValue::from_static("s");
        let mut response = RawResponse::text(StatusCode::OK, "four");
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("999"));
        let wire = encode(&response, &options(&server, &Method::GET, false));
        assert!(wire.contains("content-length: 4\r\n"));
        assert!(!wire.contains("999"));
    }

    #[test]
    fn test_close_and_handler_server_header() {
        let server = HeaderValue::from_static("default");
        let mut response = RawResponse::new(StatusCode::NO_CONTENT);
        response
            .headers
            .insert(SERVER, HeaderValue::from_static("custom"));
        let wire = encode(&response, &options(&server, &Method::GET, true));
        assert!(wire.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(wire.contains("server: custom\r\n"));
        assert!(!wire.contains("default"));
        assert!(wire.contains("connection: close\r\n"));
    }

    #[test]
    fn test_head_omits_body() {
        let server = HeaderValue::from_static("s");
        let response = RawResponse::text(StatusCode::OK, "body");
        let wire = encode(&response, &options(&server, &Method::HEAD, false));
        assert!(wire.contains("content-length: 4\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_keep_alive_announcement() {
        let server = HeaderValue::from_static("s");
        let mut opts = options(&server, &Method::GET, false);
        opts.announce_keep_alive = true;
        let wire = encode(&RawResponse::new(StatusCode::OK), &opts);
        assert!(wire.contains("connection: keep-alive\r\n"));
    }

    #[test]
    fn test_requests_close() {
        let mut response = RawResponse::new(StatusCode::OK);
        assert!(!requests_close(&response));
        response
            .headers
            .insert(CONNECTION, HeaderValue::from_static("Upgrade, Close"));
        assert!(requests_close(&response));
    }
}
