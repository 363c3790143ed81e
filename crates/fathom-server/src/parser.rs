//! Incremental HTTP/1.x request parser.
//!
//! Bytes are fed as they arrive from the socket. The parser keeps whatever
//! follows a complete request in its buffer, so pipelined requests are
//! returned one at a time by calling [`RequestParser::parse`] again.
//!
//! Only `Content-Length` bodies are understood; a request carrying
//! `Transfer-Encoding` is rejected.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};

use crate::error::ParseError;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Size limits applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum size of the request line plus headers, terminator included.
    pub max_header_bytes: usize,
    /// Maximum declared body size.
    pub max_body_bytes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// A fully received request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// Request method.
    pub method: Method,
    /// Request target as sent, query string included.
    pub target: String,
    /// Protocol version.
    pub version: Version,
    /// Header fields in arrival order.
    pub headers: HeaderMap,
    /// Body bytes, exactly `Content-Length` long.
    pub body: Bytes,
}

/// Outcome of a parse attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    /// A request is ready. Bytes after it stay buffered.
    Complete(ParsedRequest),
    /// More bytes are needed.
    Incomplete,
}

#[derive(Debug)]
enum ParseState {
    Head,
    Body { head: Head, length: usize },
}

#[derive(Debug)]
struct Head {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
}

/// Stateful request parser for one connection.
#[derive(Debug)]
pub struct RequestParser {
    limits: ParseLimits,
    buffer: BytesMut,
    state: ParseState,
    // Offset already searched for the head terminator.
    scanned: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(ParseLimits::default())
    }
}

impl RequestParser {
    /// Creates a parser with the given limits.
    #[must_use]
    pub fn new(limits: ParseLimits) -> Self {
        Self {
            limits,
            buffer: BytesMut::with_capacity(8 * 1024),
            state: ParseState::Head,
            scanned: 0,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> ParseLimits {
        self.limits
    }

    /// Number of bytes received but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends bytes without parsing.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Appends bytes and attempts to parse.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the buffered bytes can never form a
    /// valid request.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<ParseStatus, ParseError> {
        self.push(bytes);
        self.parse()
    }

    /// Attempts to parse a request from the bytes already buffered.
    ///
    /// # Errors
    ///
    /// See [`RequestParser::feed`].
    pub fn parse(&mut self) -> Result<ParseStatus, ParseError> {
        loop {
            match std::mem::replace(&mut self.state, ParseState::Head) {
                ParseState::Head => match self.take_head()? {
                    Some(head) => {
                        let length = body_length(&head.headers, self.limits)?;
                        self.state = ParseState::Body { head, length };
                    }
                    None => return Ok(ParseStatus::Incomplete),
                },
                ParseState::Body { head, length } => {
                    if self.buffer.len() < length {
                        self.state = ParseState::Body { head, length };
                        return Ok(ParseStatus::Incomplete);
                    }
                    let body = self.buffer.split_to(length).freeze();
                    return Ok(ParseStatus::Complete(ParsedRequest {
                        method: head.method,
                        target: head.target,
                        version: head.version,
                        headers: head.headers,
                        body,
                    }));
                }
            }
        }
    }

    fn take_head(&mut self) -> Result<Option<Head>, ParseError> {
        // Empty lines before a request line are ignored.
        let mut skipped = 0;
        while self.buffer[skipped..].starts_with(b"\r\n") {
            skipped += 2;
        }
        if skipped > 0 {
            let _ = self.buffer.split_to(skipped);
            self.scanned = self.scanned.saturating_sub(skipped);
        }

        let start = self.scanned.saturating_sub(HEAD_TERMINATOR.len() - 1);
        let found = self.buffer[start..]
            .windows(HEAD_TERMINATOR.len())
            .position(|window| window == HEAD_TERMINATOR)
            .map(|pos| start + pos + HEAD_TERMINATOR.len());

        let Some(end) = found else {
            if self.buffer.len() > self.limits.max_header_bytes {
                return Err(ParseError::HeadersTooLarge {
                    limit: self.limits.max_header_bytes,
                });
            }
            self.scanned = self.buffer.len();
            return Ok(None);
        };

        if end > self.limits.max_header_bytes {
            return Err(ParseError::HeadersTooLarge {
                limit: self.limits.max_header_bytes,
            });
        }

        let raw = self.buffer.split_to(end);
        self.scanned = 0;
        parse_head(&raw[..end - HEAD_TERMINATOR.len()]).map(Some)
    }
}

fn parse_head(raw: &[u8]) -> Result<Head, ParseError> {
    let mut lines = raw
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        let (name, value) = parse_header_line(line)?;
        headers.append(name, value);
    }

    Ok(Head {
        method,
        target,
        version,
        headers,
    })
}

fn parse_request_line(line: &[u8]) -> Result<(Method, String, Version), ParseError> {
    let mut parts = line.split(|&b| b == b' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    let method = Method::from_bytes(method).map_err(|_| ParseError::InvalidMethod)?;

    let target = std::str::from_utf8(target).map_err(|_| ParseError::InvalidRequestLine)?;
    if !(target.starts_with('/') || target == "*") {
        return Err(ParseError::InvalidRequestLine);
    }

    let version = match version {
        b"HTTP/1.1" => Version::HTTP_11,
        b"HTTP/1.0" => Version::HTTP_10,
        other if other.starts_with(b"HTTP/") => return Err(ParseError::UnsupportedVersion),
        _ => return Err(ParseError::InvalidRequestLine),
    };

    Ok((method, target.to_string(), version))
}

fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), ParseError> {
    // Folded continuation lines are obsolete and rejected.
    if line.first().is_some_and(|&b| b == b' ' || b == b'\t') {
        return Err(ParseError::InvalidHeader);
    }
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or(ParseError::InvalidHeader)?;

    let name = HeaderName::from_bytes(&line[..colon]).map_err(|_| ParseError::InvalidHeader)?;
    let value = trim_whitespace(&line[colon + 1..]);
    let value = HeaderValue::from_bytes(value).map_err(|_| ParseError::InvalidHeader)?;
    Ok((name, value))
}

fn trim_whitespace(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

fn body_length(headers: &HeaderMap, limits: ParseLimits) -> Result<usize, ParseError> {
    if headers.contains_key(TRANSFER_ENCODING) {
        return Err(ParseError::UnsupportedTransferEncoding);
    }

    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let text = value
            .to_str()
            .map_err(|_| ParseError::InvalidContentLength)?
            .trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidContentLength);
        }
        let parsed: usize = text.parse().map_err(|_| ParseError::InvalidContentLength)?;
        match length {
            Some(previous) if previous != parsed => return Err(ParseError::InvalidContentLength),
            _ => length = Some(parsed),
        }
    }

    let length = length.unwrap_or(0);
    if length > limits.max_body_bytes {
        return Err(ParseError::BodyTooLarge {
            length,
            limit: limits.max_body_bytes,
        });
    }
    Ok(length)
}
