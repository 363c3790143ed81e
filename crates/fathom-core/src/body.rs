//! Request and response body conversions.
//!
//! A handler declares its body types through [`Body`]:
//!
//! - `String` - plain text, passed through without touching the codec
//! - [`Json<R>`] - a record encoded as a single JSON object
//! - `()` - no body; incoming bytes are ignored and nothing is written

use crate::{codec, DecodeError, Record, Schema};
use bytes::Bytes;
use std::ops::{Deref, DerefMut};

/// A type that can be produced from, and turned into, raw body bytes.
pub trait Body: Sized + Send + 'static {
    /// Content type written when the handler does not set one.
    const CONTENT_TYPE: Option<&'static str>;

    /// Converts raw request bytes into this body type.
    fn decode(raw: &Bytes) -> Result<Self, DecodeError>;

    /// Converts this body into raw response bytes.
    fn encode(self) -> Bytes;

    /// Shape of the body, if it is structured.
    fn schema() -> Option<Schema> {
        None
    }
}

impl Body for String {
    const CONTENT_TYPE: Option<&'static str> = Some("text/plain; charset=utf-8");

    fn decode(raw: &Bytes) -> Result<Self, DecodeError> {
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn encode(self) -> Bytes {
        Bytes::from(self)
    }

    fn schema() -> Option<Schema> {
        Some(Schema::String)
    }
}

impl Body for () {
    const CONTENT_TYPE: Option<&'static str> = None;

    fn decode(_raw: &Bytes) -> Result<Self, DecodeError> {
        Ok(())
    }

    fn encode(self) -> Bytes {
        Bytes::new()
    }
}

/// A record carried as a JSON object body.
///
/// # Example
///
/// ```rust
/// use fathom_core::{Body, Json, Record};
/// use bytes::Bytes;
///
/// #[derive(Debug, Default, Record)]
/// struct Echo {
///     echo: String,
/// }
///
/// let body = Json::<Echo>::decode(&Bytes::from_static(br#"{"echo":"hi"}"#)).unwrap();
/// assert_eq!(body.echo, "hi");
/// assert_eq!(body.encode(), Bytes::from_static(br#"{"echo":"hi"}"#));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<R>(pub R);

impl<R> Json<R> {
    /// Consumes the wrapper, returning the record.
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R> Deref for Json<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<R> DerefMut for Json<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<R> From<R> for Json<R> {
    fn from(record: R) -> Self {
        Self(record)
    }
}

impl<R: Record> Body for Json<R> {
    const CONTENT_TYPE: Option<&'static str> = Some("application/json");

    fn decode(raw: &Bytes) -> Result<Self, DecodeError> {
        codec::from_slice(raw).map(Json)
    }

    fn encode(self) -> Bytes {
        codec::to_bytes(&self.0)
    }

    fn schema() -> Option<Schema> {
        Some(R::schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq, crate::Record)]
    struct Echo {
        echo: String,
    }

    #[test]
    fn test_string_passthrough() {
        let raw = Bytes::from_static(b"{not json at all");
        let body = String::decode(&raw).unwrap();
        assert_eq!(body, "{not json at all");
        assert_eq!(body.encode(), raw);
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let raw = Bytes::from_static(&[0xff, 0xfe]);
        assert_eq!(String::decode(&raw).unwrap_err(), DecodeError::InvalidUtf8);
    }

    #[test]
    fn test_unit_ignores_body() {
        assert!(<()>::decode(&Bytes::from_static(b"anything")).is_ok());
        assert!(().encode().is_empty());
        assert_eq!(<() as Body>::CONTENT_TYPE, None);
    }

    #[test]
    fn test_json_decode_error() {
        let err = Json::<Echo>::decode(&Bytes::from_static(b"{}")).unwrap_err();
        assert_eq!(err, DecodeError::missing_field("echo"));
    }

    #[test]
    fn test_json_schema_is_object() {
        let schema = Json::<Echo>::schema().unwrap();
        assert_eq!(schema.type_name(), "object");
    }
}
