//! Query string decoding.
//!
//! A handler's query type is either `()` (the query string is ignored) or
//! [`Query<R>`], which decodes `?key=value` pairs into a record. Values
//! arrive as text and are coerced by the declared field shape: integer,
//! number and boolean fields are parsed, array fields collect repeated keys.

use crate::{DecodeError, FieldDescriptor, Record, Schema};
use serde_json::{Map, Number, Value};
use std::ops::Deref;

/// A type that can be produced from a request's query string.
pub trait QueryParams: Sized + Send + 'static {
    /// Decodes the raw query string (without the leading `?`).
    fn from_query(raw: Option<&str>) -> Result<Self, DecodeError>;

    /// Fields accepted in the query string, for documentation.
    fn fields() -> &'static [FieldDescriptor] {
        &[]
    }
}

impl QueryParams for () {
    fn from_query(_raw: Option<&str>) -> Result<Self, DecodeError> {
        Ok(())
    }
}

/// Query string decoded into a record.
///
/// # Example
///
/// ```rust
/// use fathom_core::{Query, QueryParams, Record};
///
/// #[derive(Debug, Default, Record)]
/// struct Page {
///     limit: u32,
///     verbose: Option<bool>,
/// }
///
/// let page = Query::<Page>::from_query(Some("limit=10&verbose=true")).unwrap();
/// assert_eq!(page.limit, 10);
/// assert_eq!(page.verbose, Some(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query<R>(pub R);

impl<R> Query<R> {
    /// Consumes the wrapper, returning the record.
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R> Deref for Query<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<R: Record> QueryParams for Query<R> {
    fn from_query(raw: Option<&str>) -> Result<Self, DecodeError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw.unwrap_or_default())
            .map_err(|e| DecodeError::Query {
                message: e.to_string(),
            })?;

        let mut object = Map::new();
        for (key, text) in pairs {
            let Some(descriptor) = R::descriptor(&key) else {
                continue;
            };
            let schema = descriptor.schema();
            if let Schema::Array(item) = &schema {
                let value = coerce(item, text);
                if let Value::Array(items) = object
                    .entry(key)
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    items.push(value);
                }
            } else {
                object.insert(key, coerce(&schema, text));
            }
        }

        R::from_object(object).map(Query)
    }

    fn fields() -> &'static [FieldDescriptor] {
        R::fields()
    }
}

/// Converts query text to the JSON value the field's decoder expects.
///
/// Text that does not parse is passed through as a string so the decoder
/// reports a type mismatch naming the field.
fn coerce(schema: &Schema, text: String) -> Value {
    match schema {
        Schema::Integer => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<u64>().map(Value::from))
            .unwrap_or(Value::String(text)),
        Schema::Number => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::String(text), Value::Number),
        Schema::Boolean => match text.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}
