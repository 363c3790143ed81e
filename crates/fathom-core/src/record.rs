//! Labeled records and their field values.
//!
//! A [`Record`] is an ordered, fixed set of fields, each with a label (the
//! JSON key used on the wire), an optional description and a typed value.
//! Records are normally declared with `#[derive(Record)]`, which generates the
//! field metadata and label-addressed accessors:
//!
//! ```rust
//! use fathom_core::{Record, Schema};
//!
//! #[derive(Debug, Default, Record)]
//! #[record(name = "Profile")]
//! struct Profile {
//!     #[field(description = "Display name")]
//!     name: String,
//!     #[field(label = "yearOfBirth")]
//!     year_of_birth: u16,
//!     tags: Vec<String>,
//! }
//!
//! let labels: Vec<_> = Profile::fields().iter().map(|f| f.label).collect();
//! assert_eq!(labels, ["name", "yearOfBirth", "tags"]);
//! assert_eq!(Profile::fields()[2].schema().type_name(), "array");
//! ```
//!
//! Any type implementing [`FieldValue`] can appear as a field: integers,
//! floats, `bool`, `String`, other records, `Vec<T>`, `HashMap<String, T>`
//! and `Option<T>`.

use crate::DecodeError;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;

/// Shape of a field value, used for documentation and query coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Whole number.
    Integer,
    /// Floating point number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// UTF-8 text.
    String,
    /// Ordered sequence of values of one shape.
    Array(Box<Schema>),
    /// String-keyed map of values of one shape.
    Map(Box<Schema>),
    /// Nested record.
    Object {
        /// Record name.
        name: &'static str,
        /// Field metadata in declaration order.
        fields: &'static [FieldDescriptor],
    },
}

impl Schema {
    /// Returns the JSON type name of this shape.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Array(_) => "array",
            Self::Map(_) | Self::Object { .. } => "object",
        }
    }
}

/// Static metadata for one field of a record.
#[derive(Clone, Copy)]
pub struct FieldDescriptor {
    /// JSON key of the field; unique within its record.
    pub label: &'static str,
    /// Human-readable description; empty when none was given.
    pub description: &'static str,
    /// Whether the field must be present when decoding.
    pub required: bool,
    /// Produces the shape of the field's value.
    pub schema: fn() -> Schema,
}

impl FieldDescriptor {
    /// Returns the shape of the field's value.
    #[must_use]
    pub fn schema(&self) -> Schema {
        (self.schema)()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("label", &self.label)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("type", &self.schema().type_name())
            .finish()
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.description == other.description
            && self.required == other.required
    }
}

impl Eq for FieldDescriptor {}

/// A value that can occupy a record field.
pub trait FieldValue: Sized {
    /// Whether a record field of this type must be present on the wire.
    const REQUIRED: bool = true;

    /// Returns the shape of this type.
    fn schema() -> Schema;

    /// Encodes the value as JSON.
    fn to_value(&self) -> Value;

    /// Decodes the value from JSON.
    fn from_value(value: Value) -> Result<Self, DecodeError>;

    /// Value used when the field's key is absent, if absence is allowed.
    fn missing() -> Option<Self> {
        None
    }

    /// Whether the field should be left out of the encoded record.
    fn is_absent(&self) -> bool {
        false
    }
}

/// An ordered set of uniquely labeled fields.
///
/// Implemented by `#[derive(Record)]`. Encoding writes fields in declaration
/// order; decoding reads them by label, so key order on the wire is irrelevant.
pub trait Record: FieldValue + Send + 'static {
    /// Name of the record, used in generated documentation.
    const NAME: &'static str;

    /// Field metadata in declaration order.
    fn fields() -> &'static [FieldDescriptor];

    /// Encodes the record as a JSON object.
    fn to_object(&self) -> Map<String, Value>;

    /// Decodes the record from a JSON object.
    fn from_object(object: Map<String, Value>) -> Result<Self, DecodeError>;

    /// Reads a field by label, encoded as JSON.
    fn field(&self, label: &str) -> Option<Value>;

    /// Replaces a field by label, decoding the new value from JSON.
    fn set_field(&mut self, label: &str, value: Value) -> Result<(), DecodeError>;

    /// Returns the metadata of a field by label.
    fn descriptor(label: &str) -> Option<&'static FieldDescriptor> {
        Self::fields().iter().find(|field| field.label == label)
    }
}

macro_rules! impl_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl FieldValue for $ty {
            fn schema() -> Schema {
                Schema::Integer
            }

            fn to_value(&self) -> Value {
                Value::from(*self)
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_lossless)]
            fn from_value(value: Value) -> Result<Self, DecodeError> {
                let Value::Number(number) = &value else {
                    return Err(DecodeError::type_mismatch("integer", &value));
                };
                if let Some(int) = number.as_i64() {
                    return <$ty>::try_from(int)
                        .map_err(|_| DecodeError::out_of_range(int, stringify!($ty)));
                }
                if let Some(uint) = number.as_u64() {
                    return <$ty>::try_from(uint)
                        .map_err(|_| DecodeError::out_of_range(uint, stringify!($ty)));
                }
                let float = number.as_f64().unwrap_or(f64::NAN).trunc();
                if float.is_finite() && float >= <$ty>::MIN as f64 && float <= <$ty>::MAX as f64 {
                    Ok(float as $ty)
                } else {
                    Err(DecodeError::out_of_range(number, stringify!($ty)))
                }
            }
        }
    )*};
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// JSON has no NaN or infinity, so non-finite values encode as `null` and do
/// not decode back. Only finite values survive a round trip.
impl FieldValue for f64 {
    fn schema() -> Schema {
        Schema::Number
    }

    fn to_value(&self) -> Value {
        Number::from_f64(*self).map_or(Value::Null, Value::Number)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match &value {
            Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| DecodeError::out_of_range(number, "f64")),
            _ => Err(DecodeError::type_mismatch("number", &value)),
        }
    }
}

impl FieldValue for f32 {
    fn schema() -> Schema {
        Schema::Number
    }

    fn to_value(&self) -> Value {
        f64::from(*self).to_value()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        f64::from_value(value).map(|float| float as f32)
    }
}

impl FieldValue for bool {
    fn schema() -> Schema {
        Schema::Boolean
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(flag) => Ok(flag),
            other => Err(DecodeError::type_mismatch("boolean", &other)),
        }
    }
}

impl FieldValue for String {
    fn schema() -> Schema {
        Schema::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(text) => Ok(text),
            other => Err(DecodeError::type_mismatch("string", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn schema() -> Schema {
        Schema::Array(Box::new(T::schema()))
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| T::from_value(item).map_err(|e| e.in_field(index.to_string())))
                .collect(),
            other => Err(DecodeError::type_mismatch("array", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn schema() -> Schema {
        Schema::Map(Box::new(T::schema()))
    }

    fn to_value(&self) -> Value {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| (key.clone(), item.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Object(entries) => entries
                .into_iter()
                .map(|(key, item)| match T::from_value(item) {
                    Ok(decoded) => Ok((key, decoded)),
                    Err(e) => Err(e.in_field(key)),
                })
                .collect(),
            other => Err(DecodeError::type_mismatch("object", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const REQUIRED: bool = false;

    fn schema() -> Schema {
        T::schema()
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn missing() -> Option<Self> {
        Some(None)
    }

    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

/// Decodes a record from an arbitrary JSON value, rejecting non-objects.
///
/// Used by the code generated for `FieldValue` on derived records.
pub fn record_from_value<R: Record>(value: Value) -> Result<R, DecodeError> {
    match value {
        Value::Object(object) => R::from_object(object),
        other => Err(DecodeError::type_mismatch("object", &other)),
    }
}

/// Reads one field out of a JSON object being decoded into a record.
///
/// Used by the code generated for `Record::from_object`.
pub fn take_field<T: FieldValue>(
    object: &mut Map<String, Value>,
    label: &'static str,
) -> Result<T, DecodeError> {
    match object.remove(label) {
        Some(value) => T::from_value(value).map_err(|e| e.in_field(label)),
        None => T::missing().ok_or_else(|| DecodeError::missing_field(label)),
    }
}

/// Writes one field into a JSON object being encoded from a record.
///
/// Used by the code generated for `Record::to_object`.
pub fn put_field<T: FieldValue>(object: &mut Map<String, Value>, label: &'static str, value: &T) {
    if !value.is_absent() {
        object.insert(label.to_string(), value.to_value());
    }
}
