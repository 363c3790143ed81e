//! JSON codec for records.
//!
//! Encoding walks a record's fields in declaration order and recurses into
//! nested records, sequences and maps; everything else is a leaf converted
//! with the rules of its [`FieldValue`](crate::FieldValue) implementation.
//! Decoding reads fields by label and fails with a [`DecodeError`] on
//! malformed JSON, a missing required key or a leaf of the wrong type.
//!
//! # Example
//!
//! ```rust
//! use fathom_core::{codec, Record};
//!
//! #[derive(Debug, Default, PartialEq, Record)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let point: Point = codec::from_slice(br#"{"y": 2, "x": 1.7}"#).unwrap();
//! assert_eq!(point, Point { x: 1, y: 2 });
//! assert_eq!(codec::to_string(&point), r#"{"x":1,"y":2}"#);
//! ```

use crate::record::record_from_value;
use crate::{DecodeError, Record};
use bytes::Bytes;
use serde_json::Value;

/// Encodes a record as a JSON value.
#[must_use]
pub fn to_value<R: Record>(record: &R) -> Value {
    Value::Object(record.to_object())
}

/// Decodes a record from a JSON value.
pub fn from_value<R: Record>(value: Value) -> Result<R, DecodeError> {
    record_from_value(value)
}

/// Encodes a record as compact JSON text.
#[must_use]
pub fn to_string<R: Record>(record: &R) -> String {
    to_value(record).to_string()
}

/// Encodes a record as compact JSON bytes.
#[must_use]
pub fn to_bytes<R: Record>(record: &R) -> Bytes {
    Bytes::from(to_string(record))
}

/// Decodes a record from JSON bytes.
pub fn from_slice<R: Record>(bytes: &[u8]) -> Result<R, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::syntax(e.to_string()))?;
    from_value(value)
}

/// Decodes a record from JSON text.
pub fn from_str<R: Record>(text: &str) -> Result<R, DecodeError> {
    from_slice(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, Clone, PartialEq, crate::Record)]
    struct Address {
        street: String,
        number: u32,
    }

    #[derive(Debug, Default, Clone, PartialEq, crate::Record)]
    struct Person {
        name: String,
        age: i64,
        height: f64,
        active: bool,
        address: Address,
        previous: Vec<Address>,
        nickname: Option<String>,
        labels: HashMap<String, i32>,
    }

    fn address() -> impl Strategy<Value = Address> {
        (".*", any::<u32>()).prop_map(|(street, number)| Address { street, number })
    }

    fn person() -> impl Strategy<Value = Person> {
        (
            ".*",
            any::<i64>(),
            (-1_000_000i32..1_000_000).prop_map(|quarters| f64::from(quarters) / 4.0),
            any::<bool>(),
            address(),
            prop::collection::vec(address(), 0..4),
            prop::option::of("[a-z]{0,8}"),
            prop::collection::hash_map("[a-z]{1,6}", any::<i32>(), 0..4),
        )
            .prop_map(
                |(name, age, height, active, address, previous, nickname, labels)| Person {
                    name,
                    age,
                    height,
                    active,
                    address,
                    previous,
                    nickname,
                    labels,
                },
            )
    }

    proptest! {
        #[test]
        fn test_decode_encode_is_identity(person in person()) {
            let encoded = to_bytes(&person);
            let decoded: Person = from_slice(&encoded).unwrap();
            prop_assert_eq!(decoded, person);
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = from_slice::<Address>(b"{\"street\":").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { .. }));
    }

    #[test]
    fn test_wrong_leaf_type() {
        let err = from_str::<Address>(r#"{"street": 5, "number": 1}"#).unwrap_err();
        assert_eq!(err.to_string(), "field `street`: expected string, found number");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let address: Address = from_str(r#"{"street":"Main","number":4,"zip":"x"}"#).unwrap();
        assert_eq!(address.number, 4);
    }

    #[test]
    fn test_top_level_must_be_object() {
        let err = from_str::<Address>("[]").unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { expected: "object", .. }));
    }
}
