//! Procedural macros for Fathom.
//!
//! This crate provides `#[derive(Record)]`, which turns a struct with named
//! fields into a labeled record usable as a JSON request or response body.
//!
//! # Example
//!
//! ```rust,ignore
//! use fathom::prelude::*;
//!
//! #[derive(Debug, Default, Record)]
//! #[record(name = "Profile", crate = "fathom::core")]
//! struct Profile {
//!     #[field(description = "Display name")]
//!     name: String,
//!     #[field(label = "yearOfBirth", description = "Four digit year")]
//!     year_of_birth: u16,
//! }
//! ```
//!
//! # Macro Expansion
//!
//! The derive generates:
//!
//! 1. `impl FieldValue` so the record can be nested inside other records
//! 2. `impl Record` with the field metadata in declaration order
//! 3. Encoding in declaration order and decoding by label
//! 4. Label-addressed `field` / `set_field` accessors

mod parse;
mod record;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `fathom_core::Record` for a struct with named fields.
///
/// # Attributes
///
/// On the struct:
///
/// - `#[record(name = "...")]`: record name used in documentation (defaults to the struct name)
/// - `#[record(crate = "...")]`: path to `fathom_core` in generated code, for
///   crates that only depend on the `fathom` facade (`crate = "fathom::core"`)
///
/// On each field:
///
/// - `#[field(label = "...")]`: JSON key (defaults to the field name)
/// - `#[field(description = "...")]`: field documentation
///
/// Labels must be unique within the record.
#[proc_macro_derive(Record, attributes(record, field))]
pub fn derive_record(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    record::expand_record(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
