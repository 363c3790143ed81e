//! Parsing utilities for the record derive.
//!
//! Reads `#[record(...)]` and `#[field(...)]` attributes into plain structs.

use proc_macro2::Span;
use std::collections::HashSet;
use syn::{
    punctuated::Punctuated, spanned::Spanned, Attribute, Data, DeriveInput, Expr, ExprLit,
    Fields, Ident, Lit, Meta, Path, Token, Type,
};

/// Parsed record-level attributes.
#[derive(Debug)]
pub struct RecordAttrs {
    /// The record name.
    pub name: String,
    /// Path to the core crate in generated code.
    pub krate: Path,
}

/// A parsed record field.
#[derive(Debug)]
pub struct RecordField {
    /// The Rust field name.
    pub ident: Ident,
    /// The field type.
    pub ty: Type,
    /// The JSON key.
    pub label: String,
    /// Field documentation.
    pub description: String,
}

/// A parsed record definition.
#[derive(Debug)]
pub struct RecordDef {
    /// Record-level attributes.
    pub attrs: RecordAttrs,
    /// Fields in declaration order.
    pub fields: Vec<RecordField>,
}

impl RecordDef {
    /// Parses a derive input into a record definition.
    pub fn parse(input: &DeriveInput) -> syn::Result<Self> {
        if !input.generics.params.is_empty() {
            return Err(syn::Error::new(
                input.generics.span(),
                "records cannot have generic parameters",
            ));
        }

        let named = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => named,
                other => {
                    return Err(syn::Error::new(
                        other.span(),
                        "records must have named fields",
                    ))
                }
            },
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "Record can only be derived for structs",
                ))
            }
        };

        let mut name = input.ident.to_string();
        let mut krate: Path = syn::parse_quote!(::fathom_core);
        for (key, value, span) in name_values(&input.attrs, "record")? {
            match key.as_str() {
                "name" => name = value,
                "crate" => {
                    krate = syn::parse_str(&value)
                        .map_err(|_| syn::Error::new(span, format!("invalid crate path: {value}")))?;
                }
                _ => return Err(syn::Error::new(span, format!("unknown attribute: {key}"))),
            }
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(named.named.len());
        for field in &named.named {
            let ident = field
                .ident
                .clone()
                .ok_or_else(|| syn::Error::new(field.span(), "expected named field"))?;
            let mut label = ident.to_string().trim_start_matches("r#").to_string();
            let mut description = String::new();

            for (key, value, span) in name_values(&field.attrs, "field")? {
                match key.as_str() {
                    "label" => label = value,
                    "description" => description = value,
                    _ => return Err(syn::Error::new(span, format!("unknown attribute: {key}"))),
                }
            }

            if !seen.insert(label.clone()) {
                return Err(syn::Error::new(
                    field.span(),
                    format!("duplicate field label: {label}"),
                ));
            }

            fields.push(RecordField {
                ident,
                ty: field.ty.clone(),
                label,
                description,
            });
        }

        Ok(Self {
            attrs: RecordAttrs { name, krate },
            fields,
        })
    }
}

/// Collects `key = "value"` pairs from every attribute with the given name.
fn name_values(attrs: &[Attribute], attr_name: &str) -> syn::Result<Vec<(String, String, Span)>> {
    let mut pairs = Vec::new();

    for attr in attrs.iter().filter(|a| a.path().is_ident(attr_name)) {
        let meta_list: Punctuated<Meta, Token![,]> =
            attr.parse_args_with(Punctuated::parse_terminated)?;

        for meta in meta_list {
            match meta {
                Meta::NameValue(nv) => {
                    let ident = nv
                        .path
                        .get_ident()
                        .ok_or_else(|| syn::Error::new(nv.path.span(), "expected identifier"))?
                        .to_string();

                    let value = match &nv.value {
                        Expr::Lit(ExprLit {
                            lit: Lit::Str(s), ..
                        }) => s.value(),
                        _ => {
                            return Err(syn::Error::new(
                                nv.value.span(),
                                "expected string literal",
                            ))
                        }
                    };

                    pairs.push((ident, value, nv.path.span()));
                }
                _ => return Err(syn::Error::new(meta.span(), "expected name = value")),
            }
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_defaults() {
        let input: DeriveInput = parse_quote! {
            struct Echo {
                echo: String,
            }
        };
        let def = RecordDef::parse(&input).unwrap();
        assert_eq!(def.attrs.name, "Echo");
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].label, "echo");
        assert!(def.fields[0].description.is_empty());
    }

    #[test]
    fn test_parse_attributes() {
        let input: DeriveInput = parse_quote! {
            #[record(name = "UserProfile")]
            struct Profile {
                #[field(label = "fullName", description = "Shown to others")]
                full_name: String,
                r#type: String,
            }
        };
        let def = RecordDef::parse(&input).unwrap();
        assert_eq!(def.attrs.name, "UserProfile");
        assert_eq!(def.fields[0].label, "fullName");
        assert_eq!(def.fields[0].description, "Shown to others");
        assert_eq!(def.fields[1].label, "type");
    }

    #[test]
    fn test_parse_crate_path() {
        let input: DeriveInput = parse_quote! {
            #[record(crate = "fathom::core")]
            struct Echo {
                echo: String,
            }
        };
        let def = RecordDef::parse(&input).unwrap();
        let krate = &def.attrs.krate;
        assert_eq!(quote::quote!(#krate).to_string(), "fathom :: core");

        let default = RecordDef::parse(&parse_quote! { struct Echo { echo: String } }).unwrap();
        let krate = &default.attrs.krate;
        assert_eq!(quote::quote!(#krate).to_string(), ":: fathom_core");
    }

    #[test]
    fn test_parse_rejects_duplicate_labels() {
        let input: DeriveInput = parse_quote! {
            struct Bad {
                #[field(label = "x")]
                a: i32,
                x: i32,
            }
        };
        let err = RecordDef::parse(&input).unwrap_err();
        assert!(err.to_string().contains("duplicate field label"));
    }

    #[test]
    fn test_parse_rejects_tuple_struct() {
        let input: DeriveInput = parse_quote! {
            struct Bad(i32);
        };
        assert!(RecordDef::parse(&input).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_attribute() {
        let input: DeriveInput = parse_quote! {
            struct Bad {
                #[field(rename = "y")]
                a: i32,
            }
        };
        let err = RecordDef::parse(&input).unwrap_err();
        assert!(err.to_string().contains("unknown attribute: rename"));
    }

    #[test]
    fn test_parse_rejects_generics() {
        let input: DeriveInput = parse_quote! {
            struct Bad<T> {
                a: T,
            }
        };
        assert!(RecordDef::parse(&input).is_err());
    }
}
