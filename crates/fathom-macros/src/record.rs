//! Record derive implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::parse::RecordDef;

/// Expands `#[derive(Record)]`.
pub fn expand_record(input: &DeriveInput) -> syn::Result<TokenStream> {
    let def = RecordDef::parse(input)?;
    Ok(generate_record_code(input, &def))
}

fn generate_record_code(input: &DeriveInput, def: &RecordDef) -> TokenStream {
    let ident = &input.ident;
    let name = &def.attrs.name;
    let krate = &def.attrs.krate;

    let idents: Vec<_> = def.fields.iter().map(|f| &f.ident).collect();
    let types: Vec<_> = def.fields.iter().map(|f| &f.ty).collect();
    let labels: Vec<_> = def.fields.iter().map(|f| &f.label).collect();
    let descriptions: Vec<_> = def.fields.iter().map(|f| &f.description).collect();

    quote! {
        impl #krate::FieldValue for #ident {
            fn schema() -> #krate::Schema {
                #krate::Schema::Object {
                    name: #name,
                    fields: <Self as #krate::Record>::fields(),
                }
            }

            fn to_value(&self) -> #krate::serde_json::Value {
                #krate::serde_json::Value::Object(#krate::Record::to_object(self))
            }

            fn from_value(
                value: #krate::serde_json::Value,
            ) -> ::core::result::Result<Self, #krate::DecodeError> {
                #krate::record::record_from_value(value)
            }
        }

        impl #krate::Record for #ident {
            const NAME: &'static str = #name;

            fn fields() -> &'static [#krate::FieldDescriptor] {
                const FIELDS: &[#krate::FieldDescriptor] = &[
                    #(
                        #krate::FieldDescriptor {
                            label: #labels,
                            description: #descriptions,
                            required: <#types as #krate::FieldValue>::REQUIRED,
                            schema: <#types as #krate::FieldValue>::schema,
                        },
                    )*
                ];
                FIELDS
            }

            fn to_object(&self) -> #krate::serde_json::Map<::std::string::String, #krate::serde_json::Value> {
                let mut object = #krate::serde_json::Map::new();
                #(
                    #krate::record::put_field(&mut object, #labels, &self.#idents);
                )*
                object
            }

            #[allow(unused_mut, unused_variables)]
            fn from_object(
                mut object: #krate::serde_json::Map<::std::string::String, #krate::serde_json::Value>,
            ) -> ::core::result::Result<Self, #krate::DecodeError> {
                ::core::result::Result::Ok(Self {
                    #(
                        #idents: #krate::record::take_field(&mut object, #labels)?,
                    )*
                })
            }

            fn field(&self, label: &str) -> ::core::option::Option<#krate::serde_json::Value> {
                match label {
                    #(
                        #labels => ::core::option::Option::Some(
                            #krate::FieldValue::to_value(&self.#idents),
                        ),
                    )*
                    _ => ::core::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                label: &str,
                value: #krate::serde_json::Value,
            ) -> ::core::result::Result<(), #krate::DecodeError> {
                match label {
                    #(
                        #labels => {
                            self.#idents = <#types as #krate::FieldValue>::from_value(value)
                                .map_err(|e| e.in_field(#labels))?;
                            ::core::result::Result::Ok(())
                        }
                    )*
                    _ => ::core::result::Result::Err(#krate::DecodeError::UnknownField {
                        record: #name,
                        label: ::std::string::ToString::to_string(label),
                    }),
                }
            }
        }
    }
}
