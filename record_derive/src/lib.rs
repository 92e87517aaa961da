//! Procedural macros for declaring storage records
//!
//! This crate provides the `#[record_model]` macro and the `Record` derive, which
//! implement `store_core::traits::Entity` and `store_core::traits::Record` from a
//! handful of attributes.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod codegen;
mod model_macro;
mod parsing;

use codegen::{generate_entity_impl, generate_record_impl};
use model_macro::model_attribute;
use parsing::{parse_field_attributes, parse_record_attributes};

/// Derive macro for the Entity and Record traits
///
/// Note: It's recommended to use the `#[record_model]` attribute macro instead,
/// which adds this derive along with the serde derives a record needs.
///
/// Manual usage:
/// ```ignore
/// #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, Record)]
/// #[record(table = "users")]
/// pub struct UserRecord {
///     #[primary_key]
///     pub id: i64,
///
///     #[column(name = "full_name")]
///     pub name: String,
///
///     #[relation(table = "posts", foreign_key = "author_id")]
///     pub posts: Vec<PostRecord>,
/// }
/// ```
///
/// A field named `id` is the primary key unless another field carries `#[primary_key]`.
/// `references` on a relation defaults to the primary key column.
#[proc_macro_derive(Record, attributes(record, primary_key, column, relation))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let record_info = match parse_record_attributes(&input.attrs) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    let field_info = match parse_field_attributes(&input.data) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    #[cfg(feature = "debug-logging")]
    eprintln!(
        "record_derive: {} -> {} (key {}, {} relations)",
        name,
        record_info.table,
        field_info.primary_key.column,
        field_info.relations.len()
    );

    let entity_impl = generate_entity_impl(name, &input.generics, &field_info);
    let record_impl = generate_record_impl(name, &input.generics, &record_info, &field_info);

    let expanded = quote::quote! {
        #entity_impl
        #record_impl
    };

    TokenStream::from(expanded)
}

/// Convenience attribute macro that adds all necessary derives for a record
///
/// Usage:
/// ```ignore
/// use flexstore::prelude::*;
///
/// #[record_model]
/// #[record(table = "users")]
/// pub struct UserRecord {
///     #[primary_key]
///     pub id: i64,
///     pub email: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn record_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    model_attribute(attr, item)
}
