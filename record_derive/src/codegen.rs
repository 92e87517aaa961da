use crate::parsing::{FieldInfo, RecordInfo};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Generics, Ident};

pub fn generate_entity_impl(name: &Ident, generics: &Generics, fields: &FieldInfo) -> TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let key_ident = &fields.primary_key.ident;
    let key_ty = &fields.primary_key.ty;

    quote! {
        impl #impl_generics store_core::traits::Entity for #name #ty_generics #where_clause {
            type Id = #key_ty;

            fn id(&self) -> Self::Id {
                ::std::clone::Clone::clone(&self.#key_ident)
            }
        }
    }
}

pub fn generate_record_impl(
    name: &Ident,
    generics: &Generics,
    record: &RecordInfo,
    fields: &FieldInfo,
) -> TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let table = &record.table;
    let primary_key = &fields.primary_key.field;
    let key_column = &fields.primary_key.column;

    let overrides = fields.column_overrides.iter().map(|(field, column)| {
        quote! { (#field, #column) }
    });

    let relations = fields.relations.iter().map(|relation| {
        let field = &relation.field;
        let table = &relation.table;
        let foreign_key = &relation.foreign_key;
        let references = relation.references.as_deref().unwrap_or(key_column);
        quote! {
            store_core::traits::Relation {
                field: #field,
                table: #table,
                foreign_key: #foreign_key,
                references: #references,
            }
        }
    });

    quote! {
        impl #impl_generics store_core::traits::Record for #name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }

            fn primary_key() -> &'static str {
                #primary_key
            }

            fn column_overrides() -> &'static [(&'static str, &'static str)] {
                &[#(#overrides),*]
            }

            fn relations() -> &'static [store_core::traits::Relation] {
                &[#(#relations),*]
            }
        }
    }
}
