use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput};

/// Adds the derives a record needs and leaves everything else untouched
pub fn model_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let generics = &input.generics;
    let where_clause = &generics.where_clause;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return syn::Error::new_spanned(name, "record_model can only be used on structs")
                .to_compile_error()
                .into()
        }
    };

    let expanded = quote! {
        #[derive(
            Debug,
            Clone,
            Default,
            store_core::serde::Serialize,
            store_core::serde::Deserialize,
            Record
        )]
        #[serde(crate = "store_core::serde")]
        #(#attrs)*
        #vis struct #name #generics #where_clause #fields
    };

    TokenStream::from(expanded)
}
