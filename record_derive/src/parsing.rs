//! Parsing utilities for record and field attributes
//!
//! This module handles `#[record]`, `#[primary_key]`, `#[column]` and `#[relation]`
//! and validates every table and column name at compile time with the same rules the
//! runtime applies before rendering SQL.

use syn::ext::IdentExt;
use syn::{Attribute, Data, Error, Fields, Ident, LitStr, Result, Type};

/// Validate a table or column name and return syn::Error for better proc macro error handling
pub fn validate_identifier_syn(kind: &str, name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid {} '{}': {}", kind, name, e)))
}

/// Mirrors store_core::validation::ValidatedIdentifier
fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }

    for segment in name.split('.') {
        if segment.len() > 63 {
            return Err(format!(
                "'{}' is too long: {} characters (max 63)",
                segment,
                segment.len()
            ));
        }

        let first_char = segment
            .chars()
            .next()
            .ok_or_else(|| "name segments cannot be empty".to_string())?;
        if !first_char.is_ascii_alphabetic() && first_char != '_' {
            return Err(format!("'{}' must start with a letter or underscore", segment));
        }

        if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!(
                "'{}' contains invalid characters: only alphanumeric characters and underscores are allowed",
                segment
            ));
        }
    }

    Ok(())
}

#[derive(Debug)]
pub struct RecordInfo {
    pub table: String,
}

#[derive(Debug)]
pub struct PrimaryKey {
    pub ident: Ident,
    pub ty: Type,
    /// Serialised field name
    pub field: String,
    pub column: String,
}

#[derive(Debug)]
pub struct RelationInfo {
    pub field: String,
    pub table: String,
    pub foreign_key: String,
    pub references: Option<String>,
}

#[derive(Debug)]
pub struct FieldInfo {
    pub primary_key: PrimaryKey,
    /// (field, column) for every `#[column(name = ...)]`
    pub column_overrides: Vec<(String, String)>,
    pub relations: Vec<RelationInfo>,
}

pub fn parse_record_attributes(attrs: &[Attribute]) -> Result<RecordInfo> {
    let mut table = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                validate_identifier_syn("table name", &value.value(), value.span())?;
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported record attribute, expected `table = \"...\"`"))
            }
        })?;
    }

    let table = table.ok_or_else(|| {
        Error::new(
            proc_macro2::Span::call_site(),
            "record attribute is required: add #[record(table = \"table_name\")] to your struct",
        )
    })?;

    Ok(RecordInfo { table })
}

pub fn parse_field_attributes(data: &Data) -> Result<FieldInfo> {
    let fields_named = match data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields_named) => fields_named,
            _ => {
                return Err(Error::new(
                    proc_macro2::Span::call_site(),
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "Record can only be derived for structs",
            ))
        }
    };

    let mut primary_key = None;
    let mut fallback_key = None;
    let mut column_overrides = Vec::new();
    let mut relations = Vec::new();

    for field in &fields_named.named {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;
        let field_name = serde_rename(&field.attrs)?.unwrap_or_else(|| ident.unraw().to_string());

        let column = parse_column_name(&field.attrs)?;
        if let Some(column) = &column {
            column_overrides.push((field_name.clone(), column.clone()));
        }

        if let Some(mut relation) = parse_relation(&field.attrs)? {
            if column.is_some() || has_attribute(&field.attrs, "primary_key") {
                return Err(Error::new_spanned(
                    ident,
                    "a relation field cannot also be a column or the primary key",
                ));
            }
            relation.field = field_name;
            relations.push(relation);
            continue;
        }

        let key = PrimaryKey {
            ident: ident.clone(),
            ty: field.ty.clone(),
            column: column.unwrap_or_else(|| field_name.clone()),
            field: field_name,
        };

        if has_attribute(&field.attrs, "primary_key") {
            if primary_key.is_some() {
                return Err(Error::new_spanned(ident, "only one #[primary_key] is allowed"));
            }
            primary_key = Some(key);
        } else if key.field == "id" {
            fallback_key = Some(key);
        }
    }

    let primary_key = primary_key.or(fallback_key).ok_or_else(|| {
        Error::new(
            proc_macro2::Span::call_site(),
            "no primary key: mark a field with #[primary_key] or name it `id`",
        )
    })?;

    Ok(FieldInfo {
        primary_key,
        column_overrides,
        relations,
    })
}

pub fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// `#[column(name = "...")]`
fn parse_column_name(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut name = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                validate_identifier_syn("column name", &value.value(), value.span())?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported column attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name)
}

/// `#[relation(table = "...", foreign_key = "...", references = "...")]`
fn parse_relation(attrs: &[Attribute]) -> Result<Option<RelationInfo>> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("relation")) else {
        return Ok(None);
    };

    let mut table = None;
    let mut foreign_key = None;
    let mut references = None;

    attr.parse_nested_meta(|meta| {
        let value: LitStr = meta.value()?.parse()?;
        let kind = if meta.path.is_ident("table") {
            "table name"
        } else {
            "column name"
        };
        validate_identifier_syn(kind, &value.value(), value.span())?;

        if meta.path.is_ident("table") {
            table = Some(value.value());
        } else if meta.path.is_ident("foreign_key") {
            foreign_key = Some(value.value());
        } else if meta.path.is_ident("references") {
            references = Some(value.value());
        } else {
            return Err(meta.error(
                "unsupported relation attribute, expected `table`, `foreign_key` or `references`",
            ));
        }
        Ok(())
    })?;

    let table = table.ok_or_else(|| Error::new_spanned(attr, "relation requires `table`"))?;
    let foreign_key =
        foreign_key.ok_or_else(|| Error::new_spanned(attr, "relation requires `foreign_key`"))?;

    Ok(Some(RelationInfo {
        field: String::new(),
        table,
        foreign_key,
        references,
    }))
}

/// `#[serde(rename = "...")]` on a field, the name the record serialises with
fn serde_rename(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(syn::Token![=]) {
                // other serde options are not ours to check
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let _content;
                syn::parenthesized!(_content in meta.input);
            }
            Ok(())
        })?;
    }
    Ok(rename)
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use syn::DeriveInput;

    fn validate(name: &str) {
        if let Err(e) = validate_identifier_syn("table name", name, proc_macro2::Span::call_site())
        {
            panic!("{}", e);
        }
    }

    fn parse(input: proc_macro2::TokenStream) -> DeriveInput {
        syn::parse2(input).unwrap()
    }

    #[test]
    fn test_valid_names() {
        validate("users");
        validate("user_profiles");
        validate("_private");
        validate("table123");
        validate("public.users");
        // quoted in SQL, so keywords are fine
        validate("order");
    }

    #[test]
    #[should_panic(expected = "Invalid table name")]
    fn test_invalid_start() {
        validate("123table");
    }

    #[test]
    #[should_panic(expected = "Invalid table name")]
    fn test_invalid_chars() {
        validate("user-table");
    }

    #[test]
    #[should_panic(expected = "Invalid table name")]
    fn test_empty_name() {
        validate("");
    }

    #[test]
    fn test_sql_injection_prevention() {
        let malicious_names = [
            "users; DROP TABLE users; --",
            "users' OR '1'='1",
            "users/**/UNION/**/SELECT",
            "users\"; DELETE FROM users; --",
        ];

        for name in malicious_names {
            assert!(
                validate_identifier(name).is_err(),
                "Should reject malicious name: {}",
                name
            );
        }
    }

    #[test]
    fn test_record_table_required() {
        let input = parse(quote::quote! {
            struct User { id: i64 }
        });
        assert!(parse_record_attributes(&input.attrs).is_err());

        let input = parse(quote::quote! {
            #[record(table = "users")]
            struct User { id: i64 }
        });
        assert_eq!(parse_record_attributes(&input.attrs).unwrap().table, "users");
    }

    #[test]
    fn test_fields_parsed() {
        let input = parse(quote::quote! {
            #[record(table = "users")]
            struct User {
                #[primary_key]
                user_id: i64,
                #[column(name = "full_name")]
                name: String,
                #[serde(rename = "mail", default)]
                email: String,
                #[relation(table = "posts", foreign_key = "author_id")]
                posts: Vec<Post>,
            }
        });

        let info = parse_field_attributes(&input.data).unwrap();
        assert_eq!(info.primary_key.field, "user_id");
        assert_eq!(info.primary_key.column, "user_id");
        assert_eq!(
            info.column_overrides,
            vec![("name".to_string(), "full_name".to_string())]
        );
        assert_eq!(info.relations.len(), 1);
        assert_eq!(info.relations[0].field, "posts");
        assert_eq!(info.relations[0].references, None);
    }

    #[test]
    fn test_id_field_is_default_key() {
        let input = parse(quote::quote! {
            struct Tag { id: uuid::Uuid, label: String }
        });
        let info = parse_field_attributes(&input.data).unwrap();
        assert_eq!(info.primary_key.field, "id");
    }

    #[test]
    fn test_missing_key_rejected() {
        let input = parse(quote::quote! {
            struct Setting { key: String, value: String }
        });
        assert!(parse_field_attributes(&input.data).is_err());
    }

    #[test]
    fn test_bad_column_name_rejected() {
        let input = parse(quote::quote! {
            struct User {
                id: i64,
                #[column(name = "full name")]
                name: String,
            }
        });
        assert!(parse_field_attributes(&input.data).is_err());
    }
}
