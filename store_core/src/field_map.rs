//! Logical field → physical column mapping
//!
//! The map is derived once per store from a default instance of the record type. Serde
//! is the only introspection used: whatever names the record serialises with are the
//! logical names callers filter and sort on.

use crate::errors::StoreError;
use crate::traits::Record;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldColumnMap {
    // (field, column) in insertion order
    fields: Vec<(String, String)>,
    by_field: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
}

impl FieldColumnMap {
    pub fn from_pairs<I, F, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (F, C)>,
        F: Into<String>,
        C: Into<String>,
    {
        let mut map = Self::default();
        for (field, column) in pairs {
            map.insert(field.into(), column.into());
        }
        map
    }

    fn insert(&mut self, field: String, column: String) {
        if let Some(&idx) = self.by_field.get(&field) {
            self.by_column.remove(&self.fields[idx].1);
            self.by_column.insert(column.clone(), idx);
            self.fields[idx].1 = column;
            return;
        }
        let idx = self.fields.len();
        self.by_field.insert(field.clone(), idx);
        self.by_column.insert(column.clone(), idx);
        self.fields.push((field, column));
    }

    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.by_field
            .get(field)
            .map(|&idx| self.fields[idx].1.as_str())
    }

    pub fn field_for(&self, column: &str) -> Option<&str> {
        self.by_column
            .get(column)
            .map(|&idx| self.fields[idx].0.as_str())
    }

    /// Column for `field`, or `field` itself when it is not mapped.
    ///
    /// Unmapped names are deliberately passed through so that computed or virtual
    /// columns can still be filtered and sorted on.
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        self.column_for(field).unwrap_or(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, c)| (f.as_str(), c.as_str()))
    }

    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|(_, c)| c.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rename a serialised record (logical keys) into a row (column keys).
    /// Keys without a mapping are dropped.
    pub fn to_row(&self, fields: Map<String, Value>) -> Map<String, Value> {
        fields
            .into_iter()
            .filter_map(|(field, value)| {
                self.column_for(&field)
                    .map(|column| (column.to_string(), value))
            })
            .collect()
    }

    /// Inverse of [`to_row`](Self::to_row). Unknown columns keep their name, which is
    /// how preloaded relation fields reach the record.
    pub fn from_row(&self, row: Map<String, Value>) -> Map<String, Value> {
        row.into_iter()
            .map(|(column, value)| {
                let field = self.field_for(&column).map(str::to_string).unwrap_or(column);
                (field, value)
            })
            .collect()
    }
}

/// Build the map for `R`.
///
/// Fails with [`StoreError::NoMappableFields`] when `R` does not serialise to a
/// non-empty object once relation fields are excluded.
pub fn build_field_column_map<R: Record>() -> Result<FieldColumnMap, StoreError> {
    let sample = serde_json::to_value(R::default())?;
    let fields = match sample {
        Value::Object(fields) => fields,
        _ => {
            return Err(StoreError::NoMappableFields {
                record: std::any::type_name::<R>().to_string(),
            })
        }
    };

    let overrides = R::column_overrides();
    let relations = R::relations();

    let map = FieldColumnMap::from_pairs(
        fields
            .keys()
            .filter(|field| !relations.iter().any(|rel| rel.field == field.as_str()))
            .map(|field| {
                let column = overrides
                    .iter()
                    .find(|(f, _)| *f == field.as_str())
                    .map(|(_, c)| c.to_string())
                    .unwrap_or_else(|| to_snake_case(field));
                (field.clone(), column)
            }),
    );

    if map.is_empty() {
        return Err(StoreError::NoMappableFields {
            record: std::any::type_name::<R>().to_string(),
        });
    }

    Ok(map)
}

/// `createdAt` → `created_at`, `HTTPStatus` → `http_status`, `full_name` unchanged
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map(|n| n.is_lowercase()).unwrap_or(false),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Entity, Relation};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ProfileRecord {
        id: i64,
        display_name: String,
        email: String,
        #[serde(default)]
        badges: Vec<String>,
    }

    impl Entity for ProfileRecord {
        type Id = i64;
        fn id(&self) -> i64 {
            self.id
        }
    }

    impl Record for ProfileRecord {
        fn table_name() -> &'static str {
            "profiles"
        }
        fn column_overrides() -> &'static [(&'static str, &'static str)] {
            &[("email", "email_address")]
        }
        fn relations() -> &'static [Relation] {
            &[Relation {
                field: "badges",
                table: "badges",
                foreign_key: "profile_id",
                references: "id",
            }]
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Opaque(i64);

    impl Entity for Opaque {
        type Id = i64;
        fn id(&self) -> i64 {
            self.0
        }
    }

    impl Record for Opaque {
        fn table_name() -> &'static str {
            "opaque"
        }
    }

    #[test]
    fn test_convention_and_overrides() {
        let map = build_field_column_map::<ProfileRecord>().unwrap();

        assert_eq!(map.column_for("id"), Some("id"));
        assert_eq!(map.column_for("displayName"), Some("display_name"));
        assert_eq!(map.column_for("email"), Some("email_address"));
        assert_eq!(map.field_for("email_address"), Some("email"));
    }

    #[test]
    fn test_relations_are_not_columns() {
        let map = build_field_column_map::<ProfileRecord>().unwrap();
        assert_eq!(map.column_for("badges"), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_deterministic() {
        let a = build_field_column_map::<ProfileRecord>().unwrap();
        let b = build_field_column_map::<ProfileRecord>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_mappable_fields() {
        let err = build_field_column_map::<Opaque>().unwrap_err();
        assert!(matches!(err, StoreError::NoMappableFields { .. }));
    }

    #[test]
    fn test_resolve_passes_unmapped_through() {
        let map = FieldColumnMap::from_pairs([("name", "full_name")]);
        assert_eq!(map.resolve("name"), "full_name");
        assert_eq!(map.resolve("score"), "score");
    }

    #[test]
    fn test_row_renaming() {
        let map = FieldColumnMap::from_pairs([("id", "id"), ("name", "full_name")]);
        let fields = json!({"id": 1, "name": "Ada", "transient": true});

        let row = map.to_row(fields.as_object().cloned().unwrap());
        assert_eq!(Value::Object(row.clone()), json!({"id": 1, "full_name": "Ada"}));

        let back = map.from_row(row);
        assert_eq!(Value::Object(back), json!({"id": 1, "name": "Ada"}));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("HTTPStatus"), "http_status");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("full_name"), "full_name");
        assert_eq!(to_snake_case("Name"), "name");
    }
}
