//! Declarative, storage-agnostic query parameters
//!
//! Callers describe *what* they want (filters on logical field names, sort order,
//! pagination, relations to preload); the [`ScopeBuilder`](crate::ScopeBuilder) decides
//! how that maps onto columns. Nothing is validated here: unknown fields surface later,
//! either as passthrough columns or as engine errors.

use crate::query_builder::{Operator, SortDirection};
use serde_json::Value;

/// One atomic query instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Filter {
        field: String,
        operator: Operator,
        value: Value,
    },
    Sort {
        field: String,
        direction: SortDirection,
    },
    Limit(u64),
    Offset(u64),
    Preload(String),
}

impl Param {
    pub fn filter(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Param::Filter {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::filter(field, Operator::Eq, value)
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::filter(field, Operator::Ne, value)
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::filter(field, Operator::Gt, value)
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::filter(field, Operator::Gte, value)
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::filter(field, Operator::Lt, value)
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::filter(field, Operator::Lte, value)
    }

    pub fn like(field: &str, pattern: &str) -> Self {
        Self::filter(field, Operator::Like, pattern)
    }

    pub fn ilike(field: &str, pattern: &str) -> Self {
        Self::filter(field, Operator::ILike, pattern)
    }

    pub fn in_values(field: &str, values: Vec<Value>) -> Self {
        Self::filter(field, Operator::In, Value::Array(values))
    }

    pub fn not_in_values(field: &str, values: Vec<Value>) -> Self {
        Self::filter(field, Operator::NotIn, Value::Array(values))
    }

    pub fn is_null(field: &str) -> Self {
        Self::filter(field, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(field: &str) -> Self {
        Self::filter(field, Operator::IsNotNull, Value::Null)
    }

    pub fn sort(field: &str, direction: impl Into<SortDirection>) -> Self {
        Param::Sort {
            field: field.to_string(),
            direction: direction.into(),
        }
    }

    pub fn asc(field: &str) -> Self {
        Self::sort(field, SortDirection::Asc)
    }

    pub fn desc(field: &str) -> Self {
        Self::sort(field, SortDirection::Desc)
    }

    pub fn limit(n: u64) -> Self {
        Param::Limit(n)
    }

    pub fn offset(n: u64) -> Self {
        Param::Offset(n)
    }

    pub fn preload(relation: &str) -> Self {
        Param::Preload(relation.to_string())
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, Param::Filter { .. })
    }
}

/// Ordered, immutable collection of [`Param`]s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new(params: Vec<Param>) -> Self {
        Self(params)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        self.0.iter().any(Param::is_filter)
    }

    pub fn as_slice(&self) -> &[Param] {
        &self.0
    }

    /// Same params with every `Limit` and `Offset` dropped, e.g. to count the total
    /// behind a page
    pub fn without_pagination(&self) -> Self {
        self.0
            .iter()
            .filter(|param| !matches!(param, Param::Limit(_) | Param::Offset(_)))
            .cloned()
            .collect()
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Self::new(params)
    }
}

impl From<&[Param]> for Params {
    fn from(params: &[Param]) -> Self {
        Self::new(params.to_vec())
    }
}

impl<const N: usize> From<[Param; N]> for Params {
    fn from(params: [Param; N]) -> Self {
        Self::new(params.into())
    }
}

impl FromIterator<Param> for Params {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_without_pagination_keeps_the_rest() {
        let params = Params::from([
            Param::limit(10),
            Param::eq("team", json!("core")),
            Param::offset(20),
            Param::desc("age"),
        ]);

        let total = params.without_pagination();
        assert_eq!(
            total,
            Params::from([Param::eq("team", json!("core")), Param::desc("age")])
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_params_keep_input_order() {
        let params = Params::from([
            Param::desc("age"),
            Param::gt("age", 18),
            Param::limit(10),
        ]);

        assert_eq!(params.len(), 3);
        assert!(matches!(params.as_slice()[0], Param::Sort { .. }));
        assert!(params.has_filters());
    }

    #[test]
    fn test_empty_params() {
        let params = Params::empty();
        assert!(params.is_empty());
        assert!(!params.has_filters());
    }

    #[test]
    fn test_filter_constructors() {
        assert_eq!(
            Param::eq("name", "bob"),
            Param::Filter {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("bob"),
            }
        );
        assert_eq!(
            Param::is_null("deleted_at"),
            Param::Filter {
                field: "deleted_at".to_string(),
                operator: Operator::IsNull,
                value: Value::Null,
            }
        );
    }

    #[test]
    fn test_sort_direction_defaults_to_ascending() {
        assert_eq!(
            Param::sort("name", ""),
            Param::Sort {
                field: "name".to_string(),
                direction: SortDirection::Asc,
            }
        );
        assert_eq!(
            Param::sort("name", "DESC"),
            Param::Sort {
                field: "name".to_string(),
                direction: SortDirection::Desc,
            }
        );
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(">=".parse::<Operator>(), Ok(Operator::Gte));
        assert_eq!("<>".parse::<Operator>(), Ok(Operator::Ne));
        assert_eq!("NOT   IN".parse::<Operator>(), Ok(Operator::NotIn));
        assert_eq!("is null".parse::<Operator>(), Ok(Operator::IsNull));
        assert!("~=".parse::<Operator>().is_err());
    }
}
