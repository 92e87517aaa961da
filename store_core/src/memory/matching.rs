//! Condition and ordering evaluation over JSON rows
//!
//! Mirrors PostgreSQL closely enough for the store's tests: comparisons with NULL never
//! match, numbers compare by value regardless of representation, and NULLs sort last
//! ascending and first descending.

use crate::engine::Row;
use crate::query_builder::{Condition, Operator, SortDirection};
use serde_json::Value;
use std::cmp::Ordering;

pub(crate) fn column<'a>(row: &'a Row, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

pub(crate) fn matches_all(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches(row, condition))
}

pub(crate) fn matches(row: &Row, condition: &Condition) -> bool {
    let actual = column(row, &condition.column);
    let expected = &condition.value;

    match condition.operator {
        Operator::IsNull => actual.is_null(),
        Operator::IsNotNull => !actual.is_null(),
        Operator::Eq if expected.is_null() => actual.is_null(),
        Operator::Ne if expected.is_null() => !actual.is_null(),
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !actual.is_null() && !values_equal(actual, expected),
        Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Like | Operator::ILike => match (actual, expected) {
            (Value::String(text), Value::String(pattern)) => {
                if condition.operator == Operator::ILike {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(text, pattern)
                }
            }
            _ => false,
        },
        Operator::In => list(expected)
            .iter()
            .any(|item| values_equal(actual, item)),
        Operator::NotIn => {
            let items = list(expected);
            items.is_empty()
                || (!actual.is_null() && !items.iter().any(|item| values_equal(actual, item)))
        }
    }
}

fn list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering between two non-null scalars of the same kind
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            // a trailing backslash matches itself
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            c => LikeToken::Literal(c),
        });
    }
    tokens
}

/// SQL LIKE: `%` any run, `_` any single character, `\` escapes the next one.
/// Greedy two-pointer walk that backtracks only to the last `%`, linear in practice.
pub(crate) fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let tokens = like_tokens(pattern);

    let (mut t, mut p) = (0, 0);
    // last `%` seen and the text position it currently absorbs up to
    let mut resume: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyRun) => {
                resume = Some((p, t));
                p += 1;
            }
            Some(LikeToken::AnyOne) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((run, from)) => {
                    resume = Some((run, from + 1));
                    p = run + 1;
                    t = from + 1;
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == LikeToken::AnyRun)
}

pub(crate) fn sort_rows(rows: &mut [Row], order_by: &[(String, SortDirection)]) {
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (name, direction) in order_by {
            let ordering = compare_for_sort(column(a, name), column(b, name), *direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_for_sort(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    // NULL is the largest value, as in PostgreSQL
    let ascending = match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    };
    match direction {
        SortDirection::Asc => ascending,
        SortDirection::Desc => ascending.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn test_like_patterns() {
        assert!(like("alice@example.com", "%@example.com"));
        assert!(like("bob", "b_b"));
        assert!(!like("bob", "b_"));
        assert!(like("100%", "100\\%"));
        assert!(!like("1000", "100\\%"));
        assert!(like("", "%"));
        assert!(like("a%b_c", "a\\%b\\_c"));
        assert!(!like("axbyc", "a\\%b\\_c"));
        assert!(like("ends\\", "ends\\"));
    }

    #[test]
    fn test_like_with_many_wildcards_stays_fast() {
        let text = "a".repeat(5_000);
        let pattern = format!("{}b", "%a".repeat(12));
        let started = std::time::Instant::now();
        assert!(!like(&text, &pattern));
        assert!(like(&format!("{}b", text), &pattern));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_null_never_compares() {
        let r = row(json!({"age": null}));
        assert!(!matches(&r, &Condition::new("age", Operator::Gt, json!(1))));
        assert!(!matches(&r, &Condition::new("age", Operator::Ne, json!(1))));
        assert!(matches(&r, &Condition::new("age", Operator::Eq, Value::Null)));
        // missing column reads as NULL
        assert!(matches(&r, &Condition::new("nickname", Operator::IsNull, Value::Null)));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let r = row(json!({"price": 10}));
        assert!(matches(&r, &Condition::new("price", Operator::Eq, json!(10.0))));
        assert!(matches(&r, &Condition::new("price", Operator::Lt, json!(10.5))));
        assert!(matches(&r, &Condition::new("price", Operator::In, json!([1, 10]))));
        assert!(matches(&r, &Condition::new("price", Operator::NotIn, json!([]))));
    }

    #[test]
    fn test_ilike_ignores_case() {
        let r = row(json!({"name": "Ada Lovelace"}));
        assert!(matches(&r, &Condition::new("name", Operator::ILike, json!("ada%"))));
        assert!(!matches(&r, &Condition::new("name", Operator::Like, json!("ada%"))));
    }

    #[test]
    fn test_sort_puts_nulls_last_ascending() {
        let mut rows = vec![
            row(json!({"id": 1, "age": null})),
            row(json!({"id": 2, "age": 30})),
            row(json!({"id": 3, "age": 20})),
        ];

        sort_rows(&mut rows, &[("age".to_string(), SortDirection::Asc)]);
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(2), json!(1)]);

        sort_rows(&mut rows, &[("age".to_string(), SortDirection::Desc)]);
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_sort_is_stable_across_keys() {
        let mut rows = vec![
            row(json!({"id": 1, "team": "b", "age": 20})),
            row(json!({"id": 2, "team": "a", "age": 20})),
            row(json!({"id": 3, "team": "a", "age": 40})),
        ];

        sort_rows(
            &mut rows,
            &[
                ("age".to_string(), SortDirection::Asc),
                ("team".to_string(), SortDirection::Desc),
            ],
        );
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }
}
