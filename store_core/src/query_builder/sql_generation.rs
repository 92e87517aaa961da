//! PostgreSQL rendering of queries
//!
//! Rows travel as JSON in both directions: reads wrap each row in `row_to_json`, writes
//! hand the server a JSON document and let `jsonb_populate_record(set)` coerce it into
//! the table's column types. Only WHERE values are bound individually; string values
//! are bound as text and coerced to the compared column's type the same way.

use crate::errors::StoreError;
use crate::query_builder::builder::Query;
use crate::query_builder::filter::{Condition, Operator};
use crate::query_builder::ordering::SortDirection;
use crate::validation::quote_identifier;
use serde_json::Value;

pub struct SqlGenerator;

impl SqlGenerator {
    /// `WHERE ...` for `conditions` on `table`, numbering placeholders after the values
    /// already collected. Empty string when there are no conditions.
    pub fn build_where_clause(
        table: &str,
        conditions: &[Condition],
        values: &mut Vec<Value>,
    ) -> Result<String, StoreError> {
        if conditions.is_empty() {
            return Ok(String::new());
        }

        let parts = conditions
            .iter()
            .map(|condition| Self::build_condition_sql(table, condition, values))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(format!("WHERE {}", parts.join(" AND ")))
    }

    fn placeholder(values: &mut Vec<Value>, value: Value) -> String {
        values.push(value);
        format!("${}", values.len())
    }

    /// Placeholder for a value compared with `column`. Strings read as the column's own
    /// type, so a text column holding a UUID-like value still compares as text.
    fn operand(
        table: &str,
        column: &str,
        values: &mut Vec<Value>,
        value: Value,
    ) -> Result<String, StoreError> {
        let is_text = value.is_string();
        let param = Self::placeholder(values, value);
        if !is_text {
            return Ok(param);
        }
        // validated identifiers are plain ASCII words, safe inside a literal
        let field = column.rsplit('.').next().unwrap_or(column);
        Ok(format!(
            "(jsonb_populate_record(NULL::{}, jsonb_build_object('{}', {}::text))).{}",
            quote_identifier(table)?,
            field,
            param,
            quote_identifier(field)?
        ))
    }

    fn build_condition_sql(
        table: &str,
        condition: &Condition,
        values: &mut Vec<Value>,
    ) -> Result<String, StoreError> {
        let column = quote_identifier(&condition.column)?;
        let value = &condition.value;

        let sql = match condition.operator {
            Operator::Eq if value.is_null() => format!("{} IS NULL", column),
            Operator::Ne if value.is_null() => format!("{} IS NOT NULL", column),
            Operator::IsNull => format!("{} IS NULL", column),
            Operator::IsNotNull => format!("{} IS NOT NULL", column),
            Operator::In | Operator::NotIn => {
                let items = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                if items.is_empty() {
                    // IN () is not valid SQL
                    return Ok(if condition.operator == Operator::In {
                        "1=0".to_string()
                    } else {
                        "1=1".to_string()
                    });
                }
                let placeholders = items
                    .into_iter()
                    .map(|item| Self::operand(table, &condition.column, values, item))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                format!("{} {} ({})", column, condition.operator.to_sql(), placeholders)
            }
            op => {
                let param = Self::operand(table, &condition.column, values, value.clone())?;
                format!("{} {} {}", column, op.to_sql(), param)
            }
        };

        Ok(sql)
    }

    /// `ORDER BY ...`, empty string when unordered
    pub fn build_order_clause(order_by: &[(String, SortDirection)]) -> Result<String, StoreError> {
        if order_by.is_empty() {
            return Ok(String::new());
        }

        let parts = order_by
            .iter()
            .map(|(column, direction)| {
                quote_identifier(column).map(|column| format!("{} {}", column, direction.to_sql()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// One JSON object per matching row
    pub fn select_sql(table: &str, query: &Query) -> Result<(String, Vec<Value>), StoreError> {
        let mut values = Vec::new();
        let mut sql = format!("SELECT row_to_json(_r) FROM {} AS _r", quote_identifier(table)?);
        Self::push_clause(&mut sql, &Self::build_where_clause(table, &query.conditions, &mut values)?);
        Self::push_clause(&mut sql, &Self::build_order_clause(&query.order_by)?);
        Self::push_clause(&mut sql, &query.pagination.to_sql());
        Ok((sql, values))
    }

    /// Number of rows the query would return, pagination included
    pub fn count_sql(table: &str, query: &Query) -> Result<(String, Vec<Value>), StoreError> {
        let mut values = Vec::new();
        let mut inner = format!("SELECT 1 FROM {}", quote_identifier(table)?);
        Self::push_clause(&mut inner, &Self::build_where_clause(table, &query.conditions, &mut values)?);
        Self::push_clause(&mut inner, &query.pagination.to_sql());
        Ok((format!("SELECT COUNT(*) FROM ({}) AS _c", inner), values))
    }

    /// Insert a JSON array of rows bound as `$1`, returning the stored rows
    pub fn insert_sql(table: &str, columns: &[&str]) -> Result<String, StoreError> {
        let table = quote_identifier(table)?;
        let columns = Self::column_list(columns)?;
        Ok(format!(
            "WITH _ins AS (INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_recordset(NULL::{table}, $1) RETURNING *) SELECT row_to_json(_ins) FROM _ins"
        ))
    }

    /// Overwrite `columns` from the JSON object bound as `$1` on every row the query
    /// selects. WHERE placeholders start at `$2`.
    pub fn update_sql(
        table: &str,
        columns: &[&str],
        query: &Query,
    ) -> Result<(String, Vec<Value>), StoreError> {
        let name = table;
        let table = quote_identifier(table)?;
        let assignments = columns
            .iter()
            .map(|column| {
                quote_identifier(column).map(|column| {
                    format!(
                        "{column} = (SELECT {column} FROM jsonb_populate_record(NULL::{table}, $1))"
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        // $1 is the row document
        let mut values = vec![Value::Null];
        let mut sql = format!("UPDATE {} SET {}", table, assignments);
        Self::push_clause(&mut sql, &Self::build_where_clause(name, &query.conditions, &mut values)?);
        values.remove(0);
        Ok((sql, values))
    }

    pub fn delete_sql(table: &str, query: &Query) -> Result<(String, Vec<Value>), StoreError> {
        let mut values = Vec::new();
        let mut sql = format!("DELETE FROM {}", quote_identifier(table)?);
        Self::push_clause(&mut sql, &Self::build_where_clause(table, &query.conditions, &mut values)?);
        Ok((sql, values))
    }

    /// Related rows whose `foreign_key` is one of `keys`
    pub fn preload_sql(
        table: &str,
        foreign_key: &str,
        keys: Vec<Value>,
    ) -> Result<(String, Vec<Value>), StoreError> {
        let condition = Condition::new(foreign_key, Operator::In, Value::Array(keys));
        let mut values = Vec::new();
        let mut sql = format!("SELECT row_to_json(_r) FROM {} AS _r", quote_identifier(table)?);
        Self::push_clause(&mut sql, &Self::build_where_clause(table, &[condition], &mut values)?);
        Ok((sql, values))
    }

    fn column_list(columns: &[&str]) -> Result<String, StoreError> {
        Ok(columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "))
    }

    fn push_clause(sql: &mut String, clause: &str) {
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(clause);
        }
    }
}
