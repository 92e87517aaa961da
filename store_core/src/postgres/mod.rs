//! PostgreSQL storage engine
//!
//! Queries are rendered by [`SqlGenerator`] and executed through sqlx, either on the
//! pool or inside a transaction opened by [`PgTransactionScope`]. Rows come back as
//! `row_to_json` documents so the engine never needs to know column types.

mod scope;

pub use scope::PgTransactionScope;

use crate::engine::{Connection, RecordSchema, Row};
use crate::errors::StoreError;
use crate::query_builder::sql_generation::SqlGenerator;
use crate::query_builder::Query;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Bind a JSON value using the closest native PostgreSQL type. Strings stay text; the
/// generated SQL coerces them to the compared column's type.
macro_rules! bind_json_param {
    ($query:expr, $param:expr) => {
        match $param {
            Value::String(s) => $query.bind(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        $query.bind(i as i32)
                    } else {
                        $query.bind(i)
                    }
                } else if let Some(f) = n.as_f64() {
                    $query.bind(f)
                } else {
                    $query.bind(n.to_string())
                }
            }
            Value::Bool(b) => $query.bind(b),
            Value::Null => $query.bind(Option::<String>::None),
            other => $query.bind(sqlx::types::Json(other)),
        }
    };
}

type JsonQuery<'q> = sqlx::query::QueryScalar<'q, Postgres, Value, PgArguments>;
type CountQuery<'q> = sqlx::query::QueryScalar<'q, Postgres, i64, PgArguments>;
type RawQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

fn bind_rows_query<'q>(sql: &'q str, document: Option<Value>, values: Vec<Value>) -> JsonQuery<'q> {
    let mut query = sqlx::query_scalar::<_, Value>(sql);
    if let Some(document) = document {
        query = query.bind(sqlx::types::Json(document));
    }
    for value in values {
        query = bind_json_param!(query, value);
    }
    query
}

fn bind_count_query<'q>(sql: &'q str, values: Vec<Value>) -> CountQuery<'q> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for value in values {
        query = bind_json_param!(query, value);
    }
    query
}

fn bind_raw_query<'q>(sql: &'q str, document: Option<Value>, values: Vec<Value>) -> RawQuery<'q> {
    let mut query = sqlx::query(sql);
    if let Some(document) = document {
        query = query.bind(sqlx::types::Json(document));
    }
    for value in values {
        query = bind_json_param!(query, value);
    }
    query
}

/// Where statements run
#[derive(Clone)]
pub enum PgExecutor {
    Pool(PgPool),
    /// A transaction owned by a [`PgTransactionScope`]; `None` once it has finished
    Transaction(Arc<Mutex<Option<Transaction<'static, Postgres>>>>),
}

#[derive(Clone)]
pub struct PostgresConnection {
    executor: PgExecutor,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let executor = match self.executor {
            PgExecutor::Pool(_) => "pool",
            PgExecutor::Transaction(_) => "transaction",
        };
        f.debug_struct("PostgresConnection")
            .field("executor", &executor)
            .finish()
    }
}

impl PostgresConnection {
    pub fn new(pool: PgPool) -> Self {
        Self {
            executor: PgExecutor::Pool(pool),
        }
    }

    pub(crate) fn in_transaction(slot: Arc<Mutex<Option<Transaction<'static, Postgres>>>>) -> Self {
        Self {
            executor: PgExecutor::Transaction(slot),
        }
    }

    fn finished(table: &str) -> StoreError {
        StoreError::TransactionNotFound(format!("transaction used by {} already finished", table))
    }

    async fn fetch(
        &self,
        schema: &RecordSchema,
        operation: &str,
        sql: &str,
        document: Option<Value>,
        values: Vec<Value>,
    ) -> Result<Vec<Row>, StoreError> {
        trace_log!(sql = %sql, operation = %operation, "executing");
        let query = bind_rows_query(sql, document, values);
        let result = match &self.executor {
            PgExecutor::Pool(pool) => query.fetch_all(pool).await,
            PgExecutor::Transaction(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard.as_mut().ok_or_else(|| Self::finished(&schema.table))?;
                query.fetch_all(&mut **tx).await
            }
        };
        let documents =
            result.map_err(|e| StoreError::database_operation(&schema.table, operation, e))?;
        documents.into_iter().map(into_row).collect()
    }

    async fn fetch_count(
        &self,
        schema: &RecordSchema,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<u64, StoreError> {
        trace_log!(sql = %sql, "executing count");
        let query = bind_count_query(sql, values);
        let result = match &self.executor {
            PgExecutor::Pool(pool) => query.fetch_one(pool).await,
            PgExecutor::Transaction(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard.as_mut().ok_or_else(|| Self::finished(&schema.table))?;
                query.fetch_one(&mut **tx).await
            }
        };
        let count =
            result.map_err(|e| StoreError::database_operation(&schema.table, "count", e))?;
        Ok(count.max(0) as u64)
    }

    async fn execute(
        &self,
        schema: &RecordSchema,
        operation: &str,
        sql: &str,
        document: Option<Value>,
        values: Vec<Value>,
    ) -> Result<u64, StoreError> {
        trace_log!(sql = %sql, operation = %operation, "executing");
        let query = bind_raw_query(sql, document, values);
        let result = match &self.executor {
            PgExecutor::Pool(pool) => query.execute(pool).await,
            PgExecutor::Transaction(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard.as_mut().ok_or_else(|| Self::finished(&schema.table))?;
                query.execute(&mut **tx).await
            }
        };
        result
            .map(|done| done.rows_affected())
            .map_err(|e| StoreError::database_operation(&schema.table, operation, e))
    }

    /// Attach the rows of every requested relation
    async fn preload(
        &self,
        schema: &RecordSchema,
        query: &Query,
        rows: &mut [Row],
    ) -> Result<(), StoreError> {
        for name in query.preloads() {
            let relation = schema.relation(name)?;

            let mut keys: Vec<Value> = Vec::new();
            for row in rows.iter() {
                if let Some(key) = row.get(relation.references).filter(|key| !key.is_null()) {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }

            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            if !keys.is_empty() {
                let (sql, values) =
                    SqlGenerator::preload_sql(relation.table, relation.foreign_key, keys)?;
                let related_schema = RecordSchema::new(relation.table, relation.foreign_key);
                for child in self.fetch(&related_schema, "preload", &sql, None, values).await? {
                    let key = child
                        .get(relation.foreign_key)
                        .map(Value::to_string)
                        .unwrap_or_default();
                    grouped.entry(key).or_default().push(Value::Object(child));
                }
            }

            for row in rows.iter_mut() {
                let key = row
                    .get(relation.references)
                    .map(Value::to_string)
                    .unwrap_or_default();
                let children = grouped.get(&key).cloned().unwrap_or_default();
                row.insert(relation.field.to_string(), Value::Array(children));
            }
        }
        Ok(())
    }

    fn require_conditions(
        schema: &RecordSchema,
        query: &Query,
        operation: &str,
    ) -> Result<(), StoreError> {
        if query.has_conditions() {
            Ok(())
        } else {
            Err(StoreError::missing_where(&schema.table, operation))
        }
    }

    /// Mutations only look at conditions
    fn selection(query: &Query) -> Query {
        query
            .conditions()
            .iter()
            .cloned()
            .fold(Query::new(), Query::filter)
    }
}

fn into_row(document: Value) -> Result<Row, StoreError> {
    match document {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Serialization(format!(
            "expected a row object, got {}",
            other
        ))),
    }
}

/// Split rows into runs that share the same column set, keeping order
fn group_by_columns(rows: Vec<Row>) -> Vec<(Vec<String>, Vec<Row>)> {
    let mut groups: Vec<(Vec<String>, Vec<Row>)> = Vec::new();
    for row in rows {
        let columns: Vec<String> = row.keys().cloned().collect();
        match groups.last_mut() {
            Some((current, members)) if *current == columns => members.push(row),
            _ => groups.push((columns, vec![row])),
        }
    }
    groups
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn find_first(&self, schema: &RecordSchema, query: &Query) -> Result<Row, StoreError> {
        let limit = query.pagination().limit.map_or(1, |limit| limit.min(1));
        let first = query.clone().limit(limit);
        let mut rows = self.find_all(schema, &first).await?;
        if rows.is_empty() {
            return Err(StoreError::not_found(&schema.table));
        }
        Ok(rows.swap_remove(0))
    }

    async fn find_all(&self, schema: &RecordSchema, query: &Query) -> Result<Vec<Row>, StoreError> {
        let (sql, values) = SqlGenerator::select_sql(&schema.table, query)?;
        let mut rows = self.fetch(schema, "find", &sql, None, values).await?;
        self.preload(schema, query, &mut rows).await?;
        Ok(rows)
    }

    async fn count(&self, schema: &RecordSchema, query: &Query) -> Result<u64, StoreError> {
        let (sql, values) = SqlGenerator::count_sql(&schema.table, query)?;
        self.fetch_count(schema, &sql, values).await
    }

    async fn insert(&self, schema: &RecordSchema, row: Row) -> Result<Row, StoreError> {
        let mut stored = self.insert_batch(schema, vec![row]).await?;
        stored
            .pop()
            .ok_or_else(|| StoreError::Storage(format!("insert into {} returned no row", schema.table)))
    }

    async fn insert_batch(&self, schema: &RecordSchema, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let groups = group_by_columns(rows);
        let mut statements = Vec::with_capacity(groups.len());
        for (columns, members) in groups {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            let sql = SqlGenerator::insert_sql(&schema.table, &columns)?;
            let document = Value::Array(members.into_iter().map(Value::Object).collect());
            statements.push((sql, document));
        }

        // Several statements on the pool need their own transaction to stay atomic
        if let (PgExecutor::Pool(pool), true) = (&self.executor, statements.len() > 1) {
            let tx = pool
                .begin()
                .await
                .map_err(|e| StoreError::database_operation(&schema.table, "begin", e))?;
            let slot = Arc::new(Mutex::new(Some(tx)));
            let scoped = Self::in_transaction(slot.clone());

            let mut stored = Vec::new();
            for (sql, document) in statements {
                stored.extend(scoped.fetch(schema, "insert", &sql, Some(document), Vec::new()).await?);
            }

            let tx = slot.lock().await.take().ok_or_else(|| Self::finished(&schema.table))?;
            tx.commit()
                .await
                .map_err(|e| StoreError::database_operation(&schema.table, "commit", e))?;
            return Ok(stored);
        }

        let mut stored = Vec::new();
        for (sql, document) in statements {
            stored.extend(self.fetch(schema, "insert", &sql, Some(document), Vec::new()).await?);
        }
        Ok(stored)
    }

    async fn save(&self, schema: &RecordSchema, query: &Query, row: Row) -> Result<u64, StoreError> {
        Self::require_conditions(schema, query, "save")?;
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let (sql, values) = SqlGenerator::update_sql(&schema.table, &columns, &Self::selection(query))?;
        self.execute(schema, "save", &sql, Some(Value::Object(row)), values).await
    }

    async fn update_columns(
        &self,
        schema: &RecordSchema,
        query: &Query,
        row: Row,
    ) -> Result<u64, StoreError> {
        Self::require_conditions(schema, query, "update_columns")?;
        if row.is_empty() {
            return Ok(0);
        }
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let (sql, values) = SqlGenerator::update_sql(&schema.table, &columns, &Self::selection(query))?;
        self.execute(schema, "update_columns", &sql, Some(Value::Object(row)), values).await
    }

    async fn delete(&self, schema: &RecordSchema, query: &Query) -> Result<u64, StoreError> {
        Self::require_conditions(schema, query, "delete")?;
        let (sql, values) = SqlGenerator::delete_sql(&schema.table, &Self::selection(query))?;
        self.execute(schema, "delete", &sql, None, values).await
    }
}
