//! In-memory storage engine
//!
//! Tables are vectors of JSON rows guarded by a `RwLock`. Integer primary keys are
//! generated per table. Every call is recorded in a journal so tests can check what
//! reached the engine and how.

mod matching;
mod scope;

pub use scope::MemoryTransactionScope;

use crate::engine::{Connection, RecordSchema, Row};
use crate::errors::StoreError;
use crate::query_builder::Query;
use async_trait::async_trait;
use matching::{column, matches_all, sort_rows, values_equal};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// One call that reached the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: &'static str,
    pub table: String,
    /// Selection for reads and mutations; `None` for inserts
    pub query: Option<Query>,
    /// Rows passed in (inserts)
    pub rows: usize,
    /// Columns written (inserts and updates), sorted
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryTable {
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    // tables written since the last snapshot
    dirty: HashSet<String>,
}

impl MemoryState {
    fn table_mut(&mut self, name: &str) -> &mut MemoryTable {
        self.dirty.insert(name.to_string());
        self.tables.entry(name.to_string()).or_default()
    }

    fn rows(&self, name: &str) -> &[Row] {
        self.tables
            .get(name)
            .map(|table| table.rows.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    state: Arc<RwLock<MemoryState>>,
    journal: Arc<Mutex<Vec<Call>>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent copy of the current data sharing this connection's journal
    pub(crate) fn snapshot(&self) -> Result<Self, StoreError> {
        let mut state = self.read()?.clone();
        state.dirty.clear();
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            journal: self.journal.clone(),
        })
    }

    /// Replace the tables `other` wrote to with its versions
    pub(crate) fn absorb(&self, other: &MemoryConnection) -> Result<(), StoreError> {
        let source = other.read()?;
        let mut target = self.write()?;
        for name in &source.dirty {
            if let Some(table) = source.tables.get(name) {
                target.tables.insert(name.clone(), table.clone());
                target.dirty.insert(name.clone());
            }
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Storage("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Storage("memory store lock poisoned".to_string()))
    }

    /// Put rows in place as stored, bypassing the journal. Generated keys continue after
    /// the largest integer key seeded, whatever the key column is called.
    pub fn seed(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.table_mut(table).rows.extend(rows);
        Ok(())
    }

    /// Current contents of `table` in storage order
    pub fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self.read()?.rows(table).to_vec())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.journal.lock() {
            calls.clear();
        }
    }

    fn record(&self, operation: &'static str, table: &str, query: Option<&Query>, rows: &[&Row]) {
        let mut columns: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        columns.sort();

        if let Ok(mut calls) = self.journal.lock() {
            calls.push(Call {
                operation,
                table: table.to_string(),
                query: query.cloned(),
                rows: rows.len(),
                columns,
            });
        }
    }

    fn select(
        state: &MemoryState,
        schema: &RecordSchema,
        query: &Query,
    ) -> Result<Vec<Row>, StoreError> {
        let mut rows: Vec<Row> = state
            .rows(&schema.table)
            .iter()
            .filter(|row| matches_all(row, query.conditions()))
            .cloned()
            .collect();
        sort_rows(&mut rows, query.ordering());
        let mut rows = query.pagination().slice(rows);

        for name in query.preloads() {
            let relation = schema.relation(name)?;
            let related = state.rows(relation.table);
            for row in rows.iter_mut() {
                let key = column(row, relation.references);
                let children: Vec<Value> = related
                    .iter()
                    .filter(|child| values_equal(column(child, relation.foreign_key), key))
                    .cloned()
                    .map(Value::Object)
                    .collect();
                row.insert(relation.field.to_string(), Value::Array(children));
            }
        }

        Ok(rows)
    }

    fn insert_row(
        table: &mut MemoryTable,
        schema: &RecordSchema,
        mut row: Row,
    ) -> Result<Row, StoreError> {
        let pk = schema.primary_key.as_str();
        match row.get(pk).filter(|id| !id.is_null()).cloned() {
            None => {
                let highest = table
                    .rows
                    .iter()
                    .filter_map(|existing| column(existing, pk).as_i64())
                    .max()
                    .unwrap_or(0);
                table.next_id = table.next_id.max(highest) + 1;
                row.insert(pk.to_string(), Value::from(table.next_id));
            }
            Some(id) => {
                if table.rows.iter().any(|existing| values_equal(column(existing, pk), &id)) {
                    return Err(StoreError::Storage(format!(
                        "duplicate key {} = {} in {}",
                        pk, id, schema.table
                    )));
                }
                if let Some(id) = id.as_i64() {
                    table.next_id = table.next_id.max(id);
                }
            }
        }
        table.rows.push(row.clone());
        Ok(row)
    }

    fn assign(
        &self,
        operation: &'static str,
        schema: &RecordSchema,
        query: &Query,
        row: Row,
    ) -> Result<u64, StoreError> {
        self.record(operation, &schema.table, Some(query), &[&row]);
        if !query.has_conditions() {
            return Err(StoreError::missing_where(&schema.table, operation));
        }

        let mut state = self.write()?;
        let table = state.table_mut(&schema.table);
        let mut affected = 0;
        for existing in table
            .rows
            .iter_mut()
            .filter(|existing| matches_all(existing, query.conditions()))
        {
            for (column, value) in &row {
                existing.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
        Ok(affected)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn find_first(&self, schema: &RecordSchema, query: &Query) -> Result<Row, StoreError> {
        self.record("find_first", &schema.table, Some(query), &[]);
        let state = self.read()?;
        Self::select(&state, schema, query)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(&schema.table))
    }

    async fn find_all(&self, schema: &RecordSchema, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.record("find_all", &schema.table, Some(query), &[]);
        let state = self.read()?;
        Self::select(&state, schema, query)
    }

    async fn count(&self, schema: &RecordSchema, query: &Query) -> Result<u64, StoreError> {
        self.record("count", &schema.table, Some(query), &[]);
        let state = self.read()?;
        let matching = state
            .rows(&schema.table)
            .iter()
            .filter(|row| matches_all(row, query.conditions()))
            .collect::<Vec<_>>();
        Ok(query.pagination().slice(matching).len() as u64)
    }

    async fn insert(&self, schema: &RecordSchema, row: Row) -> Result<Row, StoreError> {
        self.record("insert", &schema.table, None, &[&row]);
        let mut state = self.write()?;
        Self::insert_row(state.table_mut(&schema.table), schema, row)
    }

    async fn insert_batch(&self, schema: &RecordSchema, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        self.record("insert_batch", &schema.table, None, &rows.iter().collect::<Vec<_>>());
        let mut state = self.write()?;
        let table = state.table_mut(&schema.table);

        // all or nothing
        let mut staged = table.clone();
        let stored = rows
            .into_iter()
            .map(|row| Self::insert_row(&mut staged, schema, row))
            .collect::<Result<Vec<_>, _>>()?;
        *table = staged;
        Ok(stored)
    }

    async fn save(&self, schema: &RecordSchema, query: &Query, row: Row) -> Result<u64, StoreError> {
        self.assign("save", schema, query, row)
    }

    async fn update_columns(&self, schema: &RecordSchema, query: &Query, row: Row) -> Result<u64, StoreError> {
        self.assign("update_columns", schema, query, row)
    }

    async fn delete(&self, schema: &RecordSchema, query: &Query) -> Result<u64, StoreError> {
        self.record("delete", &schema.table, Some(query), &[]);
        if !query.has_conditions() {
            return Err(StoreError::missing_where(&schema.table, "delete"));
        }

        let mut state = self.write()?;
        let table = state.table_mut(&schema.table);
        let before = table.rows.len();
        table
            .rows
            .retain(|row| !matches_all(row, query.conditions()));
        Ok((before - table.rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Relation;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    fn users() -> RecordSchema {
        RecordSchema::new("users", "id").with_relations(vec![Relation {
            field: "posts",
            table: "posts",
            foreign_key: "author_id",
            references: "id",
        }])
    }

    #[tokio::test]
    async fn test_insert_generates_ids() {
        let conn = MemoryConnection::new();
        let first = conn.insert(&users(), row(json!({"name": "a"}))).await.unwrap();
        let second = conn.insert(&users(), row(json!({"name": "b"}))).await.unwrap();

        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let conn = MemoryConnection::new();
        conn.insert(&users(), row(json!({"id": 5}))).await.unwrap();
        let err = conn.insert(&users(), row(json!({"id": 5}))).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        // generated ids continue after explicit ones
        let next = conn.insert(&users(), row(json!({"name": "x"}))).await.unwrap();
        assert_eq!(next["id"], json!(6));
    }

    #[tokio::test]
    async fn test_generated_keys_skip_seeded_rows() {
        let conn = MemoryConnection::new();
        let accounts = RecordSchema::new("accounts", "account_no");
        conn.seed(
            "accounts",
            vec![
                row(json!({"account_no": 1, "owner": "a"})),
                row(json!({"account_no": 7, "owner": "b"})),
            ],
        )
        .unwrap();

        let created = conn
            .insert(&accounts, row(json!({"owner": "c"})))
            .await
            .unwrap();
        assert_eq!(created["account_no"], json!(8));
        assert_eq!(conn.rows("accounts").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_batch_insert_is_atomic() {
        let conn = MemoryConnection::new();
        conn.seed("users", vec![row(json!({"id": 2}))]).unwrap();

        let result = conn
            .insert_batch(&users(), vec![row(json!({"id": 1})), row(json!({"id": 2}))])
            .await;
        assert!(result.is_err());
        assert_eq!(conn.rows("users").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mutations_require_conditions() {
        let conn = MemoryConnection::new();
        conn.seed("users", vec![row(json!({"id": 1, "name": "a"}))]).unwrap();

        let err = conn
            .save(&users(), &Query::new(), row(json!({"name": "b"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingWhereClause { .. }));

        let err = conn.delete(&users(), &Query::new().limit(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingWhereClause { .. }));

        assert_eq!(conn.rows("users").unwrap()[0]["name"], json!("a"));
    }

    #[tokio::test]
    async fn test_update_ignores_pagination() {
        let conn = MemoryConnection::new();
        conn.seed(
            "users",
            vec![
                row(json!({"id": 1, "team": "x", "name": "a"})),
                row(json!({"id": 2, "team": "x", "name": "b"})),
            ],
        )
        .unwrap();

        let query = Query::new().where_eq("team", json!("x")).limit(1);
        let affected = conn
            .update_columns(&users(), &query, row(json!({"name": "z"})))
            .await
            .unwrap();

        assert_eq!(affected, 2);
        assert!(conn
            .rows("users")
            .unwrap()
            .iter()
            .all(|r| r["name"] == json!("z")));
    }

    #[tokio::test]
    async fn test_preload_attaches_children() {
        let conn = MemoryConnection::new();
        conn.seed("users", vec![row(json!({"id": 1})), row(json!({"id": 2}))]).unwrap();
        conn.seed(
            "posts",
            vec![
                row(json!({"id": 10, "author_id": 1})),
                row(json!({"id": 11, "author_id": 1})),
            ],
        )
        .unwrap();

        let rows = conn
            .find_all(&users(), &Query::new().preload("posts"))
            .await
            .unwrap();

        assert_eq!(rows[0]["posts"].as_array().map(Vec::len), Some(2));
        assert_eq!(rows[1]["posts"], json!([]));

        let err = conn
            .find_all(&users(), &Query::new().preload("comments"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownRelation { .. }));
    }

    #[tokio::test]
    async fn test_count_honours_pagination() {
        let conn = MemoryConnection::new();
        conn.seed("users", (1..=5).map(|i| row(json!({"id": i}))).collect()).unwrap();

        assert_eq!(conn.count(&users(), &Query::new()).await.unwrap(), 5);
        assert_eq!(conn.count(&users(), &Query::new().limit(2)).await.unwrap(), 2);
        assert_eq!(conn.count(&users(), &Query::new().offset(4)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_journal_records_calls() {
        let conn = MemoryConnection::new();
        conn.insert(&users(), row(json!({"name": "a", "age": 3}))).await.unwrap();
        let _ = conn.find_first(&users(), &Query::new().where_eq("id", json!(99))).await;

        let calls = conn.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].operation, "insert");
        assert_eq!(calls[0].columns, vec!["age".to_string(), "name".to_string()]);
        assert_eq!(calls[1].operation, "find_first");

        conn.clear_calls();
        assert!(conn.calls().is_empty());
    }
}
