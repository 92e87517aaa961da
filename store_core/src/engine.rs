//! Storage engine boundary
//!
//! A [`Connection`] executes already-compiled [`Query`]s against one table at a time.
//! Rows are JSON objects keyed by physical column name; the store takes care of turning
//! them into records.

use crate::errors::StoreError;
use crate::field_map::FieldColumnMap;
use crate::query_builder::Query;
use crate::traits::{Record, Relation};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored row, keyed by column
pub type Row = Map<String, Value>;

/// What an engine needs to know about the table behind a record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub table: String,
    /// Physical name of the primary key column
    pub primary_key: String,
    /// Relations as declared; `foreign_key` and `references` are column names
    pub relations: Vec<Relation>,
}

impl RecordSchema {
    pub fn new(table: &str, primary_key: &str) -> Self {
        Self {
            table: table.to_string(),
            primary_key: primary_key.to_string(),
            relations: Vec::new(),
        }
    }

    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }

    pub fn of<R: Record>(field_map: &FieldColumnMap) -> Self {
        let primary_key = field_map.resolve(R::primary_key()).to_string();
        Self::new(R::table_name(), &primary_key).with_relations(R::relations().to_vec())
    }

    pub fn relation(&self, name: &str) -> Result<&Relation, StoreError> {
        self.relations
            .iter()
            .find(|relation| relation.field == name)
            .ok_or_else(|| StoreError::UnknownRelation {
                table: self.table.clone(),
                relation: name.to_string(),
            })
    }
}

/// The operations a storage engine offers the store.
///
/// Mutations ignore ordering and pagination and must refuse to run without at least one
/// condition ([`StoreError::MissingWhereClause`]).
#[async_trait]
pub trait Connection: Send + Sync {
    /// First row matching `query`; [`StoreError::NotFound`] when there is none
    async fn find_first(&self, schema: &RecordSchema, query: &Query) -> Result<Row, StoreError>;

    async fn find_all(&self, schema: &RecordSchema, query: &Query)
        -> Result<Vec<Row>, StoreError>;

    /// Rows `query` would return, pagination applied
    async fn count(&self, schema: &RecordSchema, query: &Query) -> Result<u64, StoreError>;

    /// Insert one row and return it as stored (generated key included)
    async fn insert(&self, schema: &RecordSchema, row: Row) -> Result<Row, StoreError>;

    async fn insert_batch(
        &self,
        schema: &RecordSchema,
        rows: Vec<Row>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Overwrite every column present in `row` on the selected rows
    async fn save(&self, schema: &RecordSchema, query: &Query, row: Row)
        -> Result<u64, StoreError>;

    /// Same contract as `save`; callers pass only the columns that should change
    async fn update_columns(
        &self,
        schema: &RecordSchema,
        query: &Query,
        row: Row,
    ) -> Result<u64, StoreError>;

    async fn delete(&self, schema: &RecordSchema, query: &Query) -> Result<u64, StoreError>;
}
