use crate::convert::{Converter, ReflectConverter};
use crate::engine::{Connection, RecordSchema, Row};
use crate::errors::StoreError;
use crate::field_map::{build_field_column_map, FieldColumnMap};
use crate::query_builder::ScopeBuilder;
use crate::traits::{Entity, Record};
use crate::transaction::{Context, TransactionScope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Rows per `insert_batch` call when no valid size is configured
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Generic store mapping entities `E` onto records `R`
pub struct Store<E, R> {
    pub(crate) converter: Arc<dyn Converter<E, R>>,
    pub(crate) scope_builder: Arc<ScopeBuilder>,
    pub(crate) scope: Arc<dyn TransactionScope>,
    pub(crate) schema: Arc<RecordSchema>,
    pub(crate) batch_size: usize,
    pub(crate) operation_timeout: Option<Duration>,
    /// `R::default()` keyed by column
    pub(crate) defaults: Arc<Row>,
}

impl<E, R> Clone for Store<E, R> {
    fn clone(&self) -> Self {
        Self {
            converter: self.converter.clone(),
            scope_builder: self.scope_builder.clone(),
            scope: self.scope.clone(),
            schema: self.schema.clone(),
            batch_size: self.batch_size,
            operation_timeout: self.operation_timeout,
            defaults: self.defaults.clone(),
        }
    }
}

impl<E, R> std::fmt::Debug for Store<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("table", &self.schema.table)
            .field("primary_key", &self.schema.primary_key)
            .field("columns", &self.scope_builder.field_map().len())
            .field("batch_size", &self.batch_size)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl<E, R> Store<E, R>
where
    E: Entity + Default + Send + Sync + 'static,
    R: Record<Id = E::Id>,
{
    pub fn table(&self) -> &str {
        &self.schema.table
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn field_map(&self) -> &FieldColumnMap {
        self.scope_builder.field_map()
    }

    pub fn scope_builder(&self) -> &ScopeBuilder {
        &self.scope_builder
    }

    /// `ctx` with the configured operation timeout applied
    pub(crate) fn context(&self, ctx: &Context) -> Context {
        match self.operation_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        }
    }

    pub(crate) fn connection(&self, ctx: &Context) -> Arc<dyn Connection> {
        self.scope.resolve(ctx)
    }

    pub(crate) fn primary_key(&self) -> &str {
        &self.schema.primary_key
    }

    /// Serialised record renamed to columns
    pub(crate) fn record_to_row(&self, record: &R) -> Result<Row, StoreError> {
        match serde_json::to_value(record)? {
            Value::Object(fields) => Ok(self.field_map().to_row(fields)),
            _ => Err(StoreError::NoMappableFields {
                record: std::any::type_name::<R>().to_string(),
            }),
        }
    }

    /// Row renamed to fields, laid over the record's defaults
    pub(crate) fn row_to_record(&self, row: Row) -> Result<R, StoreError> {
        let mut fields = match serde_json::to_value(R::default())? {
            Value::Object(fields) => fields,
            _ => serde_json::Map::new(),
        };
        fields.extend(self.field_map().from_row(row));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    pub(crate) fn row_to_entity(&self, row: Row) -> Result<E, StoreError> {
        let record = self.row_to_record(row)?;
        Ok(self.converter.to_entity(&record))
    }

    /// Row for inserting `entity`; a default id is left out so the engine assigns one
    pub(crate) fn insert_row(&self, entity: &E) -> Result<Row, StoreError> {
        let record = self.converter.to_record(entity);
        let mut row = self.record_to_row(&record)?;
        if record.is_new() {
            row.remove(self.primary_key());
        }
        Ok(row)
    }

    /// A column left at zero or at the record's default value is not written by a
    /// partial update
    pub(crate) fn is_unset(&self, column: &str, value: &Value) -> bool {
        is_zero(value) || self.defaults.get(column) == Some(value)
    }

    pub(crate) fn stored_id(&self, row: &Row, fallback: E::Id) -> Result<E::Id, StoreError> {
        match row.get(self.primary_key()) {
            Some(id) if !id.is_null() => Ok(serde_json::from_value(id.clone())?),
            _ => Ok(fallback),
        }
    }
}

/// Zero value of a column: `null`, `false`, `0`, `""`, `[]` or `{}`
fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Assembles a [`Store`]. Only the transaction scope is required.
pub struct StoreBuilder<E, R> {
    scope: Arc<dyn TransactionScope>,
    converter: Option<Arc<dyn Converter<E, R>>>,
    scope_builder: Option<ScopeBuilder>,
    batch_size: Option<i64>,
    operation_timeout: Option<Duration>,
    _phantom: PhantomData<fn() -> (E, R)>,
}

impl<E, R> StoreBuilder<E, R>
where
    E: Entity + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
    R: Record<Id = E::Id>,
{
    pub fn new(scope: Arc<dyn TransactionScope>) -> Self {
        Self {
            scope,
            converter: None,
            scope_builder: None,
            batch_size: None,
            operation_timeout: None,
            _phantom: PhantomData,
        }
    }

    /// Replace the default field-by-name converter
    pub fn with_converter(mut self, converter: impl Converter<E, R> + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Use a scope builder over a custom column map instead of the derived one
    pub fn with_scope_builder(mut self, scope_builder: ScopeBuilder) -> Self {
        self.scope_builder = Some(scope_builder);
        self
    }

    /// Values of zero or below fall back to [`DEFAULT_BATCH_SIZE`]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Deadline applied to every operation on top of the caller's context
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Fails only when the column map for `R` cannot be derived
    pub fn build(self) -> Result<Store<E, R>, StoreError> {
        let scope_builder = match self.scope_builder {
            Some(scope_builder) => scope_builder,
            None => ScopeBuilder::new(Arc::new(build_field_column_map::<R>()?)),
        };
        let converter = self
            .converter
            .unwrap_or_else(|| Arc::new(ReflectConverter::<E, R>::new()) as Arc<dyn Converter<E, R>>);
        let schema = RecordSchema::of::<R>(scope_builder.field_map());
        let defaults = match serde_json::to_value(R::default())? {
            Value::Object(fields) => scope_builder.field_map().to_row(fields),
            _ => Row::new(),
        };
        let batch_size = match self.batch_size {
            Some(size) if size > 0 => size as usize,
            _ => DEFAULT_BATCH_SIZE,
        };

        tracing::debug!(
            table = %schema.table,
            primary_key = %schema.primary_key,
            columns = scope_builder.field_map().len(),
            batch_size,
            "store built"
        );

        Ok(Store {
            converter,
            scope_builder: Arc::new(scope_builder),
            scope: self.scope,
            schema: Arc::new(schema),
            batch_size,
            operation_timeout: self.operation_timeout,
            defaults: Arc::new(defaults),
        })
    }
}
