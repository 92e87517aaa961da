//! Store operations
//!
//! Each operation compiles the caller's params, resolves the connection for the
//! context and runs a single engine call (one per chunk for `create_many`) under the
//! context's cancellation and deadline.

use super::core::Store;
use crate::errors::StoreError;
use crate::params::Params;
use crate::query_builder::Query;
use crate::traits::{Entity, EntityStore, Record};
use crate::transaction::Context;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
impl<E, R> EntityStore<E> for Store<E, R>
where
    E: Entity + Default + Send + Sync + 'static,
    R: Record<Id = E::Id>,
{
    async fn get(&self, ctx: &Context, params: &Params) -> Result<E, StoreError> {
        Ok(self.find(ctx, params).await?.unwrap_or_default())
    }

    async fn find(&self, ctx: &Context, params: &Params) -> Result<Option<E>, StoreError> {
        let query = self.scope_builder.query(params);
        tracing::debug!(table = %self.table(), operation = "find", params = params.len());

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        match ctx.run(connection.find_first(&self.schema, &query)).await {
            Ok(row) => Ok(Some(self.row_to_entity(row)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn list(&self, ctx: &Context, params: &Params) -> Result<Vec<E>, StoreError> {
        let query = self.scope_builder.query(params);
        tracing::debug!(table = %self.table(), operation = "list", params = params.len());

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        let rows = ctx.run(connection.find_all(&self.schema, &query)).await?;
        let records = rows
            .into_iter()
            .map(|row| self.row_to_record(row))
            .collect::<Result<Vec<R>, _>>()?;
        Ok(self.converter.to_many_entities(&records))
    }

    async fn count(&self, ctx: &Context, params: &Params) -> Result<u64, StoreError> {
        let query = self.scope_builder.query(params);
        tracing::debug!(table = %self.table(), operation = "count", params = params.len());

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        ctx.run(connection.count(&self.schema, &query)).await
    }

    async fn exists(&self, ctx: &Context, params: &Params) -> Result<bool, StoreError> {
        let query = self.scope_builder.query(params).limit(1);
        tracing::debug!(table = %self.table(), operation = "exists", params = params.len());

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        Ok(ctx.run(connection.count(&self.schema, &query)).await? > 0)
    }

    async fn create(&self, ctx: &Context, entity: &E) -> Result<E::Id, StoreError> {
        tracing::debug!(table = %self.table(), operation = "create");

        let row = self.insert_row(entity)?;
        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        let stored = ctx.run(connection.insert(&self.schema, row)).await?;
        self.stored_id(&stored, entity.id())
    }

    async fn create_many(&self, ctx: &Context, entities: &[E]) -> Result<Vec<E::Id>, StoreError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(
            table = %self.table(),
            operation = "create_many",
            entities = entities.len(),
            batch_size = self.batch_size
        );

        let rows = entities
            .iter()
            .map(|entity| self.insert_row(entity))
            .collect::<Result<Vec<_>, _>>()?;

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        let mut ids = Vec::with_capacity(entities.len());
        for (chunk, originals) in rows
            .chunks(self.batch_size)
            .zip(entities.chunks(self.batch_size))
        {
            let stored = ctx
                .run(connection.insert_batch(&self.schema, chunk.to_vec()))
                .await?;
            for (row, entity) in stored.iter().zip(originals) {
                ids.push(self.stored_id(row, entity.id())?);
            }
        }
        Ok(ids)
    }

    async fn update(&self, ctx: &Context, entity: &E, params: &Params) -> Result<u64, StoreError> {
        tracing::debug!(table = %self.table(), operation = "update", params = params.len());

        let record = self.converter.to_record(entity);
        let mut row = self.record_to_row(&record)?;
        let id = row.remove(self.primary_key()).unwrap_or(Value::Null);

        let query = if params.is_empty() {
            if entity.is_new() {
                return Err(StoreError::Validation(format!(
                    "update on {} without params needs an entity with an id",
                    self.table()
                )));
            }
            Query::new().where_eq(self.primary_key(), id)
        } else {
            self.scope_builder.query(params)
        };

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        ctx.run(connection.save(&self.schema, &query, row)).await
    }

    async fn partial_update(
        &self,
        ctx: &Context,
        entity: &E,
        params: &Params,
    ) -> Result<u64, StoreError> {
        let record = self.converter.to_record(entity);
        let mut row = self.record_to_row(&record)?;
        let id = row.remove(self.primary_key()).unwrap_or(Value::Null);
        row.retain(|column, value| !self.is_unset(column, value));

        if row.is_empty() {
            tracing::debug!(table = %self.table(), "partial update has nothing to write");
            return Ok(0);
        }
        tracing::debug!(
            table = %self.table(),
            operation = "partial_update",
            params = params.len(),
            columns = row.len()
        );

        let mut query = self.scope_builder.query(params);
        if !entity.is_new() {
            query = query.where_eq(self.primary_key(), id);
        }

        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        ctx.run(connection.update_columns(&self.schema, &query, row))
            .await
    }

    async fn delete(&self, ctx: &Context, params: &Params) -> Result<u64, StoreError> {
        if !params.has_filters() {
            return Err(StoreError::Validation(format!(
                "delete on {} needs at least one filter",
                self.table()
            )));
        }
        tracing::debug!(table = %self.table(), operation = "delete", params = params.len());

        let query = self.scope_builder.query(params);
        let ctx = self.context(ctx);
        let connection = self.connection(&ctx);
        ctx.run(connection.delete(&self.schema, &query)).await
    }
}
