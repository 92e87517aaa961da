use super::PostgresConnection;
use crate::engine::Connection;
use crate::errors::StoreError;
use crate::transaction::{Context, FinishedTransaction, TransactionScope, TxId};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type TransactionSlot = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Transactions on a pool, looked up by the id carried in the [`Context`].
///
/// A store resolving a context bound to an active transaction runs on that transaction's
/// connection and a context without a transaction gets the pool. A context bound to a
/// transaction that is no longer active fails instead of falling back to the pool.
pub struct PgTransactionScope {
    pool: PgPool,
    active: std::sync::Mutex<HashMap<TxId, TransactionSlot>>,
}

impl std::fmt::Debug for PgTransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.active.lock().map(|active| active.len()).unwrap_or(0);
        f.debug_struct("PgTransactionScope")
            .field("active_transactions", &active)
            .finish()
    }
}

impl PgTransactionScope {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            active: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn registry(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<TxId, TransactionSlot>>, StoreError> {
        self.active
            .lock()
            .map_err(|_| StoreError::Storage("transaction registry lock poisoned".to_string()))
    }

    /// Open a transaction and return `ctx` bound to it
    pub async fn begin(&self, ctx: &Context) -> Result<Context, StoreError> {
        let tx = ctx
            .run(async {
                self.pool
                    .begin()
                    .await
                    .map_err(|e| StoreError::database_operation("-", "begin", e))
            })
            .await?;

        let id = TxId::new();
        self.registry()?.insert(id, Arc::new(Mutex::new(Some(tx))));
        tracing::debug!(tx = %id, "transaction started");
        Ok(ctx.with_transaction(id))
    }

    pub async fn commit(&self, ctx: &Context) -> Result<(), StoreError> {
        let (id, tx) = self.take(ctx).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::database_operation("-", "commit", e))?;
        tracing::debug!(tx = %id, "transaction committed");
        Ok(())
    }

    pub async fn rollback(&self, ctx: &Context) -> Result<(), StoreError> {
        let (id, tx) = self.take(ctx).await?;
        tx.rollback()
            .await
            .map_err(|e| StoreError::database_operation("-", "rollback", e))?;
        tracing::debug!(tx = %id, "transaction rolled back");
        Ok(())
    }

    async fn take(
        &self,
        ctx: &Context,
    ) -> Result<(TxId, Transaction<'static, Postgres>), StoreError> {
        let id = ctx
            .transaction()
            .ok_or_else(|| StoreError::TransactionNotFound("<none>".to_string()))?;
        let slot = self
            .registry()?
            .remove(&id)
            .ok_or_else(|| StoreError::TransactionNotFound(id.to_string()))?;
        // waits for a statement still running on the transaction
        let tx = slot
            .lock()
            .await
            .take()
            .ok_or_else(|| StoreError::TransactionNotFound(id.to_string()))?;
        Ok((id, tx))
    }

    pub fn active_transactions(&self) -> usize {
        self.registry().map(|active| active.len()).unwrap_or(0)
    }
}

impl TransactionScope for PgTransactionScope {
    fn resolve(&self, ctx: &Context) -> Arc<dyn Connection> {
        let Some(id) = ctx.transaction() else {
            return Arc::new(PostgresConnection::new(self.pool.clone()));
        };
        let slot = self
            .active
            .lock()
            .ok()
            .and_then(|active| active.get(&id).cloned());
        match slot {
            Some(slot) => Arc::new(PostgresConnection::in_transaction(slot)),
            None => Arc::new(FinishedTransaction::new(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RecordSchema;
    use crate::query_builder::Query;
    use serde_json::json;

    fn lazy_scope() -> PgTransactionScope {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        PgTransactionScope::new(pool)
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_not_run_on_the_pool() {
        let scope = lazy_scope();
        let ctx = Context::new().with_transaction(TxId::new());
        let schema = RecordSchema::new("users", "id");

        let err = scope
            .resolve(&ctx)
            .update_columns(
                &schema,
                &Query::new().where_eq("id", json!(1)),
                serde_json::Map::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TransactionNotFound(_)));

        let err = scope.commit(&ctx).await.unwrap_err();
        assert!(matches!(err, StoreError::TransactionNotFound(_)));
        assert_eq!(scope.active_transactions(), 0);
    }
}
