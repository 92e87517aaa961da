use super::MemoryConnection;
use crate::engine::Connection;
use crate::errors::StoreError;
use crate::transaction::{Context, FinishedTransaction, TransactionScope, TxId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Snapshot transactions over a [`MemoryConnection`].
///
/// `begin` copies the current data; the transaction reads and writes its copy only.
/// `commit` replaces every table the transaction wrote to with its version, so
/// concurrent writes to those tables made outside the transaction are lost.
#[derive(Debug, Default)]
pub struct MemoryTransactionScope {
    base: Arc<MemoryConnection>,
    active: Mutex<HashMap<TxId, Arc<MemoryConnection>>>,
}

impl MemoryTransactionScope {
    pub fn new(base: MemoryConnection) -> Self {
        Self {
            base: Arc::new(base),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Connection used outside transactions
    pub fn connection(&self) -> &MemoryConnection {
        &self.base
    }

    fn active(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TxId, Arc<MemoryConnection>>>, StoreError> {
        self.active
            .lock()
            .map_err(|_| StoreError::Storage("transaction registry lock poisoned".to_string()))
    }

    /// Open a transaction and return `ctx` bound to it
    pub fn begin(&self, ctx: &Context) -> Result<Context, StoreError> {
        let tx = TxId::new();
        let snapshot = self.base.snapshot()?;
        self.active()?.insert(tx, Arc::new(snapshot));
        tracing::debug!(tx = %tx, "memory transaction started");
        Ok(ctx.with_transaction(tx))
    }

    pub fn commit(&self, ctx: &Context) -> Result<(), StoreError> {
        let (tx, connection) = self.take(ctx)?;
        self.base.absorb(&connection)?;
        tracing::debug!(tx = %tx, "memory transaction committed");
        Ok(())
    }

    pub fn rollback(&self, ctx: &Context) -> Result<(), StoreError> {
        let (tx, _) = self.take(ctx)?;
        tracing::debug!(tx = %tx, "memory transaction rolled back");
        Ok(())
    }

    fn take(&self, ctx: &Context) -> Result<(TxId, Arc<MemoryConnection>), StoreError> {
        let tx = ctx
            .transaction()
            .ok_or_else(|| StoreError::TransactionNotFound("<none>".to_string()))?;
        let connection = self
            .active()?
            .remove(&tx)
            .ok_or_else(|| StoreError::TransactionNotFound(tx.to_string()))?;
        Ok((tx, connection))
    }
}

impl TransactionScope for MemoryTransactionScope {
    fn resolve(&self, ctx: &Context) -> Arc<dyn Connection> {
        let Some(tx) = ctx.transaction() else {
            return self.base.clone();
        };
        let bound = self
            .active
            .lock()
            .ok()
            .and_then(|active| active.get(&tx).cloned());
        match bound {
            Some(connection) => connection,
            None => Arc::new(FinishedTransaction::new(tx)),
        }
    }
}
