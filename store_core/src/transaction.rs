//! Request context and transaction resolution
//!
//! The [`Context`] travels with every store call. It carries the id of the transaction
//! the caller opened (if any), a cancellation token and an optional deadline. A
//! [`TransactionScope`] turns a context into the connection the operation should run
//! on; the store never begins or ends transactions itself.

use crate::engine::{Connection, RecordSchema, Row};
use crate::errors::StoreError;
use crate::query_builder::Query;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of a transaction opened through a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(Uuid);

impl TxId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    transaction: Option<TxId>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same cancellation and deadline, bound to `tx`
    pub fn with_transaction(&self, tx: TxId) -> Self {
        Self {
            transaction: Some(tx),
            ..self.clone()
        }
    }

    pub fn without_transaction(&self) -> Self {
        Self {
            transaction: None,
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Keeps the earlier of the existing and the new deadline
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Child context: cancelling the parent cancels it, not the other way round
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    pub fn transaction(&self) -> Option<TxId> {
        self.transaction
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Error to report if the context is already done
    pub fn err(&self) -> Option<StoreError> {
        if self.is_cancelled() {
            return Some(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(StoreError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `operation` unless the context is cancelled or its deadline passes first
    pub async fn run<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            _ = deadline => Err(StoreError::DeadlineExceeded),
            result = operation => result,
        }
    }
}

/// Resolves the connection an operation should use.
///
/// Returns the transaction bound to `ctx` when one is active and the default connection
/// when `ctx` carries no transaction. A context bound to a transaction the scope does
/// not hold gets a [`FinishedTransaction`], never the default connection. Must be
/// idempotent and free of side effects.
pub trait TransactionScope: Send + Sync {
    fn resolve(&self, ctx: &Context) -> Arc<dyn Connection>;
}

impl<T: TransactionScope + ?Sized> TransactionScope for Arc<T> {
    fn resolve(&self, ctx: &Context) -> Arc<dyn Connection> {
        (**self).resolve(ctx)
    }
}

/// What a scope hands out for a context bound to a transaction it does not hold
/// (finished, rolled back or never begun there). Every call fails with
/// [`StoreError::TransactionNotFound`].
#[derive(Debug, Clone)]
pub struct FinishedTransaction {
    tx: String,
}

impl FinishedTransaction {
    pub fn new(tx: TxId) -> Self {
        Self { tx: tx.to_string() }
    }

    fn error(&self) -> StoreError {
        StoreError::TransactionNotFound(self.tx.clone())
    }
}

#[async_trait]
impl Connection for FinishedTransaction {
    async fn find_first(&self, _schema: &RecordSchema, _query: &Query) -> Result<Row, StoreError> {
        Err(self.error())
    }

    async fn find_all(&self, _schema: &RecordSchema, _query: &Query) -> Result<Vec<Row>, StoreError> {
        Err(self.error())
    }

    async fn count(&self, _schema: &RecordSchema, _query: &Query) -> Result<u64, StoreError> {
        Err(self.error())
    }

    async fn insert(&self, _schema: &RecordSchema, _row: Row) -> Result<Row, StoreError> {
        Err(self.error())
    }

    async fn insert_batch(&self, _schema: &RecordSchema, _rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        Err(self.error())
    }

    async fn save(&self, _schema: &RecordSchema, _query: &Query, _row: Row) -> Result<u64, StoreError> {
        Err(self.error())
    }

    async fn update_columns(
        &self,
        _schema: &RecordSchema,
        _query: &Query,
        _row: Row,
    ) -> Result<u64, StoreError> {
        Err(self.error())
    }

    async fn delete(&self, _schema: &RecordSchema, _query: &Query) -> Result<u64, StoreError> {
        Err(self.error())
    }
}

/// Scope without transaction support: every context gets the same connection
#[derive(Clone)]
pub struct DirectScope(Arc<dyn Connection>);

impl DirectScope {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self(connection)
    }
}

impl TransactionScope for DirectScope {
    fn resolve(&self, _ctx: &Context) -> Arc<dyn Connection> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = Context::new();
        let value = ctx.run(async { Ok::<_, StoreError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = Context::new();
        ctx.cancel();

        let result = ctx
            .run(async { Ok::<_, StoreError>(()) })
            .await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_while_running() {
        let ctx = Context::new();
        let canceller = ctx.clone();

        let result = ctx
            .run(async move {
                canceller.cancel();
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::DeadlineExceeded)));
    }

    #[test]
    fn test_transaction_binding() {
        let tx = TxId::new();
        let ctx = Context::new().with_transaction(tx);
        assert_eq!(ctx.transaction(), Some(tx));
        assert_eq!(ctx.without_transaction().transaction(), None);
    }

    #[test]
    fn test_child_cancellation() {
        let parent = Context::new();
        let child = parent.child();

        child.cancel();
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
