//! Integration tests for transactional work against the in-memory engine

use chrono::{DateTime, TimeZone, Utc};
use flexstore::prelude::*;
use std::sync::Arc;

#[record_model]
#[record(table = "ledger_entries")]
pub struct LedgerRecord {
    #[primary_key]
    pub entry_id: Uuid,
    pub account: String,
    pub amount_cents: i64,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub account: String,
    pub amount_cents: i64,
    pub booked_at: DateTime<Utc>,
}

impl Entity for LedgerEntry {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.entry_id
    }
}

fn entry(account: &str, amount_cents: i64, day: u32) -> LedgerEntry {
    LedgerEntry {
        entry_id: Uuid::new_v4(),
        account: account.to_string(),
        amount_cents,
        booked_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
    }
}

fn setup() -> (Arc<MemoryTransactionScope>, Store<LedgerEntry, LedgerRecord>) {
    let scope = Arc::new(MemoryTransactionScope::new(MemoryConnection::new()));
    let store = StoreBuilder::new(scope.clone()).with_batch_size(2).build().unwrap();
    (scope, store)
}

#[tokio::test]
async fn test_explicit_uuid_keys_are_kept() {
    let (_, store) = setup();
    let ctx = Context::new();
    let first = entry("cash", 1200, 1);

    let id = store.create(&ctx, &first).await.unwrap();
    assert_eq!(id, first.entry_id);

    let found = store
        .get(&ctx, &Params::from([Param::eq("entry_id", id.to_string())]))
        .await
        .unwrap();
    assert_eq!(found, first);
}

#[tokio::test]
async fn test_commit_publishes_work() {
    let (scope, store) = setup();
    let ctx = Context::new();

    let tx = scope.begin(&ctx).unwrap();
    store
        .create_many(&tx, &[entry("cash", 100, 1), entry("cash", -40, 2), entry("bank", 60, 3)])
        .await
        .unwrap();

    let all = Params::empty();
    assert_eq!(store.count(&tx, &all).await.unwrap(), 3);
    assert_eq!(store.count(&ctx, &all).await.unwrap(), 0);

    scope.commit(&tx).unwrap();
    assert_eq!(store.count(&ctx, &all).await.unwrap(), 3);

    let cash = store
        .list(
            &ctx,
            &Params::from([Param::eq("account", "cash"), Param::desc("booked_at")]),
        )
        .await
        .unwrap();
    let amounts: Vec<i64> = cash.iter().map(|e| e.amount_cents).collect();
    assert_eq!(amounts, vec![-40, 100]);
}

#[tokio::test]
async fn test_rollback_discards_work() {
    let (scope, store) = setup();
    let ctx = Context::new();
    let kept = entry("cash", 500, 1);
    store.create(&ctx, &kept).await.unwrap();

    let tx = scope.begin(&ctx).unwrap();
    store.create(&tx, &entry("cash", 900, 2)).await.unwrap();
    store
        .delete(&tx, &Params::from([Param::eq("amount_cents", 500)]))
        .await
        .unwrap();
    assert_eq!(store.count(&tx, &Params::empty()).await.unwrap(), 1);

    scope.rollback(&tx).unwrap();

    let remaining = store.list(&ctx, &Params::empty()).await.unwrap();
    assert_eq!(remaining, vec![kept]);
}

#[tokio::test]
async fn test_finished_transaction_cannot_be_reused() {
    let (scope, _) = setup();
    let tx = scope.begin(&Context::new()).unwrap();
    scope.commit(&tx).unwrap();

    assert!(matches!(
        scope.rollback(&tx),
        Err(StoreError::TransactionNotFound(_))
    ));
}

#[tokio::test]
async fn test_cancelling_transaction_context_stops_work() {
    let (scope, store) = setup();
    let ctx = Context::new();
    let tx = scope.begin(&ctx).unwrap();

    ctx.cancel();
    let err = store.create(&tx, &entry("cash", 1, 1)).await.unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));

    scope.rollback(&tx).unwrap();
}

#[tokio::test]
async fn test_context_of_finished_transaction_is_rejected() {
    let (scope, store) = setup();
    let ctx = Context::new();

    let tx = scope.begin(&ctx).unwrap();
    store.create(&tx, &entry("cash", 100, 1)).await.unwrap();
    scope.commit(&tx).unwrap();

    let err = store.create(&tx, &entry("cash", 200, 2)).await.unwrap_err();
    assert!(matches!(err, StoreError::TransactionNotFound(_)));
    let err = store.list(&tx, &Params::empty()).await.unwrap_err();
    assert!(matches!(err, StoreError::TransactionNotFound(_)));

    assert_eq!(store.count(&ctx, &Params::empty()).await.unwrap(), 1);
}
