mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tokio::{sync::Notify, task::JoinSet};
use uuid::Uuid;

use common::{account, category, day, engine_with, engine_with_db};
use engine::{
    ChangeType, CompleteSplitCmd, CreateTransactionCmd, DateRange, DbOwnership, Engine,
    EngineError, NotificationKind, NotificationSink, OwnershipValidator, SplitReversal,
    SplitState, Transaction, UpdateTransactionCmd,
};

struct Household {
    owner_account: Uuid,
    owner_category: Uuid,
    partner_account: Uuid,
    partner_category: Uuid,
}

async fn household(engine: &Engine) -> Household {
    engine.link_household("alice", "bob").await.unwrap();
    Household {
        owner_account: account(engine, "alice", "Joint card", 100).await,
        owner_category: category(engine, "alice", "Groceries").await,
        partner_account: account(engine, "bob", "Checking", 50).await,
        partner_category: category(engine, "bob", "Groceries").await,
    }
}

async fn shared_bill(engine: &Engine, home: &Household, amount_minor: i64) -> Transaction {
    engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                home.owner_account,
                home.owner_category,
                amount_minor,
                day(2026, 5, 1),
            )
            .description("weekly shop")
            .split(true),
        )
        .await
        .unwrap()
}

fn completion(home: &Household, bill: &Transaction, amount_minor: i64) -> CompleteSplitCmd {
    CompleteSplitCmd::new(
        "bob",
        bill.id,
        home.partner_account,
        home.partner_category,
        amount_minor,
        day(2026, 5, 2),
    )
}

#[tokio::test]
async fn completed_split_is_reversed_on_both_sides() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;

    let bill = shared_bill(&engine, &home, 40).await;
    assert_eq!(
        bill.split,
        SplitState::Requested {
            collaborator: "bob".to_string()
        }
    );
    assert_eq!(engine.balance(home.owner_account, "alice").await.unwrap(), 60);

    let pending = engine.pending_splits("bob").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, bill.id);

    let requests = engine.notifications("bob").await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, NotificationKind::SplitBillRequest);
    assert_eq!(requests[0].payload["amount_minor"], 40);

    let portion = engine
        .complete_split(completion(&home, &bill, 20).description("my half"))
        .await
        .unwrap();
    assert_eq!(portion.owner_user_id, "bob");
    assert_eq!(portion.split_parent_id, Some(bill.id));
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);
    assert!(engine.pending_splits("bob").await.unwrap().is_empty());

    let stamped = engine.transaction("alice", bill.id).await.unwrap();
    let SplitState::Completed(split) = &stamped.split else {
        panic!("expected a completed split, got {:?}", stamped.split);
    };
    assert_eq!(split.amount_minor, 20);
    assert_eq!(split.account_id, home.partner_account);
    assert_eq!(split.portion_transaction_id, portion.id);
    assert_eq!(split.description.as_deref(), Some("my half"));

    let completed = engine.notifications("alice").await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].kind, NotificationKind::SplitBillCompleted);

    let reversal = engine.delete_transaction("alice", bill.id).await.unwrap();
    assert_eq!(reversal, SplitReversal::BothLegs);
    assert_eq!(engine.balance(home.owner_account, "alice").await.unwrap(), 100);
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 50);

    let err = engine.transaction("bob", portion.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let partner_history = engine
        .balance_history(home.partner_account, "bob", &DateRange::default())
        .await
        .unwrap();
    let last = partner_history.last().unwrap();
    assert_eq!(last.change_type, ChangeType::TransactionDeleted);
    assert_eq!(last.change_amount, 20);
    assert_eq!(last.reference_id, Some(portion.id));

    for (account_id, user) in [(home.owner_account, "alice"), (home.partner_account, "bob")] {
        assert!(engine.audit_account(account_id, user).await.unwrap().is_consistent());
    }
}

#[tokio::test]
async fn only_the_named_collaborator_completes_once() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;
    let carols = account(&engine, "carol", "Checking", 0).await;
    let carols_food = category(&engine, "carol", "Food").await;
    let bill = shared_bill(&engine, &home, 40).await;

    let err = engine
        .complete_split(CompleteSplitCmd::new(
            "carol",
            bill.id,
            carols,
            carols_food,
            20,
            day(2026, 5, 2),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine
        .complete_split(CompleteSplitCmd::new(
            "alice",
            bill.id,
            home.owner_account,
            home.owner_category,
            20,
            day(2026, 5, 2),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine
        .complete_split(CompleteSplitCmd::new(
            "bob",
            bill.id,
            home.owner_account,
            home.partner_category,
            20,
            day(2026, 5, 2),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAccount(_)));

    engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap();
    let err = engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplitState(_)));
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);
}

#[tokio::test]
async fn portion_is_not_deleted_on_its_own() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;
    let bill = shared_bill(&engine, &home, 40).await;
    let portion = engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap();

    let err = engine
        .delete_transaction("bob", portion.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplitState(_)));
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);
}

#[tokio::test]
async fn reversal_without_active_link_writes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;
    let bill = shared_bill(&engine, &home, 40).await;
    engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap();

    engine.unlink_household("bob").await.unwrap();

    let err = engine
        .delete_transaction("alice", bill.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoHouseholdLink(_)));
    assert_eq!(engine.balance(home.owner_account, "alice").await.unwrap(), 60);
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);
    assert!(engine.transaction("alice", bill.id).await.is_ok());

    engine.link_household("alice", "carol").await.unwrap();
    let err = engine
        .delete_transaction("alice", bill.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(engine.balance(home.owner_account, "alice").await.unwrap(), 60);
}

#[tokio::test]
async fn completion_requires_an_active_link() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;
    let bill = shared_bill(&engine, &home, 40).await;

    engine.unlink_household("alice").await.unwrap();
    let err = engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoHouseholdLink(_)));
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 50);
}

#[tokio::test]
async fn requested_split_reverses_only_the_owner() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;
    let bill = shared_bill(&engine, &home, 40).await;

    let reversal = engine.delete_transaction("alice", bill.id).await.unwrap();
    assert_eq!(reversal, SplitReversal::OwnerOnly);
    assert_eq!(engine.balance(home.owner_account, "alice").await.unwrap(), 100);
    assert!(engine.pending_splits("bob").await.unwrap().is_empty());
}

struct BrokenSink;

#[async_trait]
impl NotificationSink for BrokenSink {
    async fn notify(
        &self,
        _user_id: &str,
        _kind: NotificationKind,
        _payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        Err(EngineError::Database(DbErr::Custom(
            "push gateway unavailable".to_string(),
        )))
    }
}

#[tokio::test]
async fn failing_notifications_do_not_abort_the_split() {
    let (engine, _db) = engine_with(|builder, _db| builder.notifier(Arc::new(BrokenSink))).await;
    let home = household(&engine).await;

    let bill = shared_bill(&engine, &home, 40).await;
    assert_eq!(engine.balance(home.owner_account, "alice").await.unwrap(), 60);
    assert_eq!(engine.pending_splits("bob").await.unwrap().len(), 1);
    assert!(engine.notifications("bob").await.unwrap().is_empty());

    engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap();
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);
}

#[tokio::test]
async fn household_links_are_exclusive() {
    let (engine, _db) = engine_with_db().await;

    let err = engine.link_household("alice", "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidId(_)));
    let err = engine.link_household("alice", "dave").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let link = engine.link_household("alice", "bob").await.unwrap();
    assert_eq!(link.other_side("bob"), Some("alice"));

    let err = engine.link_household("carol", "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    engine.unlink_household("bob").await.unwrap();
    assert!(engine.household_link("alice").await.unwrap().is_none());
    let err = engine.unlink_household("alice").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    engine.link_household("carol", "bob").await.unwrap();
}

/// Parks the next category check until released.
struct GatedOwnership {
    inner: DbOwnership,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl GatedOwnership {
    fn new(database: &DatabaseConnection) -> Self {
        Self {
            inner: DbOwnership::new(database.clone()),
            armed: AtomicBool::new(false),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl OwnershipValidator for GatedOwnership {
    async fn owns_account(&self, user_id: &str, account_id: Uuid) -> Result<bool, EngineError> {
        self.inner.owns_account(user_id, account_id).await
    }

    async fn owns_category(&self, user_id: &str, category_id: Uuid) -> Result<bool, EngineError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.owns_category(user_id, category_id).await
    }

    async fn owns_subcategory(
        &self,
        user_id: &str,
        category_id: Uuid,
        subcategory_id: Uuid,
    ) -> Result<bool, EngineError> {
        self.inner
            .owns_subcategory(user_id, category_id, subcategory_id)
            .await
    }
}

#[tokio::test]
async fn owner_edit_during_completion_keeps_the_split() {
    let mut gate = None;
    let (engine, _db) = engine_with(|builder, db| {
        let ownership = Arc::new(GatedOwnership::new(db));
        gate = Some(Arc::clone(&ownership));
        builder.ownership(ownership)
    })
    .await;
    let gate = gate.unwrap();
    let home = household(&engine).await;
    let supplies = category(&engine, "alice", "Supplies").await;
    let bill = shared_bill(&engine, &home, 40).await;

    gate.armed.store(true, Ordering::SeqCst);
    let edit = engine.update_transaction(
        UpdateTransactionCmd::new("alice", bill.id)
            .category_id(supplies)
            .description("shop and supplies"),
    );
    let complete = async {
        gate.reached.notified().await;
        let portion = engine.complete_split(completion(&home, &bill, 20)).await;
        gate.release.notify_one();
        portion
    };
    let (edited, portion) = tokio::join!(edit, complete);
    let edited = edited.unwrap();
    let portion = portion.unwrap();

    assert_eq!(edited.category_id, supplies);
    assert_eq!(edited.description.as_deref(), Some("shop and supplies"));
    let stamped = engine.transaction("alice", bill.id).await.unwrap();
    let SplitState::Completed(split) = &stamped.split else {
        panic!("expected a completed split, got {:?}", stamped.split);
    };
    assert_eq!(split.portion_transaction_id, portion.id);
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);

    let reversal = engine.delete_transaction("alice", bill.id).await.unwrap();
    assert_eq!(reversal, SplitReversal::BothLegs);
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 50);
}

#[tokio::test]
async fn failed_portion_debit_leaves_the_bill_requested() {
    let (engine, db) = engine_with_db().await;
    let home = household(&engine).await;
    let bill = shared_bill(&engine, &home, 40).await;

    db.execute_unprepared("DROP TABLE account_balances")
        .await
        .unwrap();

    let err = engine
        .complete_split(completion(&home, &bill, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));

    let bill = engine.transaction("alice", bill.id).await.unwrap();
    assert_eq!(
        bill.split,
        SplitState::Requested {
            collaborator: "bob".to_string()
        }
    );
    let portions = engine
        .list_transactions("bob", home.partner_account, &DateRange::default(), true)
        .await
        .unwrap();
    assert!(portions.is_empty());
    assert_eq!(engine.pending_splits("bob").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_completions_leave_one_portion() {
    let (engine, _db) = engine_with_db().await;
    let home = household(&engine).await;
    let bill = shared_bill(&engine, &home, 40).await;
    let engine = Arc::new(engine);

    let mut tasks = JoinSet::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let cmd = completion(&home, &bill, 20);
        tasks.spawn(async move { engine.complete_split(cmd).await });
    }
    let mut completed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(portion) => completed.push(portion),
            Err(err) => assert!(matches!(err, EngineError::InvalidSplitState(_))),
        }
    }
    assert_eq!(completed.len(), 1);

    let portions = engine
        .list_transactions("bob", home.partner_account, &DateRange::default(), true)
        .await
        .unwrap();
    assert_eq!(portions.len(), 1);
    assert_eq!(portions[0].id, completed[0].id);
    assert_eq!(engine.balance(home.partner_account, "bob").await.unwrap(), 30);
    assert!(
        engine
            .audit_account(home.partner_account, "bob")
            .await
            .unwrap()
            .is_consistent()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_links_for_one_user_admit_only_one() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);

    let mut tasks = JoinSet::new();
    for owner in ["alice", "carol"] {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move { engine.link_household(owner, "bob").await });
    }
    let mut linked = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => linked += 1,
            Err(err) => assert!(matches!(err, EngineError::ExistingKey(_))),
        }
    }
    assert_eq!(linked, 1);
    assert!(engine.household_link("bob").await.unwrap().is_some());
}
