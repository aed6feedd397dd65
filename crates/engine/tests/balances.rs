mod common;

use std::sync::Arc;

use sea_orm::ConnectionTrait;
use tokio::task::JoinSet;
use uuid::Uuid;

use common::{account, category, day, engine_with_db, history_types};
use engine::{
    ChangeType, CreateTransactionCmd, CreateTransferCmd, DateRange, EngineError,
    UpdateTransactionCmd,
};

#[tokio::test]
async fn opening_balance_is_logged_as_initial_set() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 10_000).await;

    assert_eq!(engine.balance(checking, "alice").await.unwrap(), 10_000);
    let history = engine
        .balance_history(checking, "alice", &DateRange::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].change_type, ChangeType::InitialSet);
    assert_eq!(history[0].previous_balance, 0);
    assert_eq!(history[0].new_balance, 10_000);
    assert_eq!(history[0].change_amount, 10_000);
}

#[tokio::test]
async fn account_without_writes_reads_zero_and_has_no_history() {
    let (engine, _db) = engine_with_db().await;
    let wallet = account(&engine, "alice", "Wallet", 0).await;

    assert_eq!(engine.balance(wallet, "alice").await.unwrap(), 0);
    assert!(history_types(&engine, wallet, "alice").await.is_empty());
}

#[tokio::test]
async fn foreign_or_unknown_accounts_are_not_found() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 100).await;

    let err = engine.balance(checking, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine.balance(Uuid::new_v4(), "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine.set_balance(checking, "bob", 0).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert_eq!(engine.balance(checking, "alice").await.unwrap(), 100);
}

#[tokio::test]
async fn set_balance_and_reconcile_log_their_delta() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 10_000).await;

    assert_eq!(
        engine.set_balance(checking, "alice", 12_500).await.unwrap(),
        12_500
    );
    assert_eq!(
        engine
            .reconcile_to_statement(checking, "alice", 12_000)
            .await
            .unwrap(),
        12_000
    );

    let history = engine
        .balance_history(checking, "alice", &DateRange::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].change_type, ChangeType::ManualSet);
    assert_eq!(history[1].change_amount, 2_500);
    assert_eq!(history[2].change_type, ChangeType::Reconciliation);
    assert_eq!(history[2].previous_balance, 12_500);
    assert_eq!(history[2].change_amount, -500);
    assert!(history.iter().all(|entry| entry.is_consistent()));
}

#[tokio::test]
async fn history_range_is_half_open_on_effective_date() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 0).await;
    let savings = account(&engine, "alice", "Savings", 0).await;

    for (date, amount) in [(day(2026, 1, 5), 100), (day(2026, 1, 10), 200), (day(2026, 1, 20), 300)] {
        engine
            .create_transfer(CreateTransferCmd::new(
                "alice", checking, savings, amount, date,
            ))
            .await
            .unwrap();
    }

    let range = DateRange::new(Some(day(2026, 1, 5)), Some(day(2026, 1, 20)));
    let entries = engine
        .balance_history(savings, "alice", &range)
        .await
        .unwrap();
    let amounts: Vec<i64> = entries.iter().map(|e| e.change_amount).collect();
    assert_eq!(amounts, vec![100, 200]);

    let err = engine
        .balance_history(
            savings,
            "alice",
            &DateRange::new(Some(day(2026, 1, 20)), Some(day(2026, 1, 5))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange(_)));
}

#[tokio::test]
async fn history_pages_newest_first() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 1).await;
    for target in [2, 3, 4, 5] {
        engine.set_balance(checking, "alice", target).await.unwrap();
    }

    let (first, cursor) = engine
        .balance_history_page(checking, "alice", &DateRange::default(), 2, None)
        .await
        .unwrap();
    let balances: Vec<i64> = first.iter().map(|e| e.new_balance).collect();
    assert_eq!(balances, vec![5, 4]);
    let cursor = cursor.unwrap();

    let (second, cursor) = engine
        .balance_history_page(checking, "alice", &DateRange::default(), 2, Some(&cursor))
        .await
        .unwrap();
    let balances: Vec<i64> = second.iter().map(|e| e.new_balance).collect();
    assert_eq!(balances, vec![3, 2]);

    let (last, cursor) = engine
        .balance_history_page(
            checking,
            "alice",
            &DateRange::default(),
            2,
            cursor.as_deref(),
        )
        .await
        .unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].change_type, ChangeType::InitialSet);
    assert!(cursor.is_none());

    let err = engine
        .balance_history_page(checking, "alice", &DateRange::default(), 2, Some("not-a-cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
}

#[tokio::test]
async fn failed_history_write_keeps_the_balance_change() {
    let (engine, db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 1_000).await;
    assert_eq!(engine.history_write_failures(), 0);

    db.execute_unprepared("DROP TABLE balance_history")
        .await
        .unwrap();

    assert_eq!(engine.set_balance(checking, "alice", 400).await.unwrap(), 400);
    assert_eq!(engine.balance(checking, "alice").await.unwrap(), 400);
    assert_eq!(engine.history_write_failures(), 1);
}

#[tokio::test]
async fn audit_replays_history_and_expenses() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 10_000).await;
    let savings = account(&engine, "alice", "Savings", 0).await;
    let food = category(&engine, "alice", "Food").await;

    let lunch = engine
        .create_transaction(CreateTransactionCmd::new(
            "alice",
            checking,
            food,
            1_200,
            day(2026, 2, 1),
        ))
        .await
        .unwrap();
    engine
        .create_transaction(CreateTransactionCmd::new(
            "alice",
            checking,
            food,
            800,
            day(2026, 2, 2),
        ))
        .await
        .unwrap();
    engine
        .create_transfer(CreateTransferCmd::new(
            "alice",
            checking,
            savings,
            3_000,
            day(2026, 2, 3),
        ))
        .await
        .unwrap();
    engine.delete_transaction("alice", lunch.id).await.unwrap();

    let audit = engine.audit_account(checking, "alice").await.unwrap();
    assert_eq!(audit.stored_balance, 10_000 - 800 - 3_000);
    assert_eq!(audit.history_net, 10_000 - 3_000 + 1_200);
    assert_eq!(audit.unlogged_expense_net, -800 - 1_200);
    assert_eq!(audit.drift, 0);
    assert!(audit.is_consistent());

    assert!(engine.audit_account(savings, "alice").await.unwrap().is_consistent());
}

#[tokio::test]
async fn audit_surfaces_amount_edits_as_drift() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 10_000).await;
    let food = category(&engine, "alice", "Food").await;

    let tx = engine
        .create_transaction(CreateTransactionCmd::new(
            "alice",
            checking,
            food,
            3_000,
            day(2026, 2, 1),
        ))
        .await
        .unwrap();
    engine
        .update_transaction(UpdateTransactionCmd::new("alice", tx.id).amount_minor(5_000))
        .await
        .unwrap();

    let audit = engine.audit_account(checking, "alice").await.unwrap();
    assert_eq!(audit.stored_balance, 7_000);
    assert_eq!(audit.expected_balance, 5_000);
    assert_eq!(audit.drift, 2_000);
    assert!(!audit.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expenses_on_one_account_all_land() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 1_000).await;
    let food = category(&engine, "alice", "Food").await;
    let engine = Arc::new(engine);

    let mut tasks = JoinSet::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            engine
                .create_transaction(CreateTransactionCmd::new(
                    "alice",
                    checking,
                    food,
                    5,
                    day(2026, 3, 1),
                ))
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    assert_eq!(engine.balance(checking, "alice").await.unwrap(), 900);
    let audit = engine.audit_account(checking, "alice").await.unwrap();
    assert_eq!(audit.drift, 0);
    assert!(audit.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn set_balance_lands_on_target_between_concurrent_expenses() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", 1_000).await;
    let food = category(&engine, "alice", "Food").await;
    let engine = Arc::new(engine);

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            if i == 5 {
                return engine.set_balance(checking, "alice", 500).await.map(|_| ());
            }
            engine
                .create_transaction(CreateTransactionCmd::new(
                    "alice",
                    checking,
                    food,
                    5,
                    day(2026, 3, 1),
                ))
                .await
                .map(|_| ())
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let history = engine
        .balance_history(checking, "alice", &DateRange::default())
        .await
        .unwrap();
    let manual = history
        .iter()
        .find(|entry| entry.change_type == ChangeType::ManualSet)
        .unwrap();
    assert_eq!(manual.new_balance, 500);
    assert!(manual.is_consistent());

    let audit = engine.audit_account(checking, "alice").await.unwrap();
    assert_eq!(audit.drift, 0);
    assert!(audit.is_consistent());
    let after_set = (500 - audit.stored_balance) / 5;
    assert!((0..=9).contains(&after_set));
}

#[tokio::test]
async fn balance_changes_out_of_i64_range_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", -1).await;

    let err = engine
        .set_balance(checking, "alice", i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    let savings = account(&engine, "alice", "Savings", 1).await;
    let err = engine
        .reconcile_to_statement(savings, "alice", i64::MIN)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    assert_eq!(engine.balance(checking, "alice").await.unwrap(), -1);
    assert_eq!(engine.balance(savings, "alice").await.unwrap(), 1);
    assert_eq!(
        history_types(&engine, checking, "alice").await,
        vec![ChangeType::InitialSet]
    );

    let full = account(&engine, "alice", "Full", i64::MAX).await;
    let err = engine
        .create_transfer(CreateTransferCmd::new("alice", savings, full, 1, day(2026, 3, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert_eq!(engine.balance(full, "alice").await.unwrap(), i64::MAX);
}

#[tokio::test]
async fn audit_reports_out_of_range_totals_instead_of_wrapping() {
    let (engine, _db) = engine_with_db().await;
    let checking = account(&engine, "alice", "Checking", i64::MAX).await;
    let food = category(&engine, "alice", "Food").await;

    for _ in 0..2 {
        engine
            .create_transaction(CreateTransactionCmd::new(
                "alice",
                checking,
                food,
                i64::MAX / 2 + 1,
                day(2026, 3, 1),
            ))
            .await
            .unwrap();
    }
    assert_eq!(engine.balance(checking, "alice").await.unwrap(), -1);

    let err = engine.audit_account(checking, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}
