#![allow(dead_code)]

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{ChangeType, DateRange, Engine, EngineBuilder, NewAccountCmd};
use migration::MigratorTrait;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with(|builder, _db| builder).await
}

/// Engine over a fresh in-memory database; `configure` may wrap collaborators
/// around the connection.
pub async fn engine_with(
    configure: impl FnOnce(EngineBuilder, &DatabaseConnection) -> EngineBuilder,
) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for user in ["alice", "bob", "carol"] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password) VALUES (?, ?)",
            vec![user.into(), "password".into()],
        ))
        .await
        .unwrap();
    }
    let engine = configure(Engine::builder().database(db.clone()), &db)
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub async fn account(engine: &Engine, owner: &str, name: &str, opening_minor: i64) -> Uuid {
    engine
        .create_account(NewAccountCmd::new(owner, name).opening_balance(opening_minor))
        .await
        .unwrap()
        .id
}

pub async fn category(engine: &Engine, owner: &str, name: &str) -> Uuid {
    engine.create_category(owner, name, None).await.unwrap().id
}

pub async fn history_types(engine: &Engine, account_id: Uuid, owner: &str) -> Vec<ChangeType> {
    engine
        .balance_history(account_id, owner, &DateRange::default())
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.change_type)
        .collect()
}
