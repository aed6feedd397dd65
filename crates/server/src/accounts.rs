//! Accounts and balance endpoints

use api_types::{
    account::{AccountKind, AccountNew, AccountView},
    balance::{
        AuditView, BalanceSet, BalanceView, HistoryEntryView, HistoryPage, HistoryQuery,
        StatementReconcile,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{Account, BalanceHistoryEntry, DateRange, Location, NewAccountCmd};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

const DEFAULT_HISTORY_LIMIT: u64 = 50;
const MAX_HISTORY_LIMIT: u64 = 200;

fn map_kind(kind: engine::AccountKind) -> AccountKind {
    match kind {
        engine::AccountKind::Income => AccountKind::Income,
        engine::AccountKind::Expense => AccountKind::Expense,
    }
}

fn account_view(account: Account) -> AccountView {
    let location = account.location.unwrap_or(Location {
        place_name: None,
        latitude: None,
        longitude: None,
    });
    AccountView {
        id: account.id,
        name: account.name,
        kind: map_kind(account.kind),
        place_name: location.place_name,
        latitude: location.latitude,
        longitude: location.longitude,
        created_at: account.created_at,
    }
}

pub(crate) fn history_view(entry: BalanceHistoryEntry) -> HistoryEntryView {
    HistoryEntryView {
        id: entry.id,
        previous_balance_minor: entry.previous_balance,
        new_balance_minor: entry.new_balance,
        change_amount_minor: entry.change_amount,
        change_type: entry.change_type.as_str().to_string(),
        reference_id: entry.reference_id,
        effective_date: entry.effective_date,
        recorded_at: entry.recorded_at,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    let kind = match payload.kind {
        AccountKind::Income => engine::AccountKind::Income,
        AccountKind::Expense => engine::AccountKind::Expense,
    };
    let mut cmd = NewAccountCmd::new(&user.username, payload.name)
        .kind(kind)
        .opening_balance(payload.opening_balance_minor);
    if payload.place_name.is_some() || payload.latitude.is_some() || payload.longitude.is_some() {
        cmd = cmd.location(Location {
            place_name: payload.place_name,
            latitude: payload.latitude,
            longitude: payload.longitude,
        });
    }

    let account = state.engine.create_account(cmd).await?;
    Ok((StatusCode::CREATED, Json(account_view(account))))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<AccountView>>, ServerError> {
    let accounts = state.engine.list_accounts(&user.username).await?;
    Ok(Json(accounts.into_iter().map(account_view).collect()))
}

pub async fn balance(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<BalanceView>, ServerError> {
    let balance_minor = state.engine.balance(account_id, &user.username).await?;
    Ok(Json(BalanceView {
        account_id,
        balance_minor,
    }))
}

pub async fn set_balance(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<BalanceSet>,
) -> Result<Json<BalanceView>, ServerError> {
    let balance_minor = state
        .engine
        .set_balance(account_id, &user.username, payload.balance_minor)
        .await?;
    Ok(Json(BalanceView {
        account_id,
        balance_minor,
    }))
}

pub async fn reconcile(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<StatementReconcile>,
) -> Result<Json<BalanceView>, ServerError> {
    let balance_minor = state
        .engine
        .reconcile_to_statement(account_id, &user.username, payload.statement_balance_minor)
        .await?;
    Ok(Json(BalanceView {
        account_id,
        balance_minor,
    }))
}

/// Newest entries first. Pass `next_cursor` back as `cursor` for the next page.
pub async fn history(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ServerError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let range = DateRange::new(query.from, query.to);

    let (entries, next_cursor) = state
        .engine
        .balance_history_page(
            account_id,
            &user.username,
            &range,
            limit,
            query.cursor.as_deref(),
        )
        .await?;

    Ok(Json(HistoryPage {
        entries: entries.into_iter().map(history_view).collect(),
        next_cursor,
    }))
}

pub async fn audit(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AuditView>, ServerError> {
    let audit = state
        .engine
        .audit_account(account_id, &user.username)
        .await?;
    if !audit.is_consistent() {
        tracing::warn!(
            %account_id,
            drift = audit.drift,
            broken = audit.broken_entries.len(),
            "account audit found inconsistencies"
        );
    }

    Ok(Json(AuditView {
        account_id: audit.account_id,
        stored_balance_minor: audit.stored_balance,
        history_net_minor: audit.history_net,
        unlogged_expense_net_minor: audit.unlogged_expense_net,
        expected_balance_minor: audit.expected_balance,
        drift_minor: audit.drift,
        broken_entries: audit.broken_entries.into_iter().map(history_view).collect(),
    }))
}
