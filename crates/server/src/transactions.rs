//! Transactions API endpoints

use api_types::transaction::{
    Reversal, SplitStatus, SplitView, TransactionDeleted, TransactionListQuery, TransactionNew,
    TransactionUpdate, TransactionView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{
    CreateTransactionCmd, DateRange, SplitReversal, SplitState, Transaction, UpdateTransactionCmd,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn split_view(split: SplitState) -> SplitView {
    match split {
        SplitState::NotShared => SplitView {
            status: SplitStatus::NotShared,
            collaborator: None,
            collaborator_amount_minor: None,
            collaborator_transaction_id: None,
            completed_at: None,
        },
        SplitState::Requested { collaborator } => SplitView {
            status: SplitStatus::Requested,
            collaborator: Some(collaborator),
            collaborator_amount_minor: None,
            collaborator_transaction_id: None,
            completed_at: None,
        },
        SplitState::Completed(split) => SplitView {
            status: SplitStatus::Completed,
            collaborator: Some(split.collaborator),
            collaborator_amount_minor: Some(split.amount_minor),
            collaborator_transaction_id: Some(split.portion_transaction_id),
            completed_at: Some(split.completed_at),
        },
    }
}

pub(crate) fn transaction_view(tx: Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        account_id: tx.account_id,
        owner: tx.owner_user_id,
        amount_minor: tx.amount_minor,
        category_id: tx.category_id,
        subcategory_id: tx.subcategory_id,
        description: tx.description,
        date: tx.date,
        is_draft: tx.is_draft,
        is_private: tx.is_private,
        split: split_view(tx.split),
        split_parent_id: tx.split_parent_id,
    }
}

fn create_cmd(username: &str, payload: TransactionNew) -> CreateTransactionCmd {
    let mut cmd = CreateTransactionCmd::new(
        username,
        payload.account_id,
        payload.category_id,
        payload.amount_minor,
        payload.date,
    )
    .private(payload.is_private)
    .split(payload.split_requested);
    if let Some(subcategory_id) = payload.subcategory_id {
        cmd = cmd.subcategory_id(subcategory_id);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    cmd
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let tx = state
        .engine
        .create_transaction(create_cmd(&user.username, payload))
        .await?;
    Ok((StatusCode::CREATED, Json(transaction_view(tx))))
}

/// Drafts are stored without touching the balance.
pub async fn create_draft(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let tx = state
        .engine
        .create_draft(create_cmd(&user.username, payload))
        .await?;
    Ok((StatusCode::CREATED, Json(transaction_view(tx))))
}

pub async fn confirm(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let tx = state
        .engine
        .confirm_draft(&user.username, transaction_id)
        .await?;
    Ok(Json(transaction_view(tx)))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let tx = state
        .engine
        .transaction(&user.username, transaction_id)
        .await?;
    Ok(Json(transaction_view(tx)))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<Vec<TransactionView>>, ServerError> {
    let range = DateRange::new(query.from, query.to);
    let txs = state
        .engine
        .list_transactions(
            &user.username,
            query.account_id,
            &range,
            query.include_drafts,
        )
        .await?;
    Ok(Json(txs.into_iter().map(transaction_view).collect()))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<Json<TransactionView>, ServerError> {
    let mut cmd = UpdateTransactionCmd::new(&user.username, transaction_id);
    if let Some(amount_minor) = payload.amount_minor {
        cmd = cmd.amount_minor(amount_minor);
    }
    if let Some(date) = payload.date {
        cmd = cmd.date(date);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(category_id) = payload.category_id {
        cmd = cmd.category_id(category_id);
    }
    if let Some(subcategory_id) = payload.subcategory_id {
        cmd = cmd.subcategory_id(subcategory_id);
    }

    let tx = state.engine.update_transaction(cmd).await?;
    Ok(Json(transaction_view(tx)))
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionDeleted>, ServerError> {
    let reversal = state
        .engine
        .delete_transaction(&user.username, transaction_id)
        .await?;
    Ok(Json(TransactionDeleted {
        id: transaction_id,
        reversal: match reversal {
            SplitReversal::OwnerOnly => Reversal::OwnerOnly,
            SplitReversal::BothLegs => Reversal::BothLegs,
        },
    }))
}
