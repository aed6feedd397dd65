//! Transfers API endpoints

use api_types::transfer::{TransferListQuery, TransferNew, TransferUpdate, TransferView};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{CreateTransferCmd, DateRange, Transfer, UpdateTransferCmd};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn transfer_view(transfer: Transfer) -> TransferView {
    TransferView {
        id: transfer.id,
        from_account_id: transfer.from_account_id,
        to_account_id: transfer.to_account_id,
        amount_minor: transfer.amount_minor,
        description: transfer.description,
        date: transfer.date,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransferNew>,
) -> Result<(StatusCode, Json<TransferView>), ServerError> {
    let mut cmd = CreateTransferCmd::new(
        &user.username,
        payload.from_account_id,
        payload.to_account_id,
        payload.amount_minor,
        payload.date,
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let transfer = state.engine.create_transfer(cmd).await?;
    Ok((StatusCode::CREATED, Json(transfer_view(transfer))))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<TransferView>, ServerError> {
    let transfer = state.engine.transfer(&user.username, transfer_id).await?;
    Ok(Json(transfer_view(transfer)))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<TransferListQuery>,
) -> Result<Json<Vec<TransferView>>, ServerError> {
    let range = DateRange::new(query.from, query.to);
    let transfers = state
        .engine
        .list_transfers(&user.username, &range)
        .await?;
    Ok(Json(transfers.into_iter().map(transfer_view).collect()))
}

/// A changed amount shifts both legs by the difference.
pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transfer_id): Path<Uuid>,
    Json(payload): Json<TransferUpdate>,
) -> Result<Json<TransferView>, ServerError> {
    let mut cmd = UpdateTransferCmd::new(&user.username, transfer_id);
    if let Some(amount_minor) = payload.amount_minor {
        cmd = cmd.amount_minor(amount_minor);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(date) = payload.date {
        cmd = cmd.date(date);
    }

    let transfer = state.engine.update_transfer(cmd).await?;
    Ok(Json(transfer_view(transfer)))
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(transfer_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_transfer(&user.username, transfer_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
