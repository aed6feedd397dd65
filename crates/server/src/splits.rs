//! Split-bill endpoints, used by the collaborator side.

use api_types::{split::SplitComplete, transaction::TransactionView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use engine::CompleteSplitCmd;
use uuid::Uuid;

use crate::{ServerError, server::ServerState, transactions::transaction_view, user};

/// Bills shared with the caller that still wait for their portion.
pub async fn pending(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<TransactionView>>, ServerError> {
    let bills = state.engine.pending_splits(&user.username).await?;
    Ok(Json(bills.into_iter().map(transaction_view).collect()))
}

/// Returns the caller's new portion transaction.
pub async fn complete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(bill_id): Path<Uuid>,
    Json(payload): Json<SplitComplete>,
) -> Result<Json<TransactionView>, ServerError> {
    let mut cmd = CompleteSplitCmd::new(
        &user.username,
        bill_id,
        payload.account_id,
        payload.category_id,
        payload.amount_minor,
        payload.date,
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let portion = state.engine.complete_split(cmd).await?;
    Ok(Json(transaction_view(portion)))
}
