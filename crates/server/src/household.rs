//! Household link and notification endpoints

use api_types::{
    household::{HouseholdLinkNew, HouseholdLinkView},
    notification::NotificationView,
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::HouseholdLink;

use crate::{ServerError, server::ServerState, user};

fn link_view(link: HouseholdLink) -> HouseholdLinkView {
    HouseholdLinkView {
        id: link.id,
        owner: link.owner_user_id,
        partner: link.partner_user_id,
        active: link.active,
        created_at: link.created_at,
    }
}

pub async fn link(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<HouseholdLinkNew>,
) -> Result<(StatusCode, Json<HouseholdLinkView>), ServerError> {
    let link = state
        .engine
        .link_household(&user.username, &payload.partner)
        .await?;
    Ok((StatusCode::CREATED, Json(link_view(link))))
}

/// The caller's active link, from either side.
pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<HouseholdLinkView>, ServerError> {
    let link = state
        .engine
        .household_link(&user.username)
        .await?
        .ok_or_else(|| engine::EngineError::KeyNotFound("household link not exists".to_string()))?;
    Ok(Json(link_view(link)))
}

pub async fn unlink(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<StatusCode, ServerError> {
    state.engine.unlink_household(&user.username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn notifications(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<NotificationView>>, ServerError> {
    let notifications = state.engine.notifications(&user.username).await?;
    Ok(Json(
        notifications
            .into_iter()
            .map(|n| NotificationView {
                id: n.id,
                kind: n.kind.as_str().to_string(),
                payload: n.payload,
                created_at: n.created_at,
            })
            .collect(),
    ))
}
