//! Categories API endpoints

use api_types::category::{CategoryNew, CategoryView};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::Category;

use crate::{ServerError, server::ServerState, user};

fn category_view(category: Category) -> CategoryView {
    CategoryView {
        id: category.id,
        name: category.name,
        parent_id: category.parent_id,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryNew>,
) -> Result<(StatusCode, Json<CategoryView>), ServerError> {
    let category = state
        .engine
        .create_category(&user.username, &payload.name, payload.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(category_view(category))))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<CategoryView>>, ServerError> {
    let categories = state.engine.list_categories(&user.username).await?;
    Ok(Json(categories.into_iter().map(category_view).collect()))
}
