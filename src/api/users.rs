//! `/api/users` - account administration (admin only).

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json, Path, Query},
    },
    core::{
        pagination::{Page, PageQuery},
        user::{self, UserFilter, UserUpdate},
    },
    entities::UserModel,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::get,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show).patch(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<UserModel>>> {
    let page = state.page(page);
    Ok(Json(
        user::list_users(&state.db, &current.actor(), &filter, page).await?,
    ))
}

async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<UserModel>> {
    Ok(Json(user::get_user(&state.db, &current.actor(), id).await?))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<UserUpdate>,
) -> Result<Json<UserModel>> {
    Ok(Json(
        user::update_user(&state.db, &current.actor(), id, &input).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    user::delete_user(&state.db, &current.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
