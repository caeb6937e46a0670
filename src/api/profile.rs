//! `/api/profile` - the caller's own account.

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json},
    },
    core::{
        auth,
        user::{self, ProfileUpdate},
    },
    entities::UserModel,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/profile/password`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show).patch(update))
        .route("/password", post(change_password))
}

async fn show(current: CurrentUser) -> Json<UserModel> {
    Json(current.user)
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<ProfileUpdate>,
) -> Result<Json<UserModel>> {
    Ok(Json(
        user::update_profile(&state.db, &current.actor(), &input).await?,
    ))
}

async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<PasswordChange>,
) -> Result<StatusCode> {
    auth::change_password(
        &state.db,
        current.user.id,
        &input.current_password,
        &input.new_password,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
