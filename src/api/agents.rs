//! `/api/agents` - agents as seen by admins and their managers.

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json, Path, Query},
    },
    core::{
        pagination::{Page, PageQuery},
        user::{self, UserFilter},
    },
    entities::UserModel,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};

/// Body of `PATCH /api/agents/{id}/status`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub is_active: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show))
        .route("/{id}/status", patch(set_status))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<UserModel>>> {
    let page = state.page(page);
    Ok(Json(
        user::list_agents(&state.db, &current.actor(), &filter, page).await?,
    ))
}

async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<UserModel>> {
    Ok(Json(user::get_agent(&state.db, &current.actor(), id).await?))
}

async fn set_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<AgentStatus>,
) -> Result<Json<UserModel>> {
    Ok(Json(
        user::set_agent_active(&state.db, &current.actor(), id, input.is_active).await?,
    ))
}
