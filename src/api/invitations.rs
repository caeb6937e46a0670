//! `/api/invitations` - issue, list and cancel invitations.

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json, Path, Query},
    },
    core::{
        invitation::{self, InvitationFilter, InvitationInput},
        pagination::{Page, PageQuery},
    },
    entities::InvitationModel,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", delete(cancel))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<InvitationFilter>,
) -> Result<Json<Page<InvitationModel>>> {
    let page = state.page(page);
    Ok(Json(
        invitation::list_invitations(&state.db, &current.actor(), &filter, page).await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<InvitationInput>,
) -> Result<(StatusCode, Json<InvitationModel>)> {
    let created =
        invitation::create_invitation(&state.db, &current.actor(), &input.email, input.role)
            .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    invitation::cancel_invitation(&state.db, &current.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
