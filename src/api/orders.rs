//! `/api/orders` - booking, listing and the status and payment transitions.

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json, Path, Query},
    },
    core::{
        order::{self, OrderFilter, OrderInput, OrderView, PaymentPart},
        pagination::{Page, PageQuery},
        pricing::Derived,
    },
    entities::{OrderStatus, PaymentStatus},
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};

/// Body of `PATCH /api/orders/{id}/status`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Body of `PATCH /api/orders/{id}/payments/{part}`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PaymentChange {
    pub status: PaymentStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/preview", post(preview))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/status", patch(set_status))
        .route("/{id}/payments/{part}", patch(set_payment))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Page<OrderView>>> {
    let page = state.page(page);
    let found = order::list_orders(&state.db, &current.actor(), &filter, page).await?;
    Ok(Json(found.map(OrderView::from)))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<OrderInput>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let created = order::create_order(&state.db, &current.actor(), &input).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn preview(_current: CurrentUser, Json(input): Json<OrderInput>) -> Json<Derived> {
    Json(order::preview(&input))
}

async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    let found = order::get_order(&state.db, &current.actor(), id).await?;
    Ok(Json(found.into()))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<OrderInput>,
) -> Result<Json<OrderView>> {
    let updated = order::update_order(&state.db, &current.actor(), id, &input).await?;
    Ok(Json(updated.into()))
}

async fn remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    order::delete_order(&state.db, &current.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<StatusChange>,
) -> Result<Json<OrderView>> {
    let updated = order::set_order_status(&state.db, &current.actor(), id, input.status).await?;
    Ok(Json(updated.into()))
}

async fn set_payment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, part)): Path<(i64, PaymentPart)>,
    Json(input): Json<PaymentChange>,
) -> Result<Json<OrderView>> {
    let updated =
        order::set_payment_status(&state.db, &current.actor(), id, part, input.status).await?;
    Ok(Json(updated.into()))
}
