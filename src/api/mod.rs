//! HTTP surface of the CRM.
//!
//! REST endpoints live under `/api/...` and answer JSON with camelCase keys.
//! The role dashboard routes (`/admin`, `/manager`, `/agent`) and the entry
//! route `/` are guarded by the authorization gate and redirect with
//! `303 See Other` when the caller has no session or the wrong role.

pub mod agents;
pub mod auth;
pub mod bank_accounts;
pub mod error;
pub mod extract;
pub mod invitations;
pub mod orders;
pub mod pages;
pub mod profile;
pub mod users;

use crate::{
    config::settings::PaginationConfig,
    core::pagination::{PageQuery, PageRequest},
};
use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pooled database connection
    pub db: DatabaseConnection,
    /// Paging bounds applied to list queries
    pub pagination: PaginationConfig,
}

impl AppState {
    #[must_use]
    pub const fn new(db: DatabaseConnection, pagination: PaginationConfig) -> Self {
        Self { db, pagination }
    }

    /// Resolves raw paging parameters against the configured bounds.
    #[must_use]
    pub fn page(&self, query: PageQuery) -> PageRequest {
        PageRequest::resolve(query, self.pagination)
    }
}

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/invitations", invitations::routes())
        .nest("/api/profile", profile::routes())
        .nest("/api/users", users::routes())
        .nest("/api/agents", agents::routes())
        .nest("/api/bankAccounts", bank_accounts::routes())
        .nest("/api/orders", orders::routes())
        .merge(pages::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
