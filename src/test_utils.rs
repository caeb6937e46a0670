//! Shared test utilities for the CRM.
//!
//! This module provides common helper functions for setting up test databases
//! and creating accounts and orders with sensible defaults.

use crate::{
    api::{self, AppState},
    config::settings::PaginationConfig,
    core::{
        access::Actor,
        auth::{create_session, hash_password},
        order::{self, OrderInput},
    },
    entities::{Role, order as order_entity, user},
    errors::Result,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;

/// Password of every account made by [`create_test_user`].
pub const TEST_PASSWORD: &str = "test-password";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an active account with [`TEST_PASSWORD`].
///
/// # Defaults
/// * `full_name`: the local part of `email`
/// * `phone`: None
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
    manager_id: Option<i64>,
) -> Result<user::Model> {
    let now = Utc::now();
    let full_name = email.split('@').next().unwrap_or(email).to_string();
    user::ActiveModel {
        email: Set(email.to_lowercase()),
        password_hash: Set(hash_password(TEST_PASSWORD)?),
        full_name: Set(full_name),
        phone: Set(None),
        role: Set(role),
        is_active: Set(true),
        manager_id: Set(manager_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// A complete, valid order draft.
///
/// 7 nights from 2025-07-01, client country `ES`, property `42`,
/// total 1100.0 (1000 + 150 - 50), deposit 300.0, balance 800.0.
#[must_use]
pub fn sample_order_input() -> OrderInput {
    OrderInput {
        check_in: NaiveDate::from_ymd_opt(2025, 7, 1),
        check_out: NaiveDate::from_ymd_opt(2025, 7, 8),
        client: order::ClientInfo {
            name: "Ana Lopez".to_string(),
            phones: vec!["+34 600 000 000".to_string()],
            email: Some("ana.client@mail.test".to_string()),
            document: Some("X1234567".to_string()),
            country: "ES".to_string(),
        },
        travel: order::TravelInfo {
            country: "Italy".to_string(),
            city: "Rome".to_string(),
            property_name: "Hotel Sol".to_string(),
            property_number: "42".to_string(),
        },
        pricing: order::PricingFields {
            official_price: 1000.0,
            tax_clean: 150.0,
            discount: 50.0,
        },
        payments: order::PaymentsInput {
            deposit: order::DepositInput {
                amount: 300.0,
                methods: vec!["card".to_string()],
            },
            balance: order::BalanceInput {
                methods: vec!["transfer".to_string()],
            },
        },
        bank_account_id: None,
        notes: None,
    }
}

/// Books [`sample_order_input`] on behalf of `agent_id`.
pub async fn create_test_order(
    db: &DatabaseConnection,
    agent_id: i64,
) -> Result<order_entity::Model> {
    let actor = Actor {
        id: agent_id,
        role: Role::Agent,
    };
    order::create_order(db, &actor, &sample_order_input()).await
}

/// Opens a session for `user` and returns its bearer token.
pub async fn token_for(db: &DatabaseConnection, user: &user::Model) -> Result<String> {
    Ok(create_session(db, user.id).await?.token)
}

/// Builds the full router over a fresh in-memory database.
/// Returns (router, db) so tests can seed data directly.
pub async fn test_app() -> Result<(Router, DatabaseConnection)> {
    let db = setup_test_db().await?;
    let state = AppState::new(db.clone(), PaginationConfig::default());
    Ok((api::router(state), db))
}

/// Sends one request through the router.
///
/// Returns the status, the `Location` header and the body parsed as JSON
/// (`Value::Null` when empty or not JSON).
#[allow(clippy::unwrap_used)]
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, location, json)
}
