//! Role dashboards and the entry routes.
//!
//! `/admin`, `/manager` and `/agent` run the authorization gate against the
//! bearer token. A caller with the matching role gets the dashboard stats; a
//! caller with another role is sent to their own home, and a caller without
//! a usable session is sent to `/login`.

use crate::{
    api::{AppState, extract::bearer_token},
    core::{
        access::{Actor, AuthGate, GateDecision, LOGIN_PATH},
        auth, dashboard,
    },
    entities::Role,
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde_json::json;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_page))
        .route("/health", get(health))
        .route("/admin", get(admin_home))
        .route("/manager", get(manager_home))
        .route("/agent", get(agent_home))
}

/// Settles a gate from the request's token. Returns the caller when authorized.
async fn resolve_gate(state: &AppState, headers: &HeaderMap) -> Result<(AuthGate, Option<Actor>)> {
    let mut gate = AuthGate::new();
    let Some(token) = bearer_token(headers) else {
        gate.resolve(None, None);
        return Ok((gate, None));
    };

    match auth::authenticate(&state.db, token).await {
        Ok(user) => {
            gate.resolve(Some(token), Some(user.role));
            Ok((gate, Some(Actor::from(&user))))
        }
        Err(Error::Unauthorized) => {
            gate.resolve(Some(token), None);
            Ok((gate, None))
        }
        Err(e) => Err(e),
    }
}

async fn dashboard_for(state: &AppState, headers: &HeaderMap, required: Role) -> Result<Response> {
    let (gate, actor) = resolve_gate(state, headers).await?;
    match (gate.decide(required), actor) {
        (GateDecision::Allow, Some(actor)) => {
            let stats = dashboard::stats_for(&state.db, &actor).await?;
            Ok(Json(stats).into_response())
        }
        (decision, _) => Ok(redirect(decision)),
    }
}

fn redirect(decision: GateDecision) -> Response {
    let location = decision.location().unwrap_or(LOGIN_PATH);
    Redirect::to(location).into_response()
}

async fn landing(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let (gate, _) = resolve_gate(&state, &headers).await?;
    Ok(redirect(gate.landing()))
}

async fn login_page() -> Json<serde_json::Value> {
    Json(json!({
        "page": "login",
        "login": "POST /api/auth/login",
        "register": "POST /api/auth/register"
    }))
}

async fn health() -> &'static str {
    "ok"
}

async fn admin_home(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    dashboard_for(&state, &headers, Role::Admin).await
}

async fn manager_home(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    dashboard_for(&state, &headers, Role::Manager).await
}

async fn agent_home(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    dashboard_for(&state, &headers, Role::Agent).await
}
