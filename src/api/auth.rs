//! `/api/auth` - login, invitation lookup, registration and logout.

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json, Path},
    },
    core::auth::{self, AuthSession, LoginInput, RegisterInput},
    entities::Role,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

/// What the registration form shows for an invitation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationPreview {
    pub email: String,
    pub role: Role,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/invitation/{token}", get(invitation))
        .route("/register", post(register))
        .route("/logout", post(logout))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthSession>> {
    Ok(Json(auth::login(&state.db, &input).await?))
}

async fn invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationPreview>> {
    let found = auth::invitation_for_token(&state.db, &token).await?;
    Ok(Json(InvitationPreview {
        email: found.email,
        role: found.role,
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<AuthSession>)> {
    let session = auth::register(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn logout(State(state): State<AppState>, current: CurrentUser) -> Result<StatusCode> {
    auth::logout(&state.db, &current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{access::Actor, invitation::create_invitation};
    use crate::test_utils::*;
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_invitation_lookup_and_registration() -> Result<()> {
        let (app, db) = test_app().await?;
        let manager = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let invite =
            create_invitation(&db, &Actor::from(&manager), "new@agency.test", Role::Agent).await?;

        let uri = format!("/api/auth/invitation/{}", invite.token);
        let (status, _, body) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"email": "new@agency.test", "role": "agent"}));

        let (status, _, body) = call(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "token": invite.token,
                "email": "new@agency.test",
                "password": "long-enough",
                "fullName": "New Agent"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["managerId"], manager.id);
        assert!(body["token"].is_string());

        // Used invitations are gone for good
        let (status, _, _) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn test_registration_errors_are_per_field() -> Result<()> {
        let (app, _db) = test_app().await?;
        let (status, _, body) = call(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "token": "whatever",
                "email": "not-an-email",
                "password": "short",
                "fullName": ""
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["email"].is_string());
        assert!(body["errors"]["password"].is_string());
        assert!(body["errors"]["fullName"].is_string());

        let (status, _, _) =
            call(&app, Method::GET, "/api/auth/invitation/unknown", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
