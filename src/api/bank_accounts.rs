//! `/api/bankAccounts` - managers' bank accounts.

use crate::{
    api::{
        AppState,
        extract::{CurrentUser, Json, Path, Query},
    },
    core::{
        bank_account::{self, BankAccountFilter, BankAccountInput},
        pagination::{Page, PageQuery},
    },
    entities::BankAccountModel,
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
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<BankAccountFilter>,
) -> Result<Json<Page<BankAccountModel>>> {
    let page = state.page(page);
    Ok(Json(
        bank_account::list_bank_accounts(&state.db, &current.actor(), &filter, page).await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<BankAccountInput>,
) -> Result<(StatusCode, Json<BankAccountModel>)> {
    let created = bank_account::create_bank_account(&state.db, &current.actor(), &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<BankAccountModel>> {
    Ok(Json(
        bank_account::get_bank_account(&state.db, &current.actor(), id).await?,
    ))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<BankAccountInput>,
) -> Result<Json<BankAccountModel>> {
    Ok(Json(
        bank_account::update_bank_account(&state.db, &current.actor(), id, &input).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    bank_account::delete_bank_account(&state.db, &current.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::entities::Role;
    use crate::errors::Result;
    use crate::test_utils::*;
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    fn account(identifier: &str) -> Value {
        json!({
            "bankName": "Banco Central",
            "swift": "BCENESMM",
            "iban": "ES91 2100 0418 4502 0005 1332",
            "holder": "Travel Agency SL",
            "identifier": identifier
        })
    }

    #[tokio::test]
    async fn test_bank_account_endpoints() -> Result<()> {
        let (app, db) = test_app().await?;
        let manager = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let token = token_for(&db, &manager).await?;

        let (status, _, body) = call(
            &app,
            Method::POST,
            "/api/bankAccounts",
            Some(&token),
            Some(account("MAIN")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["iban"], "ES9121000418450200051332");
        assert_eq!(body["managerId"], manager.id);

        let (status, _, body) = call(
            &app,
            Method::POST,
            "/api/bankAccounts",
            Some(&token),
            Some(account("MAIN")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["errors"]["identifier"].is_string());

        let (status, _, body) = call(
            &app,
            Method::GET,
            "/api/bankAccounts?search=Central",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_agents_cannot_touch_bank_accounts() -> Result<()> {
        let (app, db) = test_app().await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, None).await?;
        let token = token_for(&db, &agent).await?;
        let (status, _, _) = call(
            &app,
            Method::POST,
            "/api/bankAccounts",
            Some(&token),
            Some(account("MAIN")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
