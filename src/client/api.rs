//! REST calls against the CRM server.

use crate::{
    api::{
        agents::AgentStatus, auth::InvitationPreview, error::ErrorBody, orders::PaymentChange,
        orders::StatusChange, profile::PasswordChange,
    },
    client::session::{SessionStore, StoredSession},
    core::{
        access::LOGIN_PATH,
        auth::{AuthSession, LoginInput, RegisterInput},
        bank_account::BankAccountInput,
        dashboard::DashboardStats,
        invitation::InvitationInput,
        order::{OrderInput, OrderView, PaymentPart},
        pagination::Page,
        pricing::Derived,
        user::{ProfileUpdate, UserUpdate},
    },
    entities::{
        BankAccountModel, InvitationModel, OrderStatus, PaymentStatus, Role, UserModel,
    },
    errors::{Error, Result},
};
use reqwest::{Method, RequestBuilder, StatusCode, redirect::Policy};
use serde::{Serialize, de::DeserializeOwned};
use std::env;
use tracing::{debug, info, warn};

/// Environment variable holding the server base URL.
pub const API_URL_ENV: &str = "CRM_API_URL";
const DEFAULT_API_URL: &str = "http://localhost:8080";

/// HTTP client bound to one server and one session store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: SessionStore,
}

impl ApiClient {
    /// Builds a client. Redirects are not followed: the dashboard routes
    /// answer `303` when the session is not accepted.
    pub fn new(base_url: impl Into<String>, store: SessionStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        })
    }

    /// Client for `CRM_API_URL` using the session file from `CRM_SESSION_FILE`.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(base_url, SessionStore::from_env())
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let builder = self.http.request(method, self.url(path));
        Ok(match self.store.load()? {
            Some(session) => builder.bearer_auth(session.token),
            None => builder,
        })
    }

    /// Sends a request and decodes a JSON answer.
    ///
    /// Non-success answers become `Error::Api`; `401` and `403` also clear
    /// the stored session.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.check(builder).await?;
        Ok(response.json().await?)
    }

    /// Like [`Self::send`] for answers without a body.
    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.check(builder).await.map(|_| ())
    }

    async fn check(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {status}", response.url());
        if status.is_success() {
            return Ok(response);
        }
        if status.is_redirection() {
            warn!("Server redirected the request; clearing the stored session");
            self.store.clear()?;
            return Err(Error::Unauthorized);
        }

        let body: ErrorBody = response.json().await.unwrap_or_else(|_| ErrorBody {
            message: status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
            ..ErrorBody::default()
        });
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!("Server answered {status}; clearing the stored session");
            self.store.clear()?;
        }
        Err(Error::Api {
            status: status.as_u16(),
            message: body.message,
            errors: body.errors,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)?).await
    }

    async fn get_with<T: DeserializeOwned>(&self, path: &str, query: &impl Serialize) -> Result<T> {
        self.send(self.request(Method::GET, path)?.query(query)).await
    }

    async fn with_body<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        self.send(self.request(method, path)?.json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, path)?).await
    }

    fn remember(&self, session: AuthSession) -> Result<UserModel> {
        self.store.save(&StoredSession {
            token: session.token,
            user: session.user.clone(),
        })?;
        info!("Logged in as {} ({})", session.user.email, session.user.role);
        Ok(session.user)
    }

    // Auth

    pub async fn login(&self, email: &str, password: &str) -> Result<UserModel> {
        let input = LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session: AuthSession = self.with_body(Method::POST, "/api/auth/login", &input).await?;
        self.remember(session)
    }

    pub async fn invitation(&self, token: &str) -> Result<InvitationPreview> {
        self.get(&format!("/api/auth/invitation/{token}")).await
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<UserModel> {
        let session: AuthSession = self.with_body(Method::POST, "/api/auth/register", input).await?;
        self.remember(session)
    }

    /// Ends the session on the server when possible, then forgets it locally.
    pub async fn logout(&self) -> Result<()> {
        if self.store.load()?.is_some()
            && let Err(e) = self
                .send_empty(self.request(Method::POST, "/api/auth/logout")?)
                .await
        {
            warn!("Server logout failed: {e}");
        }
        self.store.clear()
    }

    /// The stored session, if any.
    pub fn current(&self) -> Result<Option<StoredSession>> {
        self.store.load()
    }

    /// Fetches the dashboard of the stored user's role.
    ///
    /// # Errors
    /// `Unauthorized` without a stored session.
    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let gate = self.store.gate()?;
        let Some(home) = gate.landing().location().filter(|p| *p != LOGIN_PATH)
        else {
            return Err(Error::Unauthorized);
        };
        self.get(home).await
    }

    // Profile

    pub async fn profile(&self) -> Result<UserModel> {
        self.get("/api/profile").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserModel> {
        self.with_body(Method::PATCH, "/api/profile", update).await
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let body = PasswordChange {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        self.send_empty(self.request(Method::POST, "/api/profile/password")?.json(&body))
            .await
    }

    // Invitations

    pub async fn list_invitations(&self, query: &impl Serialize) -> Result<Page<InvitationModel>> {
        self.get_with("/api/invitations", query).await
    }

    pub async fn create_invitation(&self, email: &str, role: Role) -> Result<InvitationModel> {
        let input = InvitationInput {
            email: email.to_string(),
            role,
        };
        self.with_body(Method::POST, "/api/invitations", &input).await
    }

    pub async fn cancel_invitation(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/invitations/{id}")).await
    }

    // Users and agents

    pub async fn list_users(&self, query: &impl Serialize) -> Result<Page<UserModel>> {
        self.get_with("/api/users", query).await
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<UserModel> {
        self.with_body(Method::PATCH, &format!("/api/users/{id}"), update)
            .await
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/users/{id}")).await
    }

    pub async fn list_agents(&self, query: &impl Serialize) -> Result<Page<UserModel>> {
        self.get_with("/api/agents", query).await
    }

    pub async fn set_agent_active(&self, id: i64, is_active: bool) -> Result<UserModel> {
        self.with_body(
            Method::PATCH,
            &format!("/api/agents/{id}/status"),
            &AgentStatus { is_active },
        )
        .await
    }

    // Bank accounts

    pub async fn list_bank_accounts(
        &self,
        query: &impl Serialize,
    ) -> Result<Page<BankAccountModel>> {
        self.get_with("/api/bankAccounts", query).await
    }

    pub async fn create_bank_account(&self, input: &BankAccountInput) -> Result<BankAccountModel> {
        self.with_body(Method::POST, "/api/bankAccounts", input).await
    }

    pub async fn update_bank_account(
        &self,
        id: i64,
        input: &BankAccountInput,
    ) -> Result<BankAccountModel> {
        self.with_body(Method::PUT, &format!("/api/bankAccounts/{id}"), input)
            .await
    }

    pub async fn delete_bank_account(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/bankAccounts/{id}")).await
    }

    // Orders

    pub async fn list_orders(&self, query: &impl Serialize) -> Result<Page<OrderView>> {
        self.get_with("/api/orders", query).await
    }

    pub async fn get_order(&self, id: i64) -> Result<OrderView> {
        self.get(&format!("/api/orders/{id}")).await
    }

    pub async fn create_order(&self, input: &OrderInput) -> Result<OrderView> {
        self.with_body(Method::POST, "/api/orders", input).await
    }

    pub async fn update_order(&self, id: i64, input: &OrderInput) -> Result<OrderView> {
        self.with_body(Method::PUT, &format!("/api/orders/{id}"), input)
            .await
    }

    pub async fn delete_order(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/orders/{id}")).await
    }

    pub async fn preview_order(&self, input: &OrderInput) -> Result<Derived> {
        self.with_body(Method::POST, "/api/orders/preview", input).await
    }

    pub async fn set_order_status(&self, id: i64, status: OrderStatus) -> Result<OrderView> {
        self.with_body(
            Method::PATCH,
            &format!("/api/orders/{id}/status"),
            &StatusChange { status },
        )
        .await
    }

    pub async fn set_payment_status(
        &self,
        id: i64,
        part: PaymentPart,
        status: PaymentStatus,
    ) -> Result<OrderView> {
        let part = match part {
            PaymentPart::Deposit => "deposit",
            PaymentPart::Balance => "balance",
        };
        self.with_body(
            Method::PATCH,
            &format!("/api/orders/{id}/payments/{part}"),
            &PaymentChange { status },
        )
        .await
    }
}

/// One-line message for showing a failed call to a person.
///
/// Transport failures ask to retry, validation failures list the fields,
/// rejected sessions ask to log in again.
#[must_use]
pub fn describe(error: &Error) -> String {
    match error {
        Error::Http(_) => "Could not reach the server, please try again.".to_string(),
        Error::Api { errors, .. } if !errors.is_empty() => errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; "),
        e if e.is_auth_failure() => "Your session has ended, please log in again.".to_string(),
        Error::Unauthorized => "Not logged in. Run `crmctl login` first.".to_string(),
        Error::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
