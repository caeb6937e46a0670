//! Authentication business logic - passwords, sessions, login and registration.
//!
//! Passwords are stored as bcrypt hashes. A session is an opaque UUID token
//! stored in the `sessions` table; it is valid until logout. Registration is
//! only possible through an unused invitation, and consumes it in the same
//! database transaction that creates the account.

use crate::{
    config::settings::AdminSeed,
    core::invitation,
    entities::{Role, Session, User, invitation as invitation_entity, session, user},
    errors::{Error, Result, Validator},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Shortest password accepted at registration and password change.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
// Minimum bcrypt cost keeps the test suite fast.
#[cfg(test)]
const HASH_COST: u32 = 4;

/// Login request body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    /// Invitation token
    pub token: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Successful login or registration: `{token, user}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: user::Model,
}

/// Lower-cases and trims an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check: something before and after a single `@`, and a dot in the domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Hashes a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, HASH_COST).map_err(Into::into)
}

/// Checks a password against a stored bcrypt hash. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Issues a new session token for `user_id`.
pub async fn create_session<C>(db: &C, user_id: i64) -> Result<session::Model>
where
    C: ConnectionTrait,
{
    let session = session::ActiveModel {
        token: Set(Uuid::new_v4().simple().to_string()),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
    };
    session.insert(db).await.map_err(Into::into)
}

/// Resolves a bearer token to an active user.
///
/// # Errors
/// `Unauthorized` when the token is unknown or its user is gone or deactivated.
pub async fn authenticate(db: &DatabaseConnection, token: &str) -> Result<user::Model> {
    let found = Session::find_by_id(token.trim().to_string())
        .find_also_related(User)
        .one(db)
        .await?;

    match found {
        Some((_, Some(user))) if user.is_active => Ok(user),
        _ => Err(Error::Unauthorized),
    }
}

/// Verifies credentials and opens a session.
///
/// # Errors
/// `Unauthorized` on unknown email or wrong password, `Forbidden` for a deactivated account.
pub async fn login(db: &DatabaseConnection, input: &LoginInput) -> Result<AuthSession> {
    let email = normalize_email(&input.email);
    let mut validator = Validator::new();
    validator
        .required(&email, "email")
        .required(&input.password, "password");
    validator.finish()?;

    let Some(user) = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    else {
        warn!("Login attempt for unknown email {email}");
        return Err(Error::Unauthorized);
    };

    if !verify_password(&input.password, &user.password_hash) {
        warn!("Wrong password for user {}", user.id);
        return Err(Error::Unauthorized);
    }
    if !user.is_active {
        return Err(Error::forbidden("account is deactivated"));
    }

    let session = create_session(db, user.id).await?;
    info!("User {} logged in as {}", user.id, user.role);
    Ok(AuthSession {
        token: session.token,
        user,
    })
}

/// Ends a session. Unknown tokens are ignored.
pub async fn logout(db: &DatabaseConnection, token: &str) -> Result<()> {
    let result = Session::delete_by_id(token.trim().to_string())
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!("Session closed");
    }
    Ok(())
}

/// Creates an account from an invitation and opens its first session.
///
/// # Errors
/// - `Validation` for malformed input or an email that differs from the invitation's
/// - `NotFound` for an unknown token, `Conflict` for a used invitation or a taken email
pub async fn register(db: &DatabaseConnection, input: &RegisterInput) -> Result<AuthSession> {
    let email = normalize_email(&input.email);
    let mut validator = Validator::new();
    validator
        .required(&input.token, "token")
        .required(&input.full_name, "fullName")
        .check(is_valid_email(&email), "email", "is not a valid email")
        .check(
            input.password.chars().count() >= MIN_PASSWORD_LENGTH,
            "password",
            "must be at least 8 characters",
        );
    validator.finish()?;

    let txn = db.begin().await?;

    let invitation = invitation::find_usable(&txn, &input.token).await?;
    if invitation.email != email {
        return Err(Error::field(
            "email",
            "does not match the invited email address",
        ));
    }
    ensure_email_free(&txn, &email).await?;

    // Managers' agents stay under the inviting manager; admin invitations leave no link.
    let inviter = User::find_by_id(invitation.invited_by).one(&txn).await?;
    let manager_id = match (invitation.role, inviter) {
        (Role::Agent, Some(inviter)) if inviter.role == Role::Manager => Some(inviter.id),
        _ => None,
    };

    let now = Utc::now();
    let user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(hash_password(&input.password)?),
        full_name: Set(input.full_name.trim().to_string()),
        phone: Set(clean_optional(input.phone.as_deref())),
        role: Set(invitation.role),
        is_active: Set(true),
        manager_id: Set(manager_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let invitation_id = invitation.id;
    let mut used: invitation_entity::ActiveModel = invitation.into();
    used.used = Set(true);
    used.used_at = Set(Some(now));
    used.update(&txn).await?;

    let session = create_session(&txn, user.id).await?;
    txn.commit().await?;

    info!(
        "Registered user {} as {} from invitation {}",
        user.id, user.role, invitation_id
    );
    Ok(AuthSession {
        token: session.token,
        user,
    })
}

/// Changes the caller's password after checking the current one.
pub async fn change_password(
    db: &DatabaseConnection,
    user_id: i64,
    current_password: &str,
    new_password: &str,
) -> Result<()> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    if !verify_password(current_password, &user.password_hash) {
        return Err(Error::field("currentPassword", "is incorrect"));
    }
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::field("newPassword", "must be at least 8 characters"));
    }

    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(hash_password(new_password)?);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    info!("User {user_id} changed their password");
    Ok(())
}

/// Creates the bootstrap admin when the database holds no admin yet.
///
/// Returns `true` if an account was created.
pub async fn seed_admin(db: &DatabaseConnection, seed: &AdminSeed) -> Result<bool> {
    let admins = User::find()
        .filter(user::Column::Role.eq(Role::Admin))
        .count(db)
        .await?;
    if admins > 0 {
        return Ok(false);
    }

    let email = normalize_email(&seed.email);
    if !is_valid_email(&email) {
        return Err(Error::Config {
            message: format!("admin email {email:?} is not a valid email"),
        });
    }
    if seed.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::Config {
            message: "admin password must be at least 8 characters".to_string(),
        });
    }
    ensure_email_free(db, &email).await?;

    let now = Utc::now();
    let admin = user::ActiveModel {
        email: Set(email),
        password_hash: Set(hash_password(&seed.password)?),
        full_name: Set(seed.full_name.clone()),
        phone: Set(None),
        role: Set(Role::Admin),
        is_active: Set(true),
        manager_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Seeded bootstrap admin {}", admin.id);
    Ok(true)
}

/// Fails with a `Conflict` on `email` when an account already uses it.
pub async fn ensure_email_free<C>(db: &C, email: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let taken = User::find()
        .filter(user::Column::Email.eq(email))
        .count(db)
        .await?
        > 0;
    if taken {
        return Err(Error::Conflict {
            field: Some("email"),
            message: format!("{email} is already registered"),
        });
    }
    Ok(())
}

/// Returns the invitation behind `token` for the registration form to prefill.
pub async fn invitation_for_token(
    db: &DatabaseConnection,
    token: &str,
) -> Result<invitation_entity::Model> {
    invitation::find_usable(db, token).await
}

/// Trims an optional string and drops it when blank.
pub(crate) fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
