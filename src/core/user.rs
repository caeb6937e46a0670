//! User and agent business logic.
//!
//! Admins manage every account through the users screens. Managers manage
//! the agents attached to them through the agents screens. Every account can
//! read and edit its own profile.

use crate::{
    core::{
        access::Actor,
        auth::clean_optional,
        pagination::{Page, PageRequest, fetch_page},
    },
    entities::{BankAccount, Order, Role, Session, User, bank_account, order, session, user},
    errors::{Error, Result, Validator},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// List filters shared by the users and agents screens.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub active: Option<bool>,
    /// Name or email substring
    pub search: Option<String>,
}

/// Fields an admin may change on any account.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

fn apply_filter(mut select: Select<User>, filter: &UserFilter) -> Select<User> {
    if let Some(role) = filter.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    if let Some(active) = filter.active {
        select = select.filter(user::Column::IsActive.eq(active));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(user::Column::FullName.contains(search))
                .add(user::Column::Email.contains(search.to_lowercase())),
        );
    }
    select
}

/// Finds a user by id.
pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Fetches any account (admin only).
pub async fn get_user(db: &DatabaseConnection, actor: &Actor, user_id: i64) -> Result<user::Model> {
    actor.require(&[Role::Admin])?;
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))
}

/// Lists every account (admin only), ordered by name.
pub async fn list_users(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &UserFilter,
    page: PageRequest,
) -> Result<Page<user::Model>> {
    actor.require(&[Role::Admin])?;
    let select = apply_filter(User::find(), filter)
        .order_by_asc(user::Column::FullName)
        .order_by_asc(user::Column::Id);
    fetch_page(db, select, page).await
}

/// Lists agents visible to the caller: all agents for admins, their own for managers.
pub async fn list_agents(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &UserFilter,
    page: PageRequest,
) -> Result<Page<user::Model>> {
    actor.require(&[Role::Admin, Role::Manager])?;
    let agent_filter = UserFilter {
        role: Some(Role::Agent),
        ..filter.clone()
    };
    let mut select = apply_filter(User::find(), &agent_filter);
    if !actor.is_admin() {
        select = select.filter(user::Column::ManagerId.eq(actor.id));
    }
    fetch_page(
        db,
        select
            .order_by_asc(user::Column::FullName)
            .order_by_asc(user::Column::Id),
        page,
    )
    .await
}

/// Fetches an agent the caller manages.
///
/// # Errors
/// `NotFound` when the id is not an agent or belongs to another manager.
pub async fn get_agent(
    db: &DatabaseConnection,
    actor: &Actor,
    agent_id: i64,
) -> Result<user::Model> {
    actor.require(&[Role::Admin, Role::Manager])?;
    User::find_by_id(agent_id)
        .one(db)
        .await?
        .filter(|u| u.role == Role::Agent)
        .filter(|u| actor.is_admin() || u.manager_id == Some(actor.id))
        .ok_or_else(|| Error::not_found("agent", agent_id))
}

/// Activates or deactivates one of the caller's agents.
pub async fn set_agent_active(
    db: &DatabaseConnection,
    actor: &Actor,
    agent_id: i64,
    active: bool,
) -> Result<user::Model> {
    get_agent(db, actor, agent_id).await?;
    let updated = set_active(db, agent_id, active).await?;
    info!("User {} set agent {agent_id} active={active}", actor.id);
    Ok(updated)
}

/// Sets the active flag. Deactivation also closes the user's sessions.
pub async fn set_active(
    db: &DatabaseConnection,
    user_id: i64,
    active: bool,
) -> Result<user::Model> {
    let found = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let mut active_model: user::ActiveModel = found.into();
    active_model.is_active = Set(active);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;

    if !active {
        Session::delete_many()
            .filter(session::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
    }
    Ok(updated)
}

/// Admin edit of any account.
pub async fn update_user(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i64,
    update: &UserUpdate,
) -> Result<user::Model> {
    actor.require(&[Role::Admin])?;
    if update.is_active == Some(false) && user_id == actor.id {
        return Err(Error::field("isActive", "you cannot deactivate yourself"));
    }

    let found = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let mut updated = apply_profile(
        db,
        found,
        &ProfileUpdate {
            full_name: update.full_name.clone(),
            phone: update.phone.clone(),
        },
    )
    .await?;
    if let Some(active) = update.is_active
        && active != updated.is_active
    {
        updated = set_active(db, user_id, active).await?;
    }

    info!("Admin {} updated user {user_id}", actor.id);
    Ok(updated)
}

/// Edits the caller's own profile.
pub async fn update_profile(
    db: &DatabaseConnection,
    actor: &Actor,
    update: &ProfileUpdate,
) -> Result<user::Model> {
    let found = User::find_by_id(actor.id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", actor.id))?;
    apply_profile(db, found, update).await
}

async fn apply_profile(
    db: &DatabaseConnection,
    found: user::Model,
    update: &ProfileUpdate,
) -> Result<user::Model> {
    let mut validator = Validator::new();
    if let Some(name) = &update.full_name {
        validator.required(name, "fullName");
    }
    validator.finish()?;

    let mut active: user::ActiveModel = found.into();
    if let Some(name) = &update.full_name {
        active.full_name = Set(name.trim().to_string());
    }
    if let Some(phone) = &update.phone {
        active.phone = Set(clean_optional(Some(phone)));
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Deletes an account that owns no orders or bank accounts (admin only).
///
/// # Errors
/// `Conflict` when the account still owns records; deactivate it instead.
pub async fn delete_user(db: &DatabaseConnection, actor: &Actor, user_id: i64) -> Result<()> {
    actor.require(&[Role::Admin])?;
    if user_id == actor.id {
        return Err(Error::Conflict {
            field: None,
            message: "you cannot delete your own account".to_string(),
        });
    }

    let found = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let orders = Order::find()
        .filter(order::Column::AgentId.eq(user_id))
        .count(db)
        .await?;
    let accounts = BankAccount::find()
        .filter(bank_account::Column::ManagerId.eq(user_id))
        .count(db)
        .await?;
    if orders > 0 || accounts > 0 {
        return Err(Error::Conflict {
            field: None,
            message: format!(
                "user {user_id} owns {orders} orders and {accounts} bank accounts; deactivate instead"
            ),
        });
    }

    Session::delete_many()
        .filter(session::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    // Agents of a deleted manager become unassigned
    User::update_many()
        .col_expr(user::Column::ManagerId, Expr::value(Option::<i64>::None))
        .filter(user::Column::ManagerId.eq(user_id))
        .exec(db)
        .await?;
    found.delete(db).await?;

    info!("Admin {} deleted user {user_id}", actor.id);
    Ok(())
}

/// Counts accounts with an optional role, active flag and manager.
pub async fn count_users(
    db: &DatabaseConnection,
    role: Option<Role>,
    active: Option<bool>,
    manager_id: Option<i64>,
) -> Result<u64> {
    let mut select = apply_filter(
        User::find(),
        &UserFilter {
            role,
            active,
            search: None,
        },
    );
    if let Some(manager_id) = manager_id {
        select = select.filter(user::Column::ManagerId.eq(manager_id));
    }
    select.count(db).await.map_err(Into::into)
}
