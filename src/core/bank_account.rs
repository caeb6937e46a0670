//! Bank account business logic.
//!
//! Accounts belong to a manager. Managers manage their own; admins manage all
//! of them and name the owning manager when creating one.

use crate::{
    core::{
        access::Actor,
        pagination::{Page, PageRequest, fetch_page},
    },
    entities::{BankAccount, Order, Role, User, bank_account, order},
    errors::{Error, Result, Validator},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of create and update requests.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankAccountInput {
    pub bank_name: String,
    pub swift: String,
    pub iban: String,
    pub holder: String,
    pub identifier: String,
    /// Owning manager; required from admins, ignored for managers
    pub manager_id: Option<i64>,
}

/// List filters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountFilter {
    /// Bank name, holder or identifier substring
    pub search: Option<String>,
    /// Admin only: restrict to one manager
    pub manager_id: Option<i64>,
}

/// Upper-cases and strips whitespace from a SWIFT or IBAN code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// 8 or 11 alphanumerics.
#[must_use]
pub fn is_valid_swift(swift: &str) -> bool {
    matches!(swift.len(), 8 | 11) && swift.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 15 to 34 alphanumerics starting with a two-letter country code.
#[must_use]
pub fn is_valid_iban(iban: &str) -> bool {
    (15..=34).contains(&iban.len())
        && iban.chars().all(|c| c.is_ascii_alphanumeric())
        && iban.chars().take(2).all(|c| c.is_ascii_alphabetic())
}

/// Validates and normalizes the editable fields.
fn validate(input: &BankAccountInput) -> Result<BankAccountInput> {
    let swift = normalize_code(&input.swift);
    let iban = normalize_code(&input.iban);

    let mut validator = Validator::new();
    validator
        .required(&input.bank_name, "bankName")
        .required(&input.holder, "holder")
        .required(&input.identifier, "identifier")
        .required(&swift, "swift")
        .check(is_valid_swift(&swift), "swift", "must be 8 or 11 letters and digits")
        .required(&iban, "iban")
        .check(
            is_valid_iban(&iban),
            "iban",
            "must be 15 to 34 letters and digits starting with a country code",
        );
    validator.finish()?;

    Ok(BankAccountInput {
        bank_name: input.bank_name.trim().to_string(),
        swift,
        iban,
        holder: input.holder.trim().to_string(),
        identifier: input.identifier.trim().to_string(),
        manager_id: input.manager_id,
    })
}

/// Resolves the owner of a new account.
async fn resolve_owner(
    db: &DatabaseConnection,
    actor: &Actor,
    requested: Option<i64>,
) -> Result<i64> {
    if actor.role == Role::Manager {
        return Ok(actor.id);
    }
    let Some(manager_id) = requested else {
        return Err(Error::field("managerId", "is required"));
    };
    let is_manager = User::find_by_id(manager_id)
        .one(db)
        .await?
        .is_some_and(|u| u.role == Role::Manager);
    if !is_manager {
        return Err(Error::field("managerId", "must be a manager"));
    }
    Ok(manager_id)
}

async fn ensure_identifier_free(
    db: &DatabaseConnection,
    identifier: &str,
    except: Option<i64>,
) -> Result<()> {
    let mut select = BankAccount::find().filter(bank_account::Column::Identifier.eq(identifier));
    if let Some(id) = except {
        select = select.filter(bank_account::Column::Id.ne(id));
    }
    if select.count(db).await? > 0 {
        return Err(Error::Conflict {
            field: Some("identifier"),
            message: format!("identifier {identifier} is already in use"),
        });
    }
    Ok(())
}

/// Creates an account.
///
/// # Errors
/// - `Forbidden` for agents
/// - `Validation` for malformed codes or a missing owner
/// - `Conflict` on `identifier` when another account uses it
pub async fn create_bank_account(
    db: &DatabaseConnection,
    actor: &Actor,
    input: &BankAccountInput,
) -> Result<bank_account::Model> {
    actor.require(&[Role::Admin, Role::Manager])?;
    let clean = validate(input)?;
    let manager_id = resolve_owner(db, actor, clean.manager_id).await?;
    ensure_identifier_free(db, &clean.identifier, None).await?;

    let now = Utc::now();
    let created = bank_account::ActiveModel {
        bank_name: Set(clean.bank_name),
        swift: Set(clean.swift),
        iban: Set(clean.iban),
        holder: Set(clean.holder),
        identifier: Set(clean.identifier),
        manager_id: Set(manager_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "User {} created bank account {} for manager {manager_id}",
        actor.id, created.id
    );
    Ok(created)
}

/// Fetches an account the caller may manage.
pub async fn get_bank_account(
    db: &DatabaseConnection,
    actor: &Actor,
    account_id: i64,
) -> Result<bank_account::Model> {
    actor.require(&[Role::Admin, Role::Manager])?;
    BankAccount::find_by_id(account_id)
        .one(db)
        .await?
        .filter(|a| actor.is_admin() || a.manager_id == actor.id)
        .ok_or_else(|| Error::not_found("bank account", account_id))
}

/// Lists accounts visible to the caller, ordered by bank name.
pub async fn list_bank_accounts(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &BankAccountFilter,
    page: PageRequest,
) -> Result<Page<bank_account::Model>> {
    actor.require(&[Role::Admin, Role::Manager])?;

    let mut select = BankAccount::find();
    if !actor.is_admin() {
        select = select.filter(bank_account::Column::ManagerId.eq(actor.id));
    } else if let Some(manager_id) = filter.manager_id {
        select = select.filter(bank_account::Column::ManagerId.eq(manager_id));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(bank_account::Column::BankName.contains(search))
                .add(bank_account::Column::Holder.contains(search))
                .add(bank_account::Column::Identifier.contains(search)),
        );
    }

    fetch_page(
        db,
        select
            .order_by_asc(bank_account::Column::BankName)
            .order_by_asc(bank_account::Column::Id),
        page,
    )
    .await
}

/// Replaces the editable fields of an account. Admins may also move it to another manager.
pub async fn update_bank_account(
    db: &DatabaseConnection,
    actor: &Actor,
    account_id: i64,
    input: &BankAccountInput,
) -> Result<bank_account::Model> {
    let existing = get_bank_account(db, actor, account_id).await?;
    let clean = validate(input)?;
    let manager_id = match (actor.is_admin(), clean.manager_id) {
        (true, Some(requested)) => resolve_owner(db, actor, Some(requested)).await?,
        _ => existing.manager_id,
    };
    ensure_identifier_free(db, &clean.identifier, Some(account_id)).await?;

    let mut active: bank_account::ActiveModel = existing.into();
    active.bank_name = Set(clean.bank_name);
    active.swift = Set(clean.swift);
    active.iban = Set(clean.iban);
    active.holder = Set(clean.holder);
    active.identifier = Set(clean.identifier);
    active.manager_id = Set(manager_id);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    info!("User {} updated bank account {account_id}", actor.id);
    Ok(updated)
}

/// Deletes an account and unlinks it from the orders that referenced it.
pub async fn delete_bank_account(
    db: &DatabaseConnection,
    actor: &Actor,
    account_id: i64,
) -> Result<()> {
    let existing = get_bank_account(db, actor, account_id).await?;

    let unlinked = Order::update_many()
        .col_expr(order::Column::BankAccountId, Expr::value(Option::<i64>::None))
        .filter(order::Column::BankAccountId.eq(account_id))
        .exec(db)
        .await?;
    existing.delete(db).await?;

    info!(
        "User {} deleted bank account {account_id} ({} orders unlinked)",
        actor.id, unlinked.rows_affected
    );
    Ok(())
}

/// Number of accounts, optionally for one manager.
pub async fn count_bank_accounts(db: &DatabaseConnection, manager_id: Option<i64>) -> Result<u64> {
    let mut select = BankAccount::find();
    if let Some(manager_id) = manager_id {
        select = select.filter(bank_account::Column::ManagerId.eq(manager_id));
    }
    select.count(db).await.map_err(Into::into)
}
