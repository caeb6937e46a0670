//! User entity - Represents every account in the CRM.
//!
//! Admins, managers and agents share one table and are told apart by `role`.
//! Agents carry the `manager_id` of the manager whose invitation they used,
//! which is what scopes a manager's view of agents and their orders.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role. Decides which dashboard a session lands on and what it may touch.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every record
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Runs a team of agents and owns bank accounts
    #[sea_orm(string_value = "manager")]
    Manager,
    /// Books orders for clients
    #[sea_orm(string_value = "agent")]
    Agent,
}

impl Role {
    /// Route of the dashboard a user with this role lands on.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Manager => "/manager",
            Self::Agent => "/agent",
        }
    }

    /// Lowercase name as used on the wire and in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login email, stored lower-cased
    #[sea_orm(unique)]
    pub email: String,
    /// bcrypt hash of the password
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    /// Display name
    pub full_name: String,
    /// Optional contact phone
    pub phone: Option<String>,
    /// Account role
    pub role: Role,
    /// Deactivated users cannot log in
    pub is_active: bool,
    /// For agents: the manager who invited them
    pub manager_id: Option<i64>,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many sessions
    #[sea_orm(has_many = "super::session::Entity")]
    Sessions,
    /// One agent (or manager) creates many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// One manager owns many bank accounts
    #[sea_orm(has_many = "super::bank_account::Entity")]
    BankAccounts,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
