//! Bank account entity - Accounts owned by managers that receive client transfers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_accounts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the bank
    pub bank_name: String,
    /// SWIFT/BIC code, upper-cased
    pub swift: String,
    /// IBAN without spaces, upper-cased
    pub iban: String,
    /// Account holder name
    pub holder: String,
    /// Human identifier for the account, unique across the CRM
    #[sea_orm(unique)]
    pub identifier: String,
    /// Manager who owns the account
    pub manager_id: i64,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `BankAccount` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each account belongs to one manager
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ManagerId",
        to = "super::user::Column::Id"
    )]
    Manager,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manager.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
