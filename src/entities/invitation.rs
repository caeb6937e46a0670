//! Invitation entity - Single-use registration rights for one email and role.
//!
//! An invitation is created by an admin or manager, consumed once at
//! registration (`used` becomes true and stays true) or cancelled by deleting
//! the row while it is still unused.

use super::user::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invitation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitations")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the invitation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Email the invitation was issued to, lower-cased
    pub email: String,
    /// Role granted on registration (`manager` or `agent`)
    pub role: Role,
    /// Registration token handed to the invitee
    #[sea_orm(unique)]
    pub token: String,
    /// Terminal flag - set once the invitation is consumed
    pub used: bool,
    /// User who issued the invitation
    pub invited_by: i64,
    /// When the invitation was issued
    pub created_at: DateTimeUtc,
    /// When the invitation was consumed
    pub used_at: Option<DateTimeUtc>,
}

/// Invitations reference their issuer by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
