//! Order entity - A booked stay for a client.
//!
//! `nights`, `total_price`, `balance_amount` and `reservation_number` are
//! derived columns. They are written by `core::order` from the editable
//! fields on every create and update and are never taken from input.

use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Lifecycle of an order as decided by a manager or admin.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting a decision
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted by a manager or admin
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined by a manager or admin
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Status of one part (deposit or balance) of an order's payment.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Nothing received yet
    #[default]
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    /// Received in full
    #[sea_orm(string_value = "paid")]
    Paid,
}

impl OrderStatus {
    /// Lowercase name as used on the wire and in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list of short strings stored as one JSON column (phones, payment methods).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

impl From<Vec<String>> for StringList {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who created the order
    pub agent_id: i64,

    /// Arrival date
    pub check_in: Date,
    /// Departure date, never before `check_in`
    pub check_out: Date,
    /// Derived: calendar days between check-in and check-out
    pub nights: i64,

    /// Client full name
    pub client_name: String,
    /// Client phone numbers
    #[sea_orm(column_type = "Json")]
    pub client_phones: StringList,
    /// Client email
    pub client_email: Option<String>,
    /// Passport or ID document number
    pub client_document: Option<String>,
    /// Client country code, used in the reservation number
    pub client_country: String,

    /// Destination country
    pub travel_country: String,
    /// Destination city
    pub travel_city: String,
    /// Property (hotel, apartment) name
    pub property_name: String,
    /// Property number, opaque
    pub property_number: String,

    /// Price quoted by the property
    pub official_price: f64,
    /// Tax and cleaning fees
    pub tax_clean: f64,
    /// Discount granted to the client
    pub discount: f64,
    /// Derived: `official_price + tax_clean - discount`
    pub total_price: f64,
    /// Derived: `{country}{DDMMYYYY}N{property}`
    pub reservation_number: String,

    /// Deposit payment status
    pub deposit_status: PaymentStatus,
    /// Deposit amount
    pub deposit_amount: f64,
    /// Methods used for the deposit (cash, card, transfer, ...)
    #[sea_orm(column_type = "Json")]
    pub deposit_methods: StringList,
    /// Balance payment status
    pub balance_status: PaymentStatus,
    /// Derived: `total_price - deposit_amount`
    pub balance_amount: f64,
    /// Methods used for the balance
    #[sea_orm(column_type = "Json")]
    pub balance_methods: StringList,
    /// Bank account that receives transfers for this order
    pub bank_account_id: Option<i64>,

    /// Decision on the order
    pub status_order: OrderStatus,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order is created by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AgentId",
        to = "super::user::Column::Id"
    )]
    Agent,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
