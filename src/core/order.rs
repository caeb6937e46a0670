//! Order business logic - booking, editing, listing and the status lifecycles.
//!
//! Orders are written from an [`OrderInput`] draft. Every create and update
//! re-runs the pricing derivation so `nights`, `total_price`,
//! `balance_amount` and `reservation_number` never disagree with the fields
//! they come from.
//!
//! Two independent state machines live on an order:
//! - the decision, `pending -> approved | rejected`, which a manager or admin
//!   may move to any other value
//! - the deposit and balance payment statuses, each `unpaid <-> paid`
//!
//! Both are changed only by managers and admins, one call per transition.
//! Re-applying the current value is rejected.

use crate::{
    core::{
        access::Actor,
        auth::{clean_optional, is_valid_email, normalize_email},
        pagination::{Page, PageRequest, fetch_page},
        pricing::{self, Derived, PricingInput},
    },
    entities::{BankAccount, Order, OrderStatus, PaymentStatus, Role, StringList, User, order},
    errors::{Error, Result, Validator},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Rounding slack when comparing a deposit against a computed total.
const AMOUNT_EPSILON: f64 = 1e-9;

/// Client block of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientInfo {
    pub name: String,
    pub phones: Vec<String>,
    pub email: Option<String>,
    /// Passport or ID number
    pub document: Option<String>,
    /// Country code, part of the reservation number
    pub country: String,
}

/// Destination block of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TravelInfo {
    pub country: String,
    pub city: String,
    pub property_name: String,
    pub property_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingFields {
    pub official_price: f64,
    pub tax_clean: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DepositInput {
    pub amount: f64,
    pub methods: Vec<String>,
}

/// The balance amount is always derived, so only its methods are editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BalanceInput {
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentsInput {
    pub deposit: DepositInput,
    pub balance: BalanceInput,
}

/// Create/update body and preview draft. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderInput {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub client: ClientInfo,
    pub travel: TravelInfo,
    pub pricing: PricingFields,
    pub payments: PaymentsInput,
    pub bank_account_id: Option<i64>,
    pub notes: Option<String>,
}

impl OrderInput {
    fn pricing_input(&self) -> PricingInput<'_> {
        PricingInput {
            check_in: self.check_in,
            check_out: self.check_out,
            official_price: self.pricing.official_price,
            tax_clean: self.pricing.tax_clean,
            discount: self.pricing.discount,
            deposit_amount: self.payments.deposit.amount,
            client_country: &self.client.country,
            property_number: &self.travel.property_number,
        }
    }
}

/// Pricing block of an order as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingView {
    pub official_price: f64,
    pub tax_clean: f64,
    pub discount: f64,
    pub total_price: f64,
}

/// One part of the payment split.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentView {
    pub status: PaymentStatus,
    pub amount: f64,
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentsView {
    pub deposit: PaymentView,
    pub balance: PaymentView,
}

/// An order as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: i64,
    pub agent_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub client: ClientInfo,
    pub travel: TravelInfo,
    pub pricing: PricingView,
    pub reservation_number: String,
    pub payments: PaymentsView,
    pub bank_account_id: Option<i64>,
    pub status_order: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl From<order::Model> for OrderView {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            agent_id: model.agent_id,
            check_in: model.check_in,
            check_out: model.check_out,
            nights: model.nights,
            client: ClientInfo {
                name: model.client_name,
                phones: model.client_phones.0,
                email: model.client_email,
                document: model.client_document,
                country: model.client_country,
            },
            travel: TravelInfo {
                country: model.travel_country,
                city: model.travel_city,
                property_name: model.property_name,
                property_number: model.property_number,
            },
            pricing: PricingView {
                official_price: model.official_price,
                tax_clean: model.tax_clean,
                discount: model.discount,
                total_price: model.total_price,
            },
            reservation_number: model.reservation_number,
            payments: PaymentsView {
                deposit: PaymentView {
                    status: model.deposit_status,
                    amount: model.deposit_amount,
                    methods: model.deposit_methods.0,
                },
                balance: PaymentView {
                    status: model.balance_status,
                    amount: model.balance_amount,
                    methods: model.balance_methods.0,
                },
            },
            bank_account_id: model.bank_account_id,
            status_order: model.status_order,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Which half of the payment split a status change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPart {
    Deposit,
    Balance,
}

impl PaymentPart {
    const fn subject(self) -> &'static str {
        match self {
            Self::Deposit => "deposit status",
            Self::Balance => "balance status",
        }
    }
}

/// List filters. Dates bound the check-in, inclusive.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub deposit_status: Option<PaymentStatus>,
    pub balance_status: Option<PaymentStatus>,
    /// Client name or reservation number substring
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub agent_id: Option<i64>,
}

/// Derived fields for a draft; nothing is validated or saved.
#[must_use]
pub fn preview(input: &OrderInput) -> Derived {
    pricing::derive(&input.pricing_input())
}

/// A draft that passed validation, with its derived fields.
struct Checked {
    check_in: NaiveDate,
    check_out: NaiveDate,
    nights: i64,
    derived: Derived,
}

fn validate(input: &OrderInput) -> Result<Checked> {
    let derived = preview(input);
    let official = input.pricing.official_price;
    let tax = input.pricing.tax_clean;
    let discount = input.pricing.discount;
    let deposit = input.payments.deposit.amount;

    let mut validator = Validator::new();
    validator
        .check(input.check_in.is_some(), "checkIn", "is required")
        .check(input.check_out.is_some(), "checkOut", "is required")
        .check(derived.dates_valid, "checkOut", "must not be before check-in")
        .required(&input.client.name, "client.name")
        .required(&input.client.country, "client.country")
        .required(&input.travel.country, "travel.country")
        .required(&input.travel.city, "travel.city")
        .required(&input.travel.property_name, "travel.propertyName")
        .required(&input.travel.property_number, "travel.propertyNumber")
        .amount(official, "pricing.officialPrice")
        .amount(tax, "pricing.taxClean")
        .amount(discount, "pricing.discount")
        .amount(deposit, "payments.deposit.amount")
        .check(
            discount <= official + tax,
            "pricing.discount",
            "must not exceed the price plus taxes",
        )
        .check(
            deposit <= derived.total_price + AMOUNT_EPSILON,
            "payments.deposit.amount",
            "must not exceed the total price",
        );
    if let Some(email) = clean_optional(input.client.email.as_deref()) {
        validator.check(
            is_valid_email(&normalize_email(&email)),
            "client.email",
            "is not a valid email",
        );
    }
    validator.finish()?;

    match (input.check_in, input.check_out, derived.nights) {
        (Some(check_in), Some(check_out), Some(nights)) => Ok(Checked {
            check_in,
            check_out,
            nights,
            derived,
        }),
        _ => Err(Error::field("checkIn", "is required")),
    }
}

/// Trims entries and drops blank ones.
fn clean_list(values: &[String]) -> StringList {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .into()
}

/// Checks that `id` names a bank account of the team the order belongs to.
///
/// The team is the manager of the order's agent, or the agent itself when it
/// is a manager. Admins may link any account.
async fn ensure_bank_account_usable(
    db: &DatabaseConnection,
    actor: &Actor,
    agent_id: i64,
    id: Option<i64>,
) -> Result<()> {
    let Some(id) = id else {
        return Ok(());
    };
    let Some(account) = BankAccount::find_by_id(id).one(db).await? else {
        return Err(Error::field("bankAccountId", "does not exist"));
    };
    if actor.is_admin() {
        return Ok(());
    }

    let team = User::find_by_id(agent_id)
        .one(db)
        .await?
        .and_then(|agent| match agent.role {
            Role::Manager => Some(agent.id),
            Role::Admin | Role::Agent => agent.manager_id,
        });
    if team != Some(account.manager_id) {
        return Err(Error::field("bankAccountId", "belongs to another team"));
    }
    Ok(())
}

/// Copies the editable and derived fields of a checked draft onto `active`.
fn apply(active: &mut order::ActiveModel, input: &OrderInput, checked: Checked) {
    active.check_in = Set(checked.check_in);
    active.check_out = Set(checked.check_out);
    active.nights = Set(checked.nights);
    active.client_name = Set(input.client.name.trim().to_string());
    active.client_phones = Set(clean_list(&input.client.phones));
    active.client_email =
        Set(clean_optional(input.client.email.as_deref()).map(|e| normalize_email(&e)));
    active.client_document = Set(clean_optional(input.client.document.as_deref()));
    active.client_country = Set(input.client.country.trim().to_string());
    active.travel_country = Set(input.travel.country.trim().to_string());
    active.travel_city = Set(input.travel.city.trim().to_string());
    active.property_name = Set(input.travel.property_name.trim().to_string());
    active.property_number = Set(input.travel.property_number.trim().to_string());
    active.official_price = Set(input.pricing.official_price);
    active.tax_clean = Set(input.pricing.tax_clean);
    active.discount = Set(input.pricing.discount);
    active.total_price = Set(checked.derived.total_price);
    active.reservation_number = Set(checked.derived.reservation_number);
    active.deposit_amount = Set(input.payments.deposit.amount);
    active.deposit_methods = Set(clean_list(&input.payments.deposit.methods));
    active.balance_amount = Set(checked.derived.balance_amount);
    active.balance_methods = Set(clean_list(&input.payments.balance.methods));
    active.bank_account_id = Set(input.bank_account_id);
    active.notes = Set(clean_optional(input.notes.as_deref()));
    active.updated_at = Set(Utc::now());
}

/// Books a new order on behalf of the caller, who becomes its agent.
///
/// # Errors
/// `Validation` for an incomplete or inconsistent draft or an unknown bank account.
pub async fn create_order(
    db: &DatabaseConnection,
    actor: &Actor,
    input: &OrderInput,
) -> Result<order::Model> {
    let checked = validate(input)?;
    ensure_bank_account_usable(db, actor, actor.id, input.bank_account_id).await?;

    let now = Utc::now();
    let mut active = order::ActiveModel {
        agent_id: Set(actor.id),
        deposit_status: Set(PaymentStatus::Unpaid),
        balance_status: Set(PaymentStatus::Unpaid),
        status_order: Set(OrderStatus::Pending),
        created_at: Set(now),
        ..Default::default()
    };
    apply(&mut active, input, checked);
    let created = active.insert(db).await?;

    info!(
        "User {} created order {} ({})",
        actor.id, created.id, created.reservation_number
    );
    Ok(created)
}

/// Fetches an order inside the caller's scope.
///
/// # Errors
/// `NotFound` when missing or outside the scope.
pub async fn get_order(
    db: &DatabaseConnection,
    actor: &Actor,
    order_id: i64,
) -> Result<order::Model> {
    let found = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))?;
    if !actor.can_see_agent(db, found.agent_id).await? {
        return Err(Error::not_found("order", order_id));
    }
    Ok(found)
}

/// Replaces the editable fields of an order and re-derives the rest.
///
/// Statuses are untouched. Agents may only edit their own pending orders.
pub async fn update_order(
    db: &DatabaseConnection,
    actor: &Actor,
    order_id: i64,
    input: &OrderInput,
) -> Result<order::Model> {
    let existing = get_order(db, actor, order_id).await?;
    if actor.role == Role::Agent && existing.status_order != OrderStatus::Pending {
        return Err(Error::forbidden(format!(
            "order {order_id} is {} and can no longer be edited",
            existing.status_order
        )));
    }
    let checked = validate(input)?;
    ensure_bank_account_usable(db, actor, existing.agent_id, input.bank_account_id).await?;

    let mut active: order::ActiveModel = existing.into();
    apply(&mut active, input, checked);
    let updated = active.update(db).await?;

    info!("User {} updated order {order_id}", actor.id);
    Ok(updated)
}

/// Deletes an order (managers and admins).
pub async fn delete_order(db: &DatabaseConnection, actor: &Actor, order_id: i64) -> Result<()> {
    actor.require(&[Role::Admin, Role::Manager])?;
    let existing = get_order(db, actor, order_id).await?;
    existing.delete(db).await?;
    info!("User {} deleted order {order_id}", actor.id);
    Ok(())
}

/// Adds the scope and filter conditions to `select`.
pub(crate) async fn scoped(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &OrderFilter,
) -> Result<Select<Order>> {
    let mut select = Order::find();
    if let Some(ids) = actor.visible_agent_ids(db).await? {
        select = select.filter(order::Column::AgentId.is_in(ids));
    }
    if let Some(agent_id) = filter.agent_id {
        select = select.filter(order::Column::AgentId.eq(agent_id));
    }
    if let Some(status) = filter.status {
        select = select.filter(order::Column::StatusOrder.eq(status));
    }
    if let Some(status) = filter.deposit_status {
        select = select.filter(order::Column::DepositStatus.eq(status));
    }
    if let Some(status) = filter.balance_status {
        select = select.filter(order::Column::BalanceStatus.eq(status));
    }
    if let Some(from) = filter.from {
        select = select.filter(order::Column::CheckIn.gte(from));
    }
    if let Some(to) = filter.to {
        select = select.filter(order::Column::CheckIn.lte(to));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(order::Column::ClientName.contains(search))
                .add(order::Column::ReservationNumber.contains(search)),
        );
    }
    Ok(select)
}

/// Lists orders in the caller's scope, newest first.
pub async fn list_orders(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &OrderFilter,
    page: PageRequest,
) -> Result<Page<order::Model>> {
    let select = scoped(db, actor, filter)
        .await?
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id);
    fetch_page(db, select, page).await
}

/// Moves an order to another decision (managers and admins).
///
/// # Errors
/// `InvalidTransition` when `status` is already the current one.
pub async fn set_order_status(
    db: &DatabaseConnection,
    actor: &Actor,
    order_id: i64,
    status: OrderStatus,
) -> Result<order::Model> {
    actor.require(&[Role::Admin, Role::Manager])?;
    let existing = get_order(db, actor, order_id).await?;
    if existing.status_order == status {
        return Err(Error::InvalidTransition {
            subject: "order status",
            from: existing.status_order.to_string(),
            to: status.to_string(),
        });
    }

    let from = existing.status_order;
    let mut active: order::ActiveModel = existing.into();
    active.status_order = Set(status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    info!("User {} moved order {order_id} from {from} to {status}", actor.id);
    Ok(updated)
}

/// Flips the deposit or balance status (managers and admins).
///
/// # Errors
/// `Forbidden` for agents, `InvalidTransition` when `status` is already the current one.
pub async fn set_payment_status(
    db: &DatabaseConnection,
    actor: &Actor,
    order_id: i64,
    part: PaymentPart,
    status: PaymentStatus,
) -> Result<order::Model> {
    actor.require(&[Role::Admin, Role::Manager])?;
    let existing = get_order(db, actor, order_id).await?;
    let current = match part {
        PaymentPart::Deposit => existing.deposit_status,
        PaymentPart::Balance => existing.balance_status,
    };
    if current == status {
        return Err(Error::InvalidTransition {
            subject: part.subject(),
            from: current.to_string(),
            to: status.to_string(),
        });
    }

    let mut active: order::ActiveModel = existing.into();
    match part {
        PaymentPart::Deposit => active.deposit_status = Set(status),
        PaymentPart::Balance => active.balance_status = Set(status),
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    info!(
        "User {} set {} of order {order_id} to {status}",
        actor.id,
        part.subject()
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    #![allow(clippy::panic)]
    use super::*;
    use crate::core::bank_account::{BankAccountInput, create_bank_account};
    use crate::test_utils::*;

    #[test]
    fn test_preview_derives_fields() {
        let derived = preview(&sample_order_input());
        assert_eq!(derived.nights, Some(7));
        assert!(derived.dates_valid);
        assert_eq!(derived.total_price, 1100.0);
        assert_eq!(derived.balance_amount, 800.0);
        assert_eq!(derived.reservation_number, "ES01072025N42");
    }

    #[test]
    fn test_preview_of_partial_draft() {
        let draft = OrderInput {
            pricing: PricingFields {
                official_price: 50.0,
                ..PricingFields::default()
            },
            ..OrderInput::default()
        };
        let derived = preview(&draft);
        assert_eq!(derived.nights, None);
        assert!(derived.dates_valid);
        assert_eq!(derived.total_price, 50.0);
        assert_eq!(derived.reservation_number, "");
    }

    #[test]
    fn test_input_deserializes_nested_camel_case() {
        let json = serde_json::json!({
            "checkIn": "2025-07-01",
            "checkOut": "2025-07-03",
            "client": {"name": "Ana", "phones": ["+34 600"], "country": "ES"},
            "travel": {
                "country": "IT",
                "city": "Roma",
                "propertyName": "Hotel Sol",
                "propertyNumber": "7"
            },
            "pricing": {"officialPrice": 200, "taxClean": 20},
            "payments": {"deposit": {"amount": 50, "methods": ["card"]}, "balance": {"amount": 999}}
        });
        let input: OrderInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.travel.property_name, "Hotel Sol");
        assert_eq!(input.pricing.discount, 0.0);
        assert_eq!(input.payments.deposit.methods, vec!["card".to_string()]);
        // A client-supplied balance amount is ignored
        assert_eq!(preview(&input).balance_amount, 170.0);
    }

    #[tokio::test]
    async fn test_invalid_draft_collects_field_errors() -> Result<()> {
        let db = setup_test_db().await?;
        let agent = Actor {
            id: 1,
            role: Role::Agent,
        };

        let mut input = sample_order_input();
        input.check_out = NaiveDate::from_ymd_opt(2025, 6, 1);
        input.pricing.tax_clean = -5.0;
        input.client.email = Some("nope".to_string());
        input.travel.city = "  ".to_string();

        let Err(Error::Validation { errors }) = create_order(&db, &agent, &input).await else {
            panic!("expected validation error");
        };
        assert_eq!(errors["checkOut"], "must not be before check-in");
        assert_eq!(errors["pricing.taxClean"], "must not be negative");
        assert!(errors.contains_key("client.email"));
        assert!(errors.contains_key("travel.city"));
        Ok(())
    }

    #[tokio::test]
    async fn test_amount_limits() -> Result<()> {
        let db = setup_test_db().await?;
        let agent = Actor {
            id: 1,
            role: Role::Agent,
        };

        let mut input = sample_order_input();
        input.payments.deposit.amount = 5000.0;
        input.pricing.discount = 10_000.0;
        let Err(Error::Validation { errors }) = create_order(&db, &agent, &input).await else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("payments.deposit.amount"));
        assert!(errors.contains_key("pricing.discount"));

        let mut input = sample_order_input();
        input.pricing.official_price = f64::NAN;
        let Err(Error::Validation { errors }) = create_order(&db, &agent, &input).await else {
            panic!("expected validation error");
        };
        assert_eq!(errors["pricing.officialPrice"], "must be a number");
        Ok(())
    }

    #[tokio::test]
    async fn test_create_order_stores_derived_fields() -> Result<()> {
        let db = setup_test_db().await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, None).await?;

        let mut input = sample_order_input();
        input.client.phones = vec![" +34 600 ".to_string(), "  ".to_string()];
        input.client.email = Some(" Client@Mail.test ".to_string());
        let created = create_order(&db, &Actor::from(&agent), &input).await?;

        assert_eq!(created.agent_id, agent.id);
        assert_eq!(created.nights, 7);
        assert_eq!(created.total_price, 1100.0);
        assert_eq!(created.balance_amount, 800.0);
        assert_eq!(created.reservation_number, "ES01072025N42");
        assert_eq!(created.client_phones.0, vec!["+34 600".to_string()]);
        assert_eq!(created.client_email.as_deref(), Some("client@mail.test"));
        assert_eq!(created.status_order, OrderStatus::Pending);
        assert_eq!(created.deposit_status, PaymentStatus::Unpaid);
        assert_eq!(created.balance_status, PaymentStatus::Unpaid);

        let view = OrderView::from(created);
        assert_eq!(view.payments.balance.amount, 800.0);
        assert_eq!(view.client.phones.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_bank_account_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, None).await?;
        let mut input = sample_order_input();
        input.bank_account_id = Some(77);
        let Err(Error::Validation { errors }) =
            create_order(&db, &Actor::from(&agent), &input).await
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("bankAccountId"));
        Ok(())
    }

    fn account_input(identifier: &str) -> BankAccountInput {
        BankAccountInput {
            bank_name: "Banco Central".to_string(),
            swift: "BCENESMM".to_string(),
            iban: "ES9121000418450200051332".to_string(),
            holder: "Travel Agency SL".to_string(),
            identifier: identifier.to_string(),
            manager_id: None,
        }
    }

    #[tokio::test]
    async fn test_bank_account_must_belong_to_the_team() -> Result<()> {
        let db = setup_test_db().await?;
        let boss = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let rival = create_test_user(&db, "rival@agency.test", Role::Manager, None).await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, Some(boss.id)).await?;
        let own = create_bank_account(&db, &Actor::from(&boss), &account_input("OWN")).await?;
        let foreign =
            create_bank_account(&db, &Actor::from(&rival), &account_input("FOREIGN")).await?;

        let mut input = sample_order_input();
        input.bank_account_id = Some(foreign.id);
        let Err(Error::Validation { errors }) =
            create_order(&db, &Actor::from(&agent), &input).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors["bankAccountId"], "belongs to another team");
        let result = create_order(&db, &Actor::from(&boss), &input).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        input.bank_account_id = Some(own.id);
        let created = create_order(&db, &Actor::from(&agent), &input).await?;
        assert_eq!(created.bank_account_id, Some(own.id));

        // The manager editing the agent's order is held to the agent's team
        input.bank_account_id = Some(foreign.id);
        let result = update_order(&db, &Actor::from(&boss), created.id, &input).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let admin = create_test_user(&db, "root@agency.test", Role::Admin, None).await?;
        let updated = update_order(&db, &Actor::from(&admin), created.id, &input).await?;
        assert_eq!(updated.bank_account_id, Some(foreign.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_without_manager_cannot_link_accounts() -> Result<()> {
        let db = setup_test_db().await?;
        let boss = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let loner = create_test_user(&db, "solo@agency.test", Role::Agent, None).await?;
        let account = create_bank_account(&db, &Actor::from(&boss), &account_input("MAIN")).await?;

        let mut input = sample_order_input();
        input.bank_account_id = Some(account.id);
        let result = create_order(&db, &Actor::from(&loner), &input).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_recomputes_derived_fields() -> Result<()> {
        let db = setup_test_db().await?;
        let agent =
            Actor::from(&create_test_user(&db, "ana@agency.test", Role::Agent, None).await?);
        let created = create_order(&db, &agent, &sample_order_input()).await?;

        let mut input = sample_order_input();
        input.check_out = NaiveDate::from_ymd_opt(2025, 7, 4);
        input.pricing.discount = 100.0;
        input.client.country = "FR".to_string();
        let updated = update_order(&db, &agent, created.id, &input).await?;

        assert_eq!(updated.nights, 3);
        assert_eq!(updated.total_price, 1050.0);
        assert_eq!(updated.balance_amount, 750.0);
        assert_eq!(updated.reservation_number, "FR01072025N42");
        assert_eq!(updated.agent_id, created.agent_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_agents_edit_only_pending_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let manager = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, Some(manager.id)).await?;
        let created = create_test_order(&db, agent.id).await?;

        set_order_status(&db, &Actor::from(&manager), created.id, OrderStatus::Approved).await?;
        let result =
            update_order(&db, &Actor::from(&agent), created.id, &sample_order_input()).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        // The manager still can
        update_order(&db, &Actor::from(&manager), created.id, &sample_order_input()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_scope_visibility() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        let boss = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let other = create_test_user(&db, "other@agency.test", Role::Manager, None).await?;
        let mine = create_test_user(&db, "mine@agency.test", Role::Agent, Some(boss.id)).await?;
        let theirs =
            create_test_user(&db, "theirs@agency.test", Role::Agent, Some(other.id)).await?;

        let my_order = create_test_order(&db, mine.id).await?;
        let their_order = create_test_order(&db, theirs.id).await?;
        create_test_order(&db, boss.id).await?;

        let page = list_orders(
            &db,
            &Actor::from(&boss),
            &OrderFilter::default(),
            PageRequest::default(),
        )
        .await?;
        assert_eq!(page.meta.total, 2);
        assert!(page.items.iter().all(|o| o.id != their_order.id));

        let page = list_orders(
            &db,
            &Actor::from(&mine),
            &OrderFilter::default(),
            PageRequest::default(),
        )
        .await?;
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.items[0].id, my_order.id);

        let page = list_orders(&db, &admin, &OrderFilter::default(), PageRequest::default()).await?;
        assert_eq!(page.meta.total, 3);

        assert!(matches!(
            get_order(&db, &Actor::from(&boss), their_order.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            update_order(&db, &Actor::from(&mine), their_order.id, &sample_order_input()).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        let agent =
            Actor::from(&create_test_user(&db, "ana@agency.test", Role::Agent, None).await?);

        let july = create_order(&db, &agent, &sample_order_input()).await?;
        let mut august = sample_order_input();
        august.check_in = NaiveDate::from_ymd_opt(2025, 8, 10);
        august.check_out = NaiveDate::from_ymd_opt(2025, 8, 12);
        august.client.name = "Bruno Diaz".to_string();
        let august = create_order(&db, &agent, &august).await?;
        set_payment_status(
            &db,
            &admin,
            august.id,
            PaymentPart::Deposit,
            PaymentStatus::Paid,
        )
        .await?;
        set_order_status(&db, &admin, july.id, OrderStatus::Rejected).await?;

        let list = |filter: OrderFilter| {
            let db = &db;
            let admin = &admin;
            async move { list_orders(db, admin, &filter, PageRequest::default()).await }
        };

        let found = list(OrderFilter {
            search: Some("bruno".to_string()),
            ..OrderFilter::default()
        })
        .await?;
        assert_eq!(found.meta.total, 1);
        assert_eq!(found.items[0].id, august.id);

        let found = list(OrderFilter {
            search: Some("ES01072025".to_string()),
            ..OrderFilter::default()
        })
        .await?;
        assert_eq!(found.items[0].id, july.id);

        let found = list(OrderFilter {
            from: NaiveDate::from_ymd_opt(2025, 8, 1),
            to: NaiveDate::from_ymd_opt(2025, 8, 31),
            ..OrderFilter::default()
        })
        .await?;
        assert_eq!(found.meta.total, 1);
        assert_eq!(found.items[0].id, august.id);

        let found = list(OrderFilter {
            deposit_status: Some(PaymentStatus::Paid),
            ..OrderFilter::default()
        })
        .await?;
        assert_eq!(found.items[0].id, august.id);

        let found = list(OrderFilter {
            status: Some(OrderStatus::Rejected),
            ..OrderFilter::default()
        })
        .await?;
        assert_eq!(found.items[0].id, july.id);

        let found = list(OrderFilter {
            agent_id: Some(agent.id + 100),
            ..OrderFilter::default()
        })
        .await?;
        assert_eq!(found.meta.total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_order_status_transitions() -> Result<()> {
        let db = setup_test_db().await?;
        let manager = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, Some(manager.id)).await?;
        let created = create_test_order(&db, agent.id).await?;
        let actor = Actor::from(&manager);

        let denied =
            set_order_status(&db, &Actor::from(&agent), created.id, OrderStatus::Approved).await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));

        let same = set_order_status(&db, &actor, created.id, OrderStatus::Pending).await;
        assert!(matches!(same, Err(Error::InvalidTransition { .. })));

        let approved = set_order_status(&db, &actor, created.id, OrderStatus::Approved).await?;
        assert_eq!(approved.status_order, OrderStatus::Approved);
        let rejected = set_order_status(&db, &actor, created.id, OrderStatus::Rejected).await?;
        assert_eq!(rejected.status_order, OrderStatus::Rejected);
        let reopened = set_order_status(&db, &actor, created.id, OrderStatus::Pending).await?;
        assert_eq!(reopened.status_order, OrderStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_status_transitions() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, None).await?;
        let created = create_test_order(&db, agent.id).await?;

        let denied = set_payment_status(
            &db,
            &Actor::from(&agent),
            created.id,
            PaymentPart::Deposit,
            PaymentStatus::Paid,
        )
        .await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));

        let paid = set_payment_status(
            &db,
            &admin,
            created.id,
            PaymentPart::Deposit,
            PaymentStatus::Paid,
        )
        .await?;
        assert_eq!(paid.deposit_status, PaymentStatus::Paid);
        assert_eq!(paid.balance_status, PaymentStatus::Unpaid);

        let again = set_payment_status(

            &db,

            &admin,

            created.id,

            PaymentPart::Deposit,

            PaymentStatus::Paid,

        )

        .await;
        let Err(Error::InvalidTransition { subject, from, to }) = again else {
            panic!("expected invalid transition");
        };
        assert_eq!(subject, "deposit status");
        assert_eq!((from.as_str(), to.as_str()), ("paid", "paid"));

        let undone =
            set_payment_status(&db, &admin, created.id, PaymentPart::Deposit, PaymentStatus::Unpaid)
                .await?;
        assert_eq!(undone.deposit_status, PaymentStatus::Unpaid);

        let balance = set_payment_status(

            &db,

            &admin,

            created.id,

            PaymentPart::Balance,

            PaymentStatus::Paid,

        )

        .await?;
        assert_eq!(balance.balance_status, PaymentStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_order_roles() -> Result<()> {
        let db = setup_test_db().await?;
        let manager = create_test_user(&db, "boss@agency.test", Role::Manager, None).await?;
        let agent = create_test_user(&db, "ana@agency.test", Role::Agent, Some(manager.id)).await?;
        let created = create_test_order(&db, agent.id).await?;

        let denied = delete_order(&db, &Actor::from(&agent), created.id).await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));

        delete_order(&db, &Actor::from(&manager), created.id).await?;
        assert!(Order::find_by_id(created.id).one(&db).await?.is_none());
        Ok(())
    }
}
