//! Dashboard statistics for each role.
//!
//! Each role home shows a small set of counters over the records the caller
//! can see. Totals are summed in Rust from the selected column, which keeps
//! the queries portable across database backends.

use crate::{
    core::{
        access::Actor,
        bank_account::count_bank_accounts,
        invitation::count_pending,
        order::{OrderFilter, scoped},
        user::count_users,
    },
    entities::{OrderStatus, PaymentStatus, Role, order},
    errors::Result,
};
use sea_orm::{QuerySelect, prelude::*};
use serde::{Deserialize, Serialize};

/// Orders in scope, by decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCounts {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

/// Admin home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    /// Manager accounts
    pub managers: u64,
    /// Agent accounts
    pub agents: u64,
    /// Accounts of any role that can log in
    pub active_users: u64,
    /// Invitations not yet redeemed
    pub pending_invitations: u64,
    /// Every order, by status
    pub orders: OrderCounts,
    /// Sum of `total_price` over approved orders
    pub approved_revenue: f64,
}

/// Manager home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStats {
    pub agents: u64,
    pub active_agents: u64,
    pub bank_accounts: u64,
    pub pending_invitations: u64,
    /// Own and agents' orders, by status
    pub orders: OrderCounts,
    pub unpaid_deposits: u64,
    pub unpaid_balances: u64,
}

/// Agent home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub orders: OrderCounts,
    /// Sum of `total_price` over own orders that were not rejected
    pub total_sales: f64,
    pub unpaid_balances: u64,
}

/// Stats for whichever role the caller has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardStats {
    Admin(AdminStats),
    Manager(ManagerStats),
    Agent(AgentStats),
}

async fn count_orders(db: &DatabaseConnection, actor: &Actor, filter: &OrderFilter) -> Result<u64> {
    Ok(scoped(db, actor, filter).await?.count(db).await?)
}

async fn order_counts(db: &DatabaseConnection, actor: &Actor) -> Result<OrderCounts> {
    let by_status = |status| OrderFilter {
        status: Some(status),
        ..OrderFilter::default()
    };
    Ok(OrderCounts {
        total: count_orders(db, actor, &OrderFilter::default()).await?,
        pending: count_orders(db, actor, &by_status(OrderStatus::Pending)).await?,
        approved: count_orders(db, actor, &by_status(OrderStatus::Approved)).await?,
        rejected: count_orders(db, actor, &by_status(OrderStatus::Rejected)).await?,
    })
}

/// Sums `total_price` over the orders `filter` selects, skipping `exclude`.
async fn sum_totals(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &OrderFilter,
    exclude: Option<OrderStatus>,
) -> Result<f64> {
    let mut select = scoped(db, actor, filter).await?;
    if let Some(status) = exclude {
        select = select.filter(order::Column::StatusOrder.ne(status));
    }
    let totals: Vec<f64> = select
        .select_only()
        .column(order::Column::TotalPrice)
        .into_tuple()
        .all(db)
        .await?;
    Ok(totals.into_iter().sum())
}

/// Builds the admin dashboard.
pub async fn admin_stats(db: &DatabaseConnection, actor: &Actor) -> Result<AdminStats> {
    actor.require(&[Role::Admin])?;
    let approved = OrderFilter {
        status: Some(OrderStatus::Approved),
        ..OrderFilter::default()
    };
    Ok(AdminStats {
        managers: count_users(db, Some(Role::Manager), None, None).await?,
        agents: count_users(db, Some(Role::Agent), None, None).await?,
        active_users: count_users(db, None, Some(true), None).await?,
        pending_invitations: count_pending(db, None).await?,
        orders: order_counts(db, actor).await?,
        approved_revenue: sum_totals(db, actor, &approved, None).await?,
    })
}

/// Builds the manager dashboard over the manager's own scope.
pub async fn manager_stats(db: &DatabaseConnection, actor: &Actor) -> Result<ManagerStats> {
    actor.require(&[Role::Manager])?;
    Ok(ManagerStats {
        agents: count_users(db, Some(Role::Agent), None, Some(actor.id)).await?,
        active_agents: count_users(db, Some(Role::Agent), Some(true), Some(actor.id)).await?,
        bank_accounts: count_bank_accounts(db, Some(actor.id)).await?,
        pending_invitations: count_pending(db, Some(actor.id)).await?,
        orders: order_counts(db, actor).await?,
        unpaid_deposits: count_orders(
            db,
            actor,
            &OrderFilter {
                deposit_status: Some(PaymentStatus::Unpaid),
                ..OrderFilter::default()
            },
        )
        .await?,
        unpaid_balances: count_orders(
            db,
            actor,
            &OrderFilter {
                balance_status: Some(PaymentStatus::Unpaid),
                ..OrderFilter::default()
            },
        )
        .await?,
    })
}

/// Builds the agent dashboard over the agent's own orders.
pub async fn agent_stats(db: &DatabaseConnection, actor: &Actor) -> Result<AgentStats> {
    actor.require(&[Role::Agent])?;
    Ok(AgentStats {
        orders: order_counts(db, actor).await?,
        total_sales: sum_totals(db, actor, &OrderFilter::default(), Some(OrderStatus::Rejected))
            .await?,
        unpaid_balances: count_orders(
            db,
            actor,
            &OrderFilter {
                balance_status: Some(PaymentStatus::Unpaid),
                ..OrderFilter::default()
            },
        )
        .await?,
    })
}

/// Builds the dashboard matching the caller's role.
pub async fn stats_for(db: &DatabaseConnection, actor: &Actor) -> Result<DashboardStats> {
    Ok(match actor.role {
        Role::Admin => DashboardStats::Admin(admin_stats(db, actor).await?),
        Role::Manager => DashboardStats::Manager(manager_stats(db, actor).await?),
        Role::Agent => DashboardStats::Agent(agent_stats(db, actor).await?),
    })
}
