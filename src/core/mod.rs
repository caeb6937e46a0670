//! Framework-agnostic business logic.
//!
//! Every operation takes a database connection and the calling [`access::Actor`]
//! and returns entity models or plain data. The HTTP layer in `crate::api`
//! only translates requests and responses around these functions.

pub mod access;
pub mod auth;
pub mod bank_account;
pub mod dashboard;
pub mod invitation;
pub mod order;
pub mod pagination;
pub mod pricing;
pub mod user;
