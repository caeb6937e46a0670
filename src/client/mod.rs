//! Typed client for the CRM REST API.
//!
//! [`ApiClient`] injects the bearer token of the stored session into every
//! call and keeps the [`SessionStore`] in sync: login and registration save
//! the session, logout and any `401`/`403` answer clear it.

pub mod api;
pub mod session;

pub use api::ApiClient;
pub use session::{SessionStore, StoredSession};
