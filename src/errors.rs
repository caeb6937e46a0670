//! Unified error types for the CRM service, its API client and the CLI.

use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation messages, keyed by the camelCase field name used on the wire.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed: {}", format_fields(.errors))]
    Validation { errors: FieldErrors },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied: {message}")]
    Forbidden { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{message}")]
    Conflict {
        field: Option<&'static str>,
        message: String,
    },

    #[error("Cannot change {subject} from {from} to {to}")]
    InvalidTransition {
        subject: &'static str,
        from: String,
        to: String,
    },

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        errors: FieldErrors,
    },
}

impl Error {
    /// Builds a validation error carrying a single field message.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), message.into());
        Self::Validation { errors }
    }

    /// Builds a `Forbidden` error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Builds a `NotFound` error for an entity id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for 401/403 answers from the server, after which the stored session is useless.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}

fn format_fields(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects field messages while validating input, then turns into a `Result`.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `field` unless `ok` holds. The first message per field wins.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_insert_with(|| message.to_string());
        }
        self
    }

    /// Records an error when `value` is blank.
    pub fn required(&mut self, value: &str, field: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, "is required")
    }

    /// Records an error when `value` is NaN, infinite or negative.
    pub fn amount(&mut self, value: f64, field: &str) -> &mut Self {
        self.check(value.is_finite(), field, "must be a number")
            .check(value.is_nan() || value >= 0.0, field, "must not be negative")
    }

    /// `Ok(())` if nothing was recorded, otherwise `Error::Validation`.
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                errors: self.errors,
            })
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
