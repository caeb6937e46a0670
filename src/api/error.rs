//! Mapping of crate errors onto HTTP responses.
//!
//! Every failure answers `{message}`; validation failures and field-bound
//! conflicts add `errors: {field: message}` so forms can show the message
//! next to the offending input.

use crate::errors::{Error, FieldErrors};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// JSON body of an error response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "FieldErrors::is_empty")]
    pub errors: FieldErrors,
}

impl Error {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } | Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> ErrorBody {
        match self {
            Self::Validation { errors } => ErrorBody {
                message: "Validation failed".to_string(),
                errors,
            },
            Self::Conflict {
                field: Some(field),
                message,
            } => {
                let mut errors = FieldErrors::new();
                errors.insert(field.to_string(), message.clone());
                ErrorBody { message, errors }
            }
            other => ErrorBody {
                message: other.to_string(),
                errors: FieldErrors::new(),
            },
        }
    }
}

/// Turns a deserialization message of the form `"<context>: <path>: <detail>"`
/// into a field error on `<path>`, or on `fallback` when no path is given.
fn deserialize_error(text: &str, fallback: &str) -> Error {
    let detail = text.split_once(": ").map_or(text, |(_, rest)| rest);
    match detail.split_once(": ") {
        Some((path, message)) if !path.is_empty() && !path.contains(char::is_whitespace) => {
            Error::field(path, message)
        }
        _ => Error::field(fallback, detail),
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            rejection @ (JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_)) => {
                deserialize_error(&rejection.body_text(), "body")
            }
            other => Self::field("body", other.body_text()),
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        deserialize_error(&rejection.body_text(), "query")
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            rejection @ PathRejection::FailedToDeserializePathParams(_) => {
                deserialize_error(&rejection.body_text(), "path")
            }
            other => Self::field("path", other.body_text()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            error!("Request failed: {self}");
            ErrorBody {
                message: "Internal server error".to_string(),
                errors: FieldErrors::new(),
            }
        } else {
            self.body()
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::field("email", "is required").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::not_found("order", 1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::InvalidTransition {
                subject: "order status",
                from: "pending".to_string(),
                to: "pending".to_string(),
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Config {
                message: "x".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_field_conflict_carries_field_error() {
        let body = Error::Conflict {
            field: Some("identifier"),
            message: "identifier MAIN is already in use".to_string(),
        }
        .body();
        assert_eq!(
            body.errors.get("identifier").map(String::as_str),
            Some("identifier MAIN is already in use")
        );
    }

    #[test]
    fn test_validation_body() {
        let body = Error::field("checkOut", "must not be before check-in").body();
        assert_eq!(body.message, "Validation failed");
        assert_eq!(body.errors.len(), 1);
    }

    #[test]
    fn test_deserialize_error_picks_field_path() {
        let Error::Validation { errors } = deserialize_error(
            "Failed to deserialize the JSON body: pricing.officialPrice: invalid type: string, expected f64",
            "body",
        ) else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("pricing.officialPrice").map(String::as_str),
            Some("invalid type: string, expected f64")
        );

        let Error::Validation { errors } =
            deserialize_error("Failed to parse the request body as JSON: EOF while parsing", "body")
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("body").map(String::as_str), Some("EOF while parsing"));
    }
}
