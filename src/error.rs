use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::characteristics::cascade::DeleteBlocked;
use crate::characteristics::guard::ReparentViolation;
use crate::gate::GateClosed;

/// The primary error type for the application.
///
/// Every handler returns [`AppResult`]; the `IntoResponse` impl turns each variant into
/// the `{success: false, error, code, ...}` body with the matching status code.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For when a request conflicts with the current state of the server.
    Conflict(String),
    /// A refused operation carrying a machine-readable code and structured details.
    Rejected {
        status: StatusCode,
        code: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },
    /// For when a table the request needs has not been provisioned.
    SchemaUnavailable(String),
    /// For when a service is temporarily unavailable.
    ServiceUnavailable(String),
    /// For errors related to database operations.
    Database(String),
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Rejected { code, message, .. } => {
                write!(f, "Rejected ({}): {}", code, message)
            }
            AppError::SchemaUnavailable(msg) => write!(f, "Schema unavailable: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    /// Shorthand for a missing or empty required field.
    pub fn required(field: &str) -> Self {
        AppError::ValidationError {
            field: field.to_string(),
            message: format!("{} is required", field),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Rejected { status, .. } => *status,
            AppError::SchemaUnavailable(_) | AppError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg, None),
            AppError::Conflict(msg) => ("CONFLICT", msg, None),
            AppError::Rejected { code, message, details, .. } => (code, message, details),
            AppError::SchemaUnavailable(msg) => {
                tracing::warn!("Schema unavailable: {}", msg);
                ("SCHEMA_UNAVAILABLE", msg, None)
            }
            AppError::ServiceUnavailable(msg) => ("SERVICE_UNAVAILABLE", msg, None),
            AppError::Database(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Database error: {}", msg);
                (
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::ValidationError { field, message } => (
                "VALIDATION_ERROR",
                message.clone(),
                Some(json!({ "field": field, "message": message })),
            ),
        };

        let mut body = json!({
            "success": false,
            "error": error_message,
            "code": error_code,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "A record with the same unique value already exists".to_string(),
                    );
                }
                if db_err.is_foreign_key_violation() {
                    tracing::info!("Foreign key violation: {}", db_err.message());
                    return AppError::Rejected {
                        status: StatusCode::CONFLICT,
                        code: "FOREIGN_KEY_CONSTRAINT",
                        message: "The record is referenced by or refers to other records"
                            .to_string(),
                        details: None,
                    };
                }
                let msg = db_err.message().to_string();
                if msg.to_lowercase().contains("no such table") {
                    return AppError::SchemaUnavailable(
                        "Required table is not initialized".to_string(),
                    );
                }
                AppError::Database(msg)
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<ReparentViolation> for AppError {
    fn from(v: ReparentViolation) -> Self {
        AppError::Rejected {
            status: StatusCode::BAD_REQUEST,
            code: v.code(),
            message: v.to_string(),
            details: Some(v.details()),
        }
    }
}

impl From<DeleteBlocked> for AppError {
    fn from(b: DeleteBlocked) -> Self {
        let status = match b {
            DeleteBlocked::Protected { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::CONFLICT,
        };
        AppError::Rejected {
            status,
            code: b.code(),
            message: b.to_string(),
            details: Some(b.details()),
        }
    }
}

impl From<globset::Error> for AppError {
    fn from(err: globset::Error) -> Self {
        AppError::BadRequest(format!("Invalid glob pattern: {}", err))
    }
}

impl From<GateClosed> for AppError {
    fn from(_: GateClosed) -> Self {
        AppError::ServiceUnavailable("Storage gate is shut down".to_string())
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, AppError>`.
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// Helpers for request validation.
pub mod validation {
    use super::*;

    /// Trims a required name field, rejecting empty or whitespace-only input.
    pub fn require_name(value: Option<&str>, field: &str) -> AppResult<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(AppError::required(field)),
        }
    }

    /// Validates that a number is positive.
    pub fn validate_positive_number(value: Option<i64>, field: &str) -> AppResult<()> {
        if let Some(v) = value {
            if v <= 0 {
                return Err(AppError::ValidationError {
                    field: field.to_string(),
                    message: format!("Value must be positive, got {}", v),
                });
            }
        }
        Ok(())
    }

    /// Validates a `#rrggbb` color.
    pub fn validate_color_hex(value: Option<&str>, field: &str) -> AppResult<()> {
        if let Some(v) = value {
            let ok = v.len() == 7
                && v.starts_with('#')
                && v[1..].chars().all(|c| c.is_ascii_hexdigit());
            if !ok {
                return Err(AppError::ValidationError {
                    field: field.to_string(),
                    message: format!("Expected a #rrggbb color, got '{}'", v),
                });
            }
        }
        Ok(())
    }
}
