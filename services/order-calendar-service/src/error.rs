// =============================================================================
// ERROR MODULE
// =============================================================================
// Error types for the order calendar service and their HTTP responses.
//
// ERROR HANDLING PHILOSOPHY:
// - Validation problems are rejected before anything is written
// - Store failures are not retried; the client keeps its form and retries
// - Internal details never leak into the response body
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// =============================================================================
// CUSTOM ERROR TYPE
// =============================================================================
#[derive(Debug, Error)]
pub enum AppError {
    // -------------------------------------------------------------------------
    // INFRASTRUCTURE ERRORS
    // -------------------------------------------------------------------------
    /// Database query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session store (Redis) failed
    #[error("Session store error: {0}")]
    Redis(#[from] redis::RedisError),

    // -------------------------------------------------------------------------
    // BUSINESS LOGIC ERRORS
    // -------------------------------------------------------------------------
    /// Form input rejected before any write
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Not enough of a decoration character for the requested selection
    #[error("Not enough stock for \"{character}\": available {available}, requested {requested}")]
    InsufficientStock {
        character: String,
        available: i32,
        requested: i32,
    },

    /// Order or stock item is gone (possibly removed by another session)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint on the owner's data, e.g. a duplicate character
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, malformed or expired session token
    #[error("Unauthorized")]
    Unauthorized,

    // -------------------------------------------------------------------------
    // INTERNAL ERRORS
    // -------------------------------------------------------------------------
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Stable code sent to clients in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Redis(_) => "SESSION_STORE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// =============================================================================
// HTTP RESPONSE CONVERSION
// =============================================================================
// Handlers return AppResult<T>; errors become JSON bodies with a status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                ErrorResponse::new(code, msg.clone())
            }
            AppError::InsufficientStock {
                character,
                available,
                requested,
            } => ErrorResponse::with_details(
                code,
                format!("Not enough stock for \"{}\"", character),
                format!("Available: {}, Requested: {}", available, requested),
            ),
            AppError::Unauthorized => ErrorResponse::new(code, "Please sign in again"),
            // Generic message: the operator retries manually from the kept form
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                ErrorResponse::new(code, "The request could not be completed. Please try again.")
            }
        };

        if status.is_server_error() {
            tracing::error!(error_code = code, error = %self, "Request failed");
        } else {
            tracing::warn!(error_code = code, message = %body.message, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// RESULT TYPE ALIAS
// =============================================================================
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::validation("Customer name is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientStock {
                character: "A".into(),
                available: 1,
                requested: 2
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::NotFound("order".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn into_response_keeps_status() {
        let response = AppError::Conflict("\"A\" already exists".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn anyhow_errors_become_internal() {
        let err: AppError = anyhow::anyhow!("pool closed").into();
        assert!(matches!(err, AppError::Internal(ref msg) if msg == "pool closed"));
    }
}
