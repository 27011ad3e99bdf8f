//! Application error types
//!
//! Every fallible operation in the tournament core returns `Result<T>`.
//! Errors are recovered at the request boundary and rendered as a JSON
//! body with a human-readable message; nothing is retried automatically.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors that can occur during tournament operations
#[derive(Debug)]
pub enum AppError {
    /// Missing or malformed required field
    Validation(String),
    /// Request is well-formed but cannot be honored
    BadRequest(String),
    /// Tournament / registration / group / scorecard absent
    NotFound(String),
    /// Status change not in the allowed transition table
    InvalidTransition { from: String, to: String },
    /// Registration attempted outside the registration phase
    NotInRegistrationPhase { status: String },
    /// Registration attempted after the deadline (end-of-day inclusive)
    DeadlinePassed,
    /// Membership or handicap eligibility failure
    NotEligible(String),
    /// Player already holds a confirmed registration
    DuplicateRegistration,
    Database(sqlx::Error),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::InvalidTransition { from, to } => {
                write!(f, "Invalid status transition: {} -> {}", from, to)
            }
            AppError::NotInRegistrationPhase { status } => {
                write!(
                    f,
                    "Tournament is not accepting registrations (status: {})",
                    status
                )
            }
            AppError::DeadlinePassed => write!(f, "Registration deadline has passed"),
            AppError::NotEligible(msg) => write!(f, "Not eligible: {}", msg),
            AppError::DuplicateRegistration => {
                write!(f, "Player already has a confirmed registration")
            }
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. }
            | AppError::NotInRegistrationPhase { .. }
            | AppError::DeadlinePassed
            | AppError::DuplicateRegistration => StatusCode::CONFLICT,
            AppError::NotEligible(_) => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for tournament operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::InvalidTransition {
            from: "draft".to_string(),
            to: "scoring".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid status transition: draft -> scoring");

        let err = AppError::DeadlinePassed;
        assert_eq!(err.to_string(), "Registration deadline has passed");
    }
}
