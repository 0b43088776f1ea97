//! Error handling for the Indago pipeline services
//!
//! Every failure is rendered as `{"error": {"code", "message", "field"?}}`.
//! The HTTP clients decode the same body, so a terminal error raised by one
//! service is replayed unchanged by the service that called it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Business rule errors
    #[error("Insufficient stock for '{ingredient}': required {required}, available {available}")]
    InsufficientStock {
        ingredient: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("No recipe for item '{0}'")]
    RecipeMissing(String),

    #[error("Unknown purchase request: {0}")]
    UnknownRequest(String),

    // Cross-service errors
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Audit log unavailable: {0}")]
    AuditUnavailable(String),

    /// Terminal error returned by another service
    #[error("{service} responded {status} {code}: {message}")]
    Downstream {
        service: String,
        status: u16,
        code: String,
        message: String,
        field: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }

    pub fn code(&self) -> &str {
        match self {
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::RecipeMissing(_) => "RECIPE_MISSING",
            AppError::UnknownRequest(_) => "UNKNOWN_REQUEST",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::AuditUnavailable(_) => "AUDIT_UNAVAILABLE",
            AppError::Downstream { code, .. } => code,
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Rebuild an error from a downstream error body.
    ///
    /// Codes this service knows are mapped back onto their variant; anything
    /// else is kept as `Downstream` with the original status.
    pub fn from_downstream(service: &str, status: u16, detail: ErrorDetail) -> Self {
        let ErrorDetail {
            code,
            message,
            field,
        } = detail;
        match code.as_str() {
            "VALIDATION_ERROR" => match field {
                Some(field) => AppError::Validation { field, message },
                None => AppError::ValidationError(message),
            },
            "NOT_FOUND" => AppError::NotFound(message),
            "CONFLICT" => AppError::Conflict {
                resource: field.unwrap_or_default(),
                message,
            },
            "INVALID_STATE_TRANSITION" => AppError::InvalidStateTransition(message),
            "RECIPE_MISSING" => AppError::RecipeMissing(message),
            "UNKNOWN_REQUEST" => AppError::UnknownRequest(message),
            "SERVICE_UNAVAILABLE" => AppError::Unavailable(message),
            _ => AppError::Downstream {
                service: service.to_string(),
                status,
                code,
                message,
                field,
            },
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => AppError::Validation { field, message },
            DomainError::RecipeMissing { item } => AppError::RecipeMissing(item),
            DomainError::InsufficientStock {
                ingredient,
                required,
                available,
            } => AppError::InsufficientStock {
                ingredient,
                required,
                available,
            },
            DomainError::InvalidTransition { from, to } => {
                AppError::InvalidStateTransition(format!("{} -> {}", from, to))
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                (field.to_string(), message)
            });
        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: format!("{} not found", resource),
                    field: None,
                },
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: message.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::InsufficientStock { ingredient, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: self.to_string(),
                    field: Some(ingredient.clone()),
                },
            ),
            AppError::InvalidStateTransition(msg)
            | AppError::RecipeMissing(msg)
            | AppError::UnknownRequest(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::Unavailable(msg) | AppError::AuditUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::Downstream {
                status,
                code,
                message,
                field,
                ..
            } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                ErrorDetail {
                    code: code.clone(),
                    message: message.clone(),
                    field: field.clone(),
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: format!("Configuration error: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: "A database error occurred".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: self.code().to_string(),
                    message: "An internal server error occurred".to_string(),
                    field: None,
                },
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
