//! Domain rule violations raised by the pure computations in this crate

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("No recipe for item '{item}'")]
    RecipeMissing { item: String },

    #[error("Insufficient stock for '{ingredient}': required {required}, available {available}")]
    InsufficientStock {
        ingredient: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Cannot move purchase request from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
