/// Domain module containing the core entities and their validation rules
///
/// This module defines Habit and Check along with the identifier and value
/// types (OwnerId, HabitId, Title, CheckDate) the store builds its keys from.

pub mod check;
pub mod habit;
pub mod types;

// Re-export public types for easy access
pub use check::*;
pub use habit::*;
pub use types::*;

use thiserror::Error;

/// Errors raised when caller-supplied input violates a domain constraint
///
/// These are detected before any storage call is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    #[error("Invalid habit id: {0}")]
    InvalidHabitId(String),

    #[error("Invalid habit title: {0}")]
    InvalidTitle(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },
}
