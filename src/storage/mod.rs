/// Storage layer for persisting habit data
///
/// This module holds the wide-column table protocol, its SQLite
/// implementation, the single-table key schema, and the HabitStore that
/// implements every habit and check operation on top of them.

pub mod keys;
pub mod migrations;
pub mod records;
pub mod sqlite;
pub mod store;
pub mod table;

// Re-export the main storage types
pub use sqlite::SqliteTable;
pub use store::{HabitStore, DEFAULT_REQUEST_TIMEOUT};
pub use table::{Table, TableError};

use std::time::Duration;

use thiserror::Error;

use crate::domain::DomainError;

/// Semantic failure kinds callers react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    StorageFailure,
    ValidationFailure,
}

/// Errors returned by store operations
///
/// Each variant names the operation and, where one is involved, the key,
/// so the caller can log it meaningfully.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{operation}: nothing found at {key}")]
    NotFound { operation: &'static str, key: String },

    #[error("{operation}: conflicting item at {key}")]
    Conflict { operation: &'static str, key: String },

    #[error("{operation}: storage failure: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: TableError,
    },

    #[error("{operation}: no response within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("malformed record at {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("validation error: {0}")]
    Validation(#[from] DomainError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::Storage { .. } | StoreError::Timeout { .. } | StoreError::Malformed { .. } => {
                ErrorKind::StorageFailure
            }
            StoreError::Validation(_) => ErrorKind::ValidationFailure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}
