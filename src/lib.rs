/// Habit store library
///
/// Habits and their daily checks for many owners, kept in one wide-column
/// table. The store is generic over the `Table` protocol; this crate ships
/// a SQLite implementation of it and a small command surface on top.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

pub mod commands;
pub mod config;
pub mod domain;
pub mod overview;
pub mod storage;

pub use commands::Command;
pub use config::Config;
pub use domain::*;
pub use overview::{HabitDetail, HabitSummary, Overview};
pub use storage::{ErrorKind, HabitStore, SqliteTable, StoreError, Table, TableError};

/// Errors surfaced to applications built on the store
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Table(#[from] TableError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Store(e) => e.kind(),
            AppError::Domain(_) => ErrorKind::ValidationFailure,
            AppError::Table(_) | AppError::Io(_) | AppError::Json(_) => ErrorKind::StorageFailure,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::StorageFailure => 1,
            ErrorKind::ValidationFailure => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Conflict => 4,
        }
    }
}

/// A habit store on a SQLite table, bundled with its configuration
pub struct HabitTracker {
    store: HabitStore<SqliteTable>,
    config: Config,
}

impl HabitTracker {
    /// Open the configured database file, creating the schema if needed
    pub fn open(config: Config) -> Result<Self, AppError> {
        let path = config.database_path()?;
        Self::open_at(&path, config)
    }

    pub fn open_at(path: &Path, config: Config) -> Result<Self, AppError> {
        tracing::info!("Initializing habit store with database: {:?}", path);
        let table = SqliteTable::open(path, storage::keys::habit_table(&config.table_name))?;
        Ok(Self::with_table(table, config))
    }

    /// A tracker on a private in-memory database
    pub fn in_memory(config: Config) -> Result<Self, AppError> {
        let table = SqliteTable::open_in_memory(storage::keys::habit_table(&config.table_name))?;
        Ok(Self::with_table(table, config))
    }

    fn with_table(table: SqliteTable, config: Config) -> Self {
        let store = HabitStore::new(table.with_page_size(config.page_size))
            .with_request_timeout(config.request_timeout);
        Self { store, config }
    }

    pub fn store(&self) -> &HabitStore<SqliteTable> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one command on behalf of `owner`
    pub async fn execute(&self, owner: &OwnerId, command: Command) -> Result<Value, AppError> {
        commands::execute(&self.store, &self.config, owner, command).await
    }
}
