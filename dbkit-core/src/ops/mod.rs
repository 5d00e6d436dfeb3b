//! Top-level operations.
//!
//! Each operation comes in two forms: an `async fn` doing the work against a
//! [`DbContext`](crate::executor::DbContext), and a `db_*` function returning
//! an [`Execution`](crate::executor::Execution) for [`db_executor`](crate::executor::db_executor).

pub mod create;
pub mod generate;
pub mod migrate;
pub mod setup;

use serde::{Deserialize, Serialize};

use crate::error::DbkitResult;
use crate::executor::ExecutorOptions;
use crate::logger::LogLevel;

pub use create::{create_database, db_create};
pub use generate::{generate_migration, migration_generate};
pub use migrate::{db_migrate, migrate_database};
pub use setup::db_setup;

/// Options of `db-create`, `db-migrate` and `db-setup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Connection name.
    #[serde(default)]
    pub database: Option<String>,
    /// Verbosity override.
    #[serde(default)]
    pub verbosity: Option<LogLevel>,
}

impl ExecutorOptions for DatabaseOptions {
    fn verbosity(&self) -> Option<LogLevel> {
        self.verbosity
    }
}

/// Options of `migration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Migration name.
    pub name: String,
    /// Connection name.
    #[serde(default)]
    pub database: Option<String>,
    /// Verbosity override.
    #[serde(default)]
    pub verbosity: Option<LogLevel>,
}

impl ExecutorOptions for MigrationOptions {
    fn verbosity(&self) -> Option<LogLevel> {
        self.verbosity
    }
}

/// Combine an operation result with the result of closing its connection.
///
/// The operation error is reported first.
pub(crate) fn settle<T>(result: DbkitResult<T>, closed: DbkitResult<()>) -> DbkitResult<T> {
    let value = result?;
    closed?;
    Ok(value)
}
