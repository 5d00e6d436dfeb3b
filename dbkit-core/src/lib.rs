//! # dbkit-core
//!
//! Database provisioning for monorepo builds.
//!
//! This crate provides:
//! - A driver registry that probes and creates databases through each
//!   engine's administrative database
//! - A per-project resolver loading `ormconfig.toml` connections
//! - An executor wrapper normalizing operation results into [`Outcome`]s
//! - The `db-create`, `db-migrate`, `db-setup` and `migration` operations
//! - Migration records, their file format and a table-level schema differ
//! - A [`Logger`] with a spinner that survives interleaved log lines
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ db_executor  │────▶│  DbContext   │────▶│ ProjectResolver  │
//! └──────────────┘     └──────────────┘     └──────────────────┘
//!        │                                     │           │
//!        ▼                                     ▼           ▼
//! ┌──────────────┐     ┌──────────────┐  ┌───────────┐ ┌────────────────────┐
//! │  operation   │────▶│DriverRegistry│  │ConfigStore│ │ ConnectionManager  │
//! └──────────────┘     └──────────────┘  └───────────┘ └────────────────────┘
//! ```
//!
//! Engine connections live in `dbkit-postgres` and `dbkit-mysql`; the
//! `testing` feature exposes in-memory doubles for every seam.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dbkit_core::{
//!     db_executor, ops, DriverRegistry, ExecutorContext, Logger, ProjectResolverFactory,
//!     Services,
//! };
//!
//! let services = Services::new(
//!     Logger::silent(),
//!     Arc::new(DriverRegistry::with_defaults()?),
//!     Arc::new(ProjectResolverFactory::new(Arc::new(connectors))),
//! );
//!
//! let create = db_executor(ops::db_create);
//! let outcomes = create(ops::DatabaseOptions::default(), context, &services)
//!     .outcomes()
//!     .await;
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod generator;
pub mod loader;
pub mod logger;
pub mod migration_file;
pub mod ops;
pub mod pattern;
pub mod query_logger;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod workspace;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{CliOptions, ConnectionConfig, LoggingOptions, QueryLogLevel};
pub use connection::{
    AppliedMigration, Connection, ConnectionManager, ConnectorSet, Row, SqlInMemory, SqlParam,
    TransactionMode,
};
pub use driver::{Driver, DriverDescriptor, DriverRegistry};
pub use engine::EngineType;
pub use error::{DbkitError, DbkitResult};
pub use executor::{
    DbContext, Execution, ExecutionResult, ExecutorContext, ExecutorOptions, Outcome, Services,
    db_executor,
};
pub use generator::{FileEmitter, MigrationRecord, TemplateEmitter};
pub use loader::{EnvFileLoader, SourceLoader};
pub use logger::{LogLevel, Logger, LoggerState, SpinnerBackend};
pub use query_logger::QueryLogger;
pub use resolver::{ConnectionTarget, ProjectResolver, ProjectResolverFactory, ResolverFactory};
pub use store::{ConfigStore, TomlConfigStore};
pub use workspace::{ProjectConfig, WorkspaceConfig};
