//! # dbkit
//!
//! Database provisioning for monorepo builds.
//!
//! dbkit provides:
//! - `db-create`: create a project's database unless it exists
//! - `db-migrate`: run the pending migrations of a connection
//! - `db-setup`: both of the above, reported as a stream of outcomes
//! - `migration`: generate a migration for entity tables missing from the database
//! - Drivers for PostgreSQL, MySQL and MariaDB
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dbkit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dbkit::DbkitError> {
//!     let services = Services::new(
//!         Logger::silent(),
//!         DriverRegistry::global()?,
//!         Arc::new(ProjectResolverFactory::new(Arc::new(dbkit::connectors()))),
//!     );
//!
//!     let context = ExecutorContext {
//!         root: "/work".into(),
//!         project_name: Some("api".to_string()),
//!         workspace: WorkspaceConfig::default().with_project("api", "apps/api"),
//!         ..Default::default()
//!     };
//!
//!     let setup = db_executor(ops::db_setup);
//!     for outcome in setup(DatabaseOptions::default(), context, &services).outcomes().await {
//!         assert!(outcome.success);
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use dbkit_core::*;

/// PostgreSQL connections.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use dbkit_postgres::*;
}

/// MySQL and MariaDB connections.
#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql {
    pub use dbkit_mysql::*;
}

/// Connection managers for the engines enabled by features.
pub fn connectors() -> ConnectorSet {
    let connectors = ConnectorSet::new();

    #[cfg(feature = "postgres")]
    let connectors = connectors.with(EngineType::Postgres, postgres::PgConnector);

    #[cfg(feature = "mysql")]
    let connectors = connectors
        .with(EngineType::Mysql, mysql::MysqlConnector)
        .with(EngineType::Mariadb, mysql::MysqlConnector);

    connectors
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use dbkit_core::ops::{self, DatabaseOptions, MigrationOptions};
    pub use dbkit_core::{
        ConnectionConfig, DbkitError, DbkitResult, DriverRegistry, ExecutorContext, Logger,
        Outcome, ProjectResolverFactory, Services, WorkspaceConfig, db_executor,
    };
}
