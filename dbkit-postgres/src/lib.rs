//! # dbkit-postgres
//!
//! PostgreSQL connections for dbkit.
//!
//! This crate provides:
//! - [`PgConnector`], the [`ConnectionManager`](dbkit_core::ConnectionManager)
//!   registered for the `postgres` engine
//! - Query execution returning JSON rows
//! - Migration runs recorded in the connection's migrations table
//! - A table-level schema diff against the current schema
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dbkit_core::{ConnectorSet, EngineType, ProjectResolverFactory};
//! use dbkit_postgres::PgConnector;
//!
//! let connectors = ConnectorSet::new().with(EngineType::Postgres, PgConnector);
//! let resolvers = ProjectResolverFactory::new(Arc::new(connectors));
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod row;

pub use config::{PgConfig, PgConfigBuilder};
pub use connection::{PgConnection, PgConnector};
pub use error::{PgError, PgResult};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{PgConfig, PgConfigBuilder};
    pub use crate::connection::{PgConnection, PgConnector};
    pub use crate::error::{PgError, PgResult};
}
