//! # dbkit-mysql
//!
//! MySQL and MariaDB connections for dbkit.
//!
//! [`MysqlConnector`] serves both engines. Statements use `?` for values
//! and `??` for identifiers; identifiers are escaped into the statement
//! before it is sent (see [`params`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbkit_core::{ConnectorSet, EngineType};
//! use dbkit_mysql::MysqlConnector;
//!
//! let connectors = ConnectorSet::new()
//!     .with(EngineType::Mysql, MysqlConnector)
//!     .with(EngineType::Mariadb, MysqlConnector);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod params;
pub mod row;

pub use config::MysqlConfig;
pub use connection::{MysqlConnection, MysqlConnector};
pub use error::{MysqlError, MysqlResult};
