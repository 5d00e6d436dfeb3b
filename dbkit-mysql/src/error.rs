//! Error types for MySQL operations.

use std::fmt;

use dbkit_core::DbkitError;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Error type for MySQL operations.
#[derive(Debug)]
pub enum MysqlError {
    /// MySQL driver error.
    Mysql(mysql_async::Error),
    /// Configuration error.
    Config(String),
    /// Connection error.
    Connection(String),
    /// Query error.
    Query(String),
    /// Timeout error.
    Timeout(String),
    /// Error raised by the core while loading migrations or entities.
    Core(DbkitError),
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

impl fmt::Display for MysqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql(e) => write!(f, "MySQL error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Connection(msg) => write!(f, "Connection error: {}", msg),
            Self::Query(msg) => write!(f, "Query error: {}", msg),
            Self::Timeout(msg) => write!(f, "Timeout error: {}", msg),
            Self::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MysqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mysql(e) => Some(e),
            Self::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<mysql_async::Error> for MysqlError {
    fn from(err: mysql_async::Error) -> Self {
        Self::Mysql(err)
    }
}

impl From<DbkitError> for MysqlError {
    fn from(err: DbkitError) -> Self {
        Self::Core(err)
    }
}

impl From<MysqlError> for DbkitError {
    fn from(err: MysqlError) -> Self {
        match err {
            MysqlError::Mysql(mysql_async::Error::Io(e)) => DbkitError::connection(e.to_string()),
            MysqlError::Mysql(mysql_async::Error::Driver(e)) => {
                DbkitError::connection(e.to_string())
            }
            MysqlError::Mysql(e) => DbkitError::query(e.to_string()),
            MysqlError::Config(msg) => DbkitError::config(msg),
            MysqlError::Connection(msg) | MysqlError::Timeout(msg) => DbkitError::connection(msg),
            MysqlError::Query(msg) => DbkitError::query(msg),
            MysqlError::Core(e) => e,
        }
    }
}
