//! Error types for PostgreSQL operations.

use dbkit_core::DbkitError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("query error: {0}")]
    Query(String),

    /// Row deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Error raised by the core while loading migrations or entities.
    #[error(transparent)]
    Core(#[from] DbkitError),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Postgres(e) => e.is_closed(),
            _ => false,
        }
    }
}

impl From<PgError> for DbkitError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Postgres(e) if e.is_closed() => DbkitError::connection(e.to_string()),
            PgError::Postgres(e) => DbkitError::query(e.to_string()),
            PgError::Config(msg) => DbkitError::config(msg),
            PgError::Connection(msg) => DbkitError::connection(msg),
            PgError::Query(msg) | PgError::Deserialization(msg) => DbkitError::query(msg),
            PgError::Core(e) => e,
        }
    }
}
