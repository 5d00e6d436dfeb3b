//! Error types for provisioning operations.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for dbkit operations.
pub type DbkitResult<T> = Result<T, DbkitError>;

/// Errors raised while resolving, provisioning or migrating a database.
#[derive(Debug, Error, Diagnostic)]
pub enum DbkitError {
    /// No driver is registered for the engine type.
    #[error("Unsupported database type {0}")]
    #[diagnostic(code(dbkit::unsupported_database))]
    UnsupportedDatabaseType(String),

    /// A driver is already registered for the engine type.
    #[error("A driver is already registered for database type {0}")]
    #[diagnostic(code(dbkit::duplicate_driver))]
    DriverAlreadyRegistered(String),

    /// The build context carries no project name.
    #[error("Missing projectName in context")]
    #[diagnostic(
        code(dbkit::missing_project),
        help("run the command from a project or pass --project")
    )]
    MissingProjectContext,

    /// The project name is not part of the workspace.
    #[error("Project '{0}' is not declared in the workspace")]
    #[diagnostic(code(dbkit::unknown_project))]
    UnknownProject(String),

    /// Migration generation needs `cli.migrations_dir`.
    #[error("Missing cli.migrations_dir in ormconfig for {0}")]
    #[diagnostic(code(dbkit::missing_migrations_dir))]
    MissingMigrationsDirConfig(String),

    /// The connection configuration names no target database.
    #[error("Connection '{0}' has no database name")]
    #[diagnostic(code(dbkit::missing_database))]
    MissingDatabaseName(String),

    /// The configuration store has no entry with that name.
    #[error("Connection '{0}' was not found in the configuration")]
    #[diagnostic(code(dbkit::connection_not_found))]
    ConnectionNotFound(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    #[diagnostic(code(dbkit::config))]
    Config(String),

    /// Connection could not be opened or was lost.
    #[error("Connection error: {0}")]
    #[diagnostic(code(dbkit::connection))]
    Connection(String),

    /// Query execution failed.
    #[error("Query error: {0}")]
    #[diagnostic(code(dbkit::query))]
    Query(String),

    /// A migration file could not be parsed.
    #[error("Invalid migration: {0}")]
    #[diagnostic(code(dbkit::migration))]
    InvalidMigration(String),

    /// The file emitter has no template with that name.
    #[error("Unknown template '{0}'")]
    #[diagnostic(code(dbkit::template))]
    Template(String),

    /// File system error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(dbkit::io))]
    Io(#[from] std::io::Error),
}

impl DbkitError {
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

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Check if the error was surfaced by the connection layer.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Query(_))
    }
}

impl From<toml::de::Error> for DbkitError {
    fn from(err: toml::de::Error) -> Self {
        DbkitError::Config(format!("Failed to parse TOML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbkitError::UnsupportedDatabaseType("test".to_string());
        assert_eq!(err.to_string(), "Unsupported database type test");

        let err = DbkitError::MissingMigrationsDirConfig("default".to_string());
        assert!(err.to_string().contains("cli.migrations_dir"));
    }

    #[test]
    fn test_is_database_error() {
        assert!(DbkitError::connection("refused").is_database_error());
        assert!(DbkitError::query("syntax").is_database_error());
        assert!(!DbkitError::MissingProjectContext.is_database_error());
    }
}
