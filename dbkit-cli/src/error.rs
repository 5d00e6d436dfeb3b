//! CLI error types and result alias.

use dbkit_core::DbkitError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(dbkit::cli::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(dbkit::cli::config))]
    Config(String),

    /// Error raised while setting up the operation
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] DbkitError),
}
