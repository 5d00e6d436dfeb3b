//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dbkit_core::LogLevel;
use dbkit_core::ops::{DatabaseOptions, MigrationOptions};

/// dbkit - database provisioning for workspace projects
#[derive(Parser, Debug)]
#[command(name = "dbkit")]
#[command(version)]
#[command(about = "dbkit - database provisioning for workspace projects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Workspace root holding dbkit.toml (defaults to the nearest ancestor)
    #[arg(long, global = true, env = "DBKIT_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Project to run for (defaults to the project containing the current directory)
    #[arg(long, global = true, env = "DBKIT_PROJECT")]
    pub project: Option<String>,

    /// Lowest level of messages to print (debug, info, success, warn, error, fail)
    #[arg(long, global = true)]
    pub verbosity: Option<LogLevel>,

    /// Print debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database of a connection unless it exists
    DbCreate(DatabaseArgs),

    /// Run the pending migrations of a connection
    DbMigrate(DatabaseArgs),

    /// Create the database, then run its pending migrations
    DbSetup(DatabaseArgs),

    /// Generate a migration creating the entity tables missing from the database
    Migration(MigrationArgs),
}

/// Arguments of `db-create`, `db-migrate` and `db-setup`
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Connection name in ormconfig.toml
    #[arg(short, long)]
    pub database: Option<String>,
}

impl DatabaseArgs {
    /// Operation options.
    pub fn into_options(self, verbosity: Option<LogLevel>) -> DatabaseOptions {
        DatabaseOptions {
            database: self.database,
            verbosity,
        }
    }
}

/// Arguments of `migration`
#[derive(Args, Debug, Clone)]
pub struct MigrationArgs {
    /// Migration name
    pub name: String,

    /// Connection name in ormconfig.toml
    #[arg(short, long)]
    pub database: Option<String>,
}

impl MigrationArgs {
    /// Operation options.
    pub fn into_options(self, verbosity: Option<LogLevel>) -> MigrationOptions {
        MigrationOptions {
            name: self.name,
            database: self.database,
            verbosity,
        }
    }
}
