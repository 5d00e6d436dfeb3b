//! Command dispatch.

use std::sync::Arc;

use dbkit::connectors;
use dbkit_core::{
    DriverRegistry, ExecutionResult, ExecutorContext, LogLevel, Logger, Outcome,
    ProjectResolverFactory, Services, db_executor, ops,
};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::config;
use crate::error::CliResult;
use crate::output::TerminalSpinner;

/// Services backed by the real drivers.
pub fn services(logger: Logger) -> CliResult<Services> {
    let resolvers = ProjectResolverFactory::new(Arc::new(connectors()));
    Ok(Services::new(logger, DriverRegistry::global()?, Arc::new(resolvers)))
}

/// Start the operation selected by `command`.
pub fn dispatch(
    command: Command,
    cli_verbosity: Option<LogLevel>,
    context: ExecutorContext,
    services: &Services,
) -> ExecutionResult {
    match command {
        Command::DbCreate(args) => {
            db_executor(ops::db_create)(args.into_options(cli_verbosity), context, services)
        }
        Command::DbMigrate(args) => {
            db_executor(ops::db_migrate)(args.into_options(cli_verbosity), context, services)
        }
        Command::DbSetup(args) => {
            db_executor(ops::db_setup)(args.into_options(cli_verbosity), context, services)
        }
        Command::Migration(args) => db_executor(ops::migration_generate)(
            args.into_options(cli_verbosity),
            context,
            services,
        ),
    }
}

/// Run the CLI; returns whether every outcome succeeded.
pub async fn run(cli: Cli) -> CliResult<bool> {
    let cwd = std::env::current_dir()?;
    let context = config::executor_context(&cli, &cwd)?;
    let services = services(Logger::new(TerminalSpinner::default()))?;

    let outcomes = dispatch(cli.command, cli.verbosity, context, &services)
        .outcomes()
        .await;
    info!(count = outcomes.len(), "Operation finished");
    Ok(succeeded(&outcomes))
}

/// Whether every outcome succeeded.
pub fn succeeded(outcomes: &[Outcome]) -> bool {
    outcomes.iter().all(|outcome| outcome.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectors_cover_registered_drivers() {
        let connectors = connectors();
        let registry = DriverRegistry::global().unwrap();
        for engine in registry.engines() {
            assert!(connectors.supports(engine), "no connector for {}", engine);
        }
    }

    #[test]
    fn test_succeeded() {
        assert!(succeeded(&[Outcome::success(), Outcome::success()]));
        assert!(!succeeded(&[Outcome::success(), Outcome::failure()]));
        assert!(succeeded(&[]));
    }
}
