//! dbkit CLI - database provisioning for workspace projects.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dbkit_cli::cli::Cli;
use dbkit_cli::commands;
use dbkit_cli::output;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    }
}
