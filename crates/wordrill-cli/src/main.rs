//! Wordrill sync CLI - inspect and drive the durable sync queue
//!
//! The mobile app owns the queue in normal operation; this binary is
//! the maintenance surface for the same database file.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod error;

use cli::{Cli, Commands};
use error::CliError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Status { json } => commands::status(&cli.db_path, json).await,
        Commands::Pending { limit, json } => commands::pending(&cli.db_path, limit, json).await,
        Commands::Failed { json } => commands::failed(&cli.db_path, json).await,
        Commands::Sync => commands::sync(&cli.db_path).await,
        Commands::Cleanup { days } => commands::cleanup(&cli.db_path, days).await,
        Commands::Clear { yes } => commands::clear(&cli.db_path, yes).await,
    }
}
