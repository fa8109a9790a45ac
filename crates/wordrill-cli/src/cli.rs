use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wordrill")]
#[command(about = "Inspect and drive the Wordrill sync queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the local sync queue database
    #[arg(long, global = true, value_name = "PATH", default_value = "wordrill.db")]
    pub db_path: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show aggregate queue statistics
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued records awaiting delivery
    Pending {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records past the retry ceiling
    Failed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass against the remote handlers
    Sync,
    /// Delete delivered records older than the age threshold
    Cleanup {
        /// Age threshold in days
        #[arg(long, default_value = "7")]
        days: i64,
    },
    /// Remove every queued record regardless of state
    Clear {
        /// Confirm the destructive clear
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cleanup_days_defaults_to_seven() {
        let cli = Cli::try_parse_from(["wordrill", "cleanup"]).unwrap();
        match cli.command {
            Commands::Cleanup { days } => assert_eq!(days, 7),
            _ => panic!("expected cleanup command"),
        }
    }
}
