//! CLI argument parsing and subcommand dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use flagdeck_core::Config;

use crate::startup;

#[derive(Debug, Parser)]
#[command(name = "flagdeck-server", version, about = "Feature-flag experiment and metric API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no command is given).
    Serve {
        /// JSON snapshot of data sources, experiments and metrics to load
        /// before serving. Entities that already exist are skipped.
        #[arg(long, env = "FLAGDECK_SEED")]
        seed: Option<PathBuf>,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

pub async fn dispatch(config: &Config, cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve { seed: None }) {
        Command::Serve { seed } => startup::serve(config, seed.as_deref()).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
            Ok(())
        }
    }
}
