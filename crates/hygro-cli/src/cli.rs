use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replicate sensor history and watch for stale data")]
pub struct Cli {
    /// Config file path (defaults to ./hygro.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured log filter
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print command results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replay new revisions into the time-series store
    Replicate {
        /// Write into an in-memory store and leave the checkpoint untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the latest record once and notify if it just went stale
    Check,

    /// Inspect or reset the replication checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CheckpointAction {
    Show,
    /// Clear the checkpoint so the next run backfills everything
    Reset,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    Validate,
    /// Print the effective configuration with secrets removed
    Show,
}
