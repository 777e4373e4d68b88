use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative reconciliation for cloud resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what a manifest would change, without touching anything
    Plan(RunArgs),

    /// Reconcile remote resources to match a manifest
    Apply(RunArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct RunArgs {
    /// Manifest file (TOML or JSON)
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// API base URL (overrides environment and config file)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Access token (overrides environment and config file)
    #[arg(long)]
    pub token: Option<String>,

    /// Emit machine-readable JSON instead of the human summary
    #[arg(long)]
    pub json: bool,
}
