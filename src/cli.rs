//! CLI argument parsing module
//!
//! Uses clap derive macros to declaratively define commands and arguments.
//! This approach ensures type safety and automatically generates --help and --version.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bifrost - dual-layer (L4/L7) reverse proxy and load balancer
#[derive(Parser, Debug)]
#[command(
    name = "bifrost",
    about = "Dual-layer TCP/HTTP reverse proxy and load balancer",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path (optional; defaults to $HOME/.bifrost/config.yaml)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Available subcommands. Running with no subcommand is equivalent to `run`.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy in the foreground (the default)
    #[command(name = "run", about = "Run the proxy in the foreground")]
    Run,

    /// Validate the configuration file and probe backend connectivity
    #[command(name = "check", about = "Validate configuration and probe backends")]
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The effective command: explicit subcommand, or `Run` by default.
    pub fn effective_command(&self) -> EffectiveCommand {
        match self.command {
            Some(Commands::Run) | None => EffectiveCommand::Run,
            Some(Commands::Check) => EffectiveCommand::Check,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum EffectiveCommand {
    Run,
    Check,
}
