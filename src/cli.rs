//! CLI / entrypoint (Component K, §4.K). Both subcommands share the same
//! `Config` loading and client construction path in `main.rs`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "epoch-orchestrator", about = "Off-chain epoch orchestrator")]
pub struct Cli {
    #[arg(long, short = 'c', default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API and, if configured, the background close ticker.
    Serve,
    /// One-shot distribution run for a single vault.
    Close {
        #[arg(long)]
        vault: String,
        #[arg(long)]
        epoch: Option<u64>,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
