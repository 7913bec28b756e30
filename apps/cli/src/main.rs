//! Warden CLI - operator tool for distributed locks.
//!
//! The main entry point for the `warden` binary.

use anyhow::Result;
use clap::Parser;

use warden_cli::{Cli, Commands, Settings, build_manager, commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    let _log = warden_log::init_with(settings.log_config())?;

    tracing::debug!(backend = ?settings.backend, "starting");
    let manager = build_manager(&settings).await?;

    match cli.command {
        Commands::Contend(args) => commands::contend::execute(args, &manager).await,
        Commands::Probe(args) => commands::probe::execute(args, &manager).await,
    }
}
