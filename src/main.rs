//! Loopgrid CLI - Loop Construction Engine
//!
//! Command-line interface for replaying recorded grid events through a looper.

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use loopgrid::cli::{commands, Cli, Commands};
use loopgrid::LoopGridError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Loopgrid v{}", env!("CARGO_PKG_VERSION"));

    let report = handle_command(cli.command)?;
    println!("{}", report);
    Ok(())
}

fn handle_command(cmd: Commands) -> anyhow::Result<String> {
    match cmd {
        Commands::Store(args) => commands::store(&args)
            .map_err(log_hint)
            .with_context(|| format!("failed to store events from {}", args.events.display())),
        Commands::Swing {
            position,
            amount,
            grid,
        } => commands::swing(position, amount, grid)
            .map_err(log_hint)
            .context("failed to compute swing"),
    }
}

fn log_hint(err: LoopGridError) -> LoopGridError {
    if let Some(hint) = err.recovery_suggestion() {
        warn!(code = err.error_code(), "{}", hint);
    }
    err
}
