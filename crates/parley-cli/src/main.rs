//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, installs tracing, opens the database and provider
//! registry, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use parley_observe::tracing_setup::{init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.otel, cli.log_filter()) {
        eprintln!("warning: tracing not initialized: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Chat(args) => cli::chat::run(&state, args, cli.json).await,
        Commands::Providers { action } => cli::providers::handle(action, &state, cli.json).await,
        Commands::Context { action } => cli::context::handle(action, &state, cli.json).await,
        Commands::Agent { action } => cli::agent::handle(action, &state, cli.json).await,
        Commands::Room { action } => cli::room::handle(action, &state, cli.json).await,
    }
}
