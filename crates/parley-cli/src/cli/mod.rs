//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Commands follow a
//! noun-verb pattern (e.g., `parley agent add`, `parley providers check`).

pub mod agent;
pub mod chat;
pub mod context;
pub mod providers;
pub mod room;

use clap::{Parser, Subcommand};

/// Talk to several LLM agents in one room.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "PARLEY_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the requested verbosity; `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,parley=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message to a room and stream the agents' replies.
    Chat(chat::ChatArgs),

    /// Inspect configured LLM providers.
    Providers {
        #[command(subcommand)]
        action: providers::ProvidersCommand,
    },

    /// Manage per-agent conversation contexts.
    Context {
        #[command(subcommand)]
        action: context::ContextCommand,
    },

    /// Manage agents.
    Agent {
        #[command(subcommand)]
        action: agent::AgentCommand,
    },

    /// Manage rooms and their members.
    Room {
        #[command(subcommand)]
        action: room::RoomCommand,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filter() {
        let quiet = Cli::parse_from(["parley", "--quiet", "room", "new"]);
        assert_eq!(quiet.log_filter(), "error");

        let normal = Cli::parse_from(["parley", "room", "new"]);
        assert_eq!(normal.log_filter(), "warn");

        let verbose = Cli::parse_from(["parley", "-v", "room", "new"]);
        assert_eq!(verbose.log_filter(), "info,parley=debug");

        let trace = Cli::parse_from(["parley", "-vv", "room", "new"]);
        assert_eq!(trace.log_filter(), "trace");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
