//! Conversation context commands.

use anyhow::Result;
use clap::Subcommand;
use console::style;
use uuid::Uuid;

use parley_types::error::ContextError;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ContextCommand {
    /// Forget what an agent remembers of a room.
    ///
    /// The next turn rebuilds the context from recent room messages.
    Reset {
        #[arg(long)]
        room: Uuid,

        #[arg(long)]
        agent: Uuid,
    },
}

pub async fn handle(cmd: ContextCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ContextCommand::Reset { room, agent } => reset(state, room, agent, json).await,
    }
}

async fn reset(state: &AppState, room: Uuid, agent: Uuid, json: bool) -> Result<()> {
    let removed = match state.contexts.reset_context(room, agent).await {
        Ok(()) => true,
        Err(ContextError::NotFound { .. }) => false,
        Err(e) => return Err(e.into()),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "room_id": room, "agent_id": agent, "removed": removed })
        );
    } else if removed {
        println!("  {} Context reset.", style("✓").green().bold());
    } else {
        println!("  {} No context stored for that agent in this room.", style("i").blue().bold());
    }
    Ok(())
}
