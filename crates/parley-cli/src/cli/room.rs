//! Room commands: new, add-agent, agents, history.
//!
//! Rooms have no row of their own; a room exists once it has members or
//! messages under its id.

use anyhow::{Result, bail};
use clap::Subcommand;
use console::style;
use uuid::Uuid;

use parley_core::chat::ChatRepository;
use parley_types::chat::SenderKind;
use parley_types::error::RepositoryError;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum RoomCommand {
    /// Print a fresh room id.
    New,

    /// Add an agent to a room.
    AddAgent {
        #[arg(long)]
        room: Uuid,

        #[arg(long)]
        agent: Uuid,
    },

    /// List the agents in a room.
    Agents {
        #[arg(long)]
        room: Uuid,
    },

    /// Show recent messages, oldest first.
    History {
        #[arg(long)]
        room: Uuid,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub async fn handle(cmd: RoomCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        RoomCommand::New => {
            let room = Uuid::now_v7();
            if json {
                println!("{}", serde_json::json!({ "room_id": room }));
            } else {
                println!("{room}");
            }
            Ok(())
        }
        RoomCommand::AddAgent { room, agent } => add_agent(state, room, agent, json).await,
        RoomCommand::Agents { room } => agents(state, room, json).await,
        RoomCommand::History { room, limit } => history(state, room, limit, json).await,
    }
}

async fn add_agent(state: &AppState, room: Uuid, agent: Uuid, json: bool) -> Result<()> {
    match state.chat.add_room_agent(&room, &agent).await {
        Ok(()) => {}
        Err(RepositoryError::NotFound) => bail!("no agent with id {agent}"),
        Err(e) => return Err(e.into()),
    }

    if json {
        println!("{}", serde_json::json!({ "room_id": room, "agent_id": agent }));
    } else {
        println!("  {} Agent joined room {}", style("✓").green().bold(), style(room).cyan());
    }
    Ok(())
}

async fn agents(state: &AppState, room: Uuid, json: bool) -> Result<()> {
    let members = state.chat.list_room_agents(&room).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }

    if members.is_empty() {
        println!(
            "  {} No agents in this room. Use {} to add one.",
            style("i").blue().bold(),
            style("parley room add-agent").cyan()
        );
        return Ok(());
    }

    println!();
    for agent in &members {
        println!(
            "  {:<12} {}/{}  {}",
            style(&agent.name).bold(),
            agent.provider,
            agent.model,
            style(agent.id).dim()
        );
    }
    println!();
    Ok(())
}

async fn history(state: &AppState, room: Uuid, limit: usize, json: bool) -> Result<()> {
    let mut messages = state.chat.recent_messages(&room, limit).await?;
    messages.reverse();

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    println!();
    for message in &messages {
        let name = match message.sender_kind {
            SenderKind::Human => style(format!("{}:", message.sender_name)).green().bold(),
            SenderKind::Agent => style(format!("{}:", message.sender_name)).cyan().bold(),
        };
        let content = if message.content.is_empty() {
            style("(no reply yet)".to_string()).dim()
        } else {
            style(message.content.clone())
        };
        println!(
            "  {} {name} {content}",
            style(message.created_at.format("%H:%M:%S")).dim()
        );
    }
    println!();
    Ok(())
}
