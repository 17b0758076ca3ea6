//! `parley chat`: send one message to a room and print the replies.
//!
//! With a single mentioned agent the reply is streamed as it arrives.
//! With several, fragments are buffered per agent and each reply is
//! printed whole when it completes, so concurrent streams don't interleave.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::Instrument;
use uuid::Uuid;

use parley_core::chat::{ChatOutcome, ChatRepository, ChatRequest};
use parley_observe::genai_attrs::{GEN_AI_OPERATION_NAME, OP_CHAT};
use parley_types::chat::{AgentProfile, ChatMessageRecord, ChatMode, SenderKind};
use parley_types::event::{AgentReplyEvent, RoomEvent};

use crate::state::AppState;

/// Sender id recorded for messages typed at this terminal.
pub const LOCAL_USER_ID: Uuid = Uuid::nil();

#[derive(Args)]
pub struct ChatArgs {
    /// Room to post into.
    #[arg(long)]
    pub room: Uuid,

    /// Agent (name or id) that should answer. Repeatable.
    #[arg(short, long = "mention", value_name = "AGENT")]
    pub mentions: Vec<String>,

    /// Ask every agent in the room.
    #[arg(long, conflicts_with = "mentions")]
    pub all: bool,

    /// Augment the message with web search results.
    #[arg(long, conflicts_with = "deep_think")]
    pub search: bool,

    /// Ask agents to reason step by step.
    #[arg(long)]
    pub deep_think: bool,

    /// Display name stored with the message.
    #[arg(long, default_value = "you")]
    pub sender: String,

    /// The message text.
    pub message: String,
}

impl ChatArgs {
    fn mode(&self) -> ChatMode {
        if self.search {
            ChatMode::Search
        } else if self.deep_think {
            ChatMode::DeepThink
        } else {
            ChatMode::Normal
        }
    }
}

/// Map `--mention` values to agent ids.
///
/// Names match room members case-insensitively. A value that parses as a
/// UUID is passed through even when it is not a member; the orchestrator
/// skips it with a warning.
pub fn resolve_mentions(
    members: &[AgentProfile],
    mentions: &[String],
    all: bool,
) -> Result<Vec<Uuid>> {
    if all {
        return Ok(members.iter().map(|a| a.id).collect());
    }

    let mut ids = Vec::with_capacity(mentions.len());
    for mention in mentions {
        let wanted = mention.trim().trim_start_matches('@');
        let id = if let Ok(id) = wanted.parse::<Uuid>() {
            id
        } else if let Some(agent) = members.iter().find(|a| a.name.eq_ignore_ascii_case(wanted)) {
            agent.id
        } else {
            let names: Vec<&str> = members.iter().map(|a| a.name.as_str()).collect();
            bail!(
                "no agent named '{wanted}' in this room (members: {})",
                if names.is_empty() { "none".to_string() } else { names.join(", ") }
            );
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub async fn run(state: &AppState, args: ChatArgs, json: bool) -> Result<()> {
    let members = state.chat.list_room_agents(&args.room).await?;
    let mentions = resolve_mentions(&members, &args.mentions, args.all)?;
    let mode = args.mode();

    if mode == ChatMode::Search && !state.search_enabled && !json {
        println!(
            "  {} Web search is not configured (set SERPER_API_KEY); sending the message as-is.",
            style("!").yellow().bold()
        );
    }

    let human = ChatMessageRecord::new(
        args.room,
        SenderKind::Human,
        LOCAL_USER_ID,
        args.sender.as_str(),
        args.message.as_str(),
    );
    state.chat.create_message(&human).await?;

    if mentions.is_empty() {
        if !json {
            println!(
                "  {} Message saved. Mention an agent with {} or use {} to get a reply.",
                style("i").blue().bold(),
                style("--mention <name>").cyan(),
                style("--all").cyan()
            );
        }
        return Ok(());
    }

    let mut events = state.orchestrator.event_bus().subscribe_room(args.room);
    let orchestrator = state.orchestrator.clone();
    let request = ChatRequest::new(args.room, LOCAL_USER_ID, args.message)
        .mentioning(mentions.iter().copied())
        .with_mode(mode);
    let span = tracing::info_span!(
        "chat",
        { GEN_AI_OPERATION_NAME } = OP_CHAT,
        room_id = %args.room,
        agents = mentions.len(),
    );
    let mut task =
        tokio::spawn(async move { orchestrator.process_chat(request).await }.instrument(span));

    let mut printer = ReplyPrinter::new(mentions.len() == 1, json);
    let finished = loop {
        tokio::select! {
            joined = &mut task => break joined?,
            received = events.recv() => match received {
                Ok(event) => printer.handle(args.room, &event)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "fell behind on reply events");
                }
                Err(RecvError::Closed) => break (&mut task).await?,
            },
        }
    };

    loop {
        match events.try_recv() {
            Ok(event) => printer.handle(args.room, &event)?,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    report(&finished?, json)
}

/// Renders reply events for one room.
struct ReplyPrinter {
    live: bool,
    json: bool,
    buffers: HashMap<Uuid, String>,
}

impl ReplyPrinter {
    fn new(live: bool, json: bool) -> Self {
        Self {
            live,
            json,
            buffers: HashMap::new(),
        }
    }

    fn handle(&mut self, room_id: Uuid, event: &AgentReplyEvent) -> Result<()> {
        if self.json {
            let scoped = RoomEvent::new(room_id, event.clone());
            println!("{}", serde_json::to_string(&scoped)?);
            return Ok(());
        }

        let mut out = std::io::stdout().lock();
        match event {
            AgentReplyEvent::TypingStarted { agent_name, message_id, .. } => {
                if self.live {
                    write!(out, "\n  {} ", style(format!("{agent_name}:")).cyan().bold())?;
                } else {
                    self.buffers.insert(*message_id, String::new());
                    writeln!(out, "  {}", style(format!("{agent_name} is typing...")).dim())?;
                }
            }
            AgentReplyEvent::Delta { message_id, content, .. } => {
                if self.live {
                    write!(out, "{content}")?;
                } else {
                    self.buffers.entry(*message_id).or_default().push_str(content);
                }
            }
            AgentReplyEvent::Complete { agent_name, message_id, content, .. } => {
                self.buffers.remove(message_id);
                if self.live {
                    writeln!(out)?;
                } else {
                    writeln!(out, "\n  {} {content}", style(format!("{agent_name}:")).cyan().bold())?;
                }
            }
            AgentReplyEvent::Error { agent_name, message_id, error, .. } => {
                let partial = self.buffers.remove(message_id).unwrap_or_default();
                if self.live {
                    writeln!(out)?;
                } else if !partial.is_empty() {
                    writeln!(out, "\n  {} {partial}", style(format!("{agent_name}:")).cyan().bold())?;
                }
                writeln!(
                    out,
                    "  {} {agent_name} failed: {error}",
                    style("✗").red().bold()
                )?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

fn report(outcome: &ChatOutcome, json: bool) -> Result<()> {
    if json {
        let summary = serde_json::json!({
            "replies": outcome.replies,
            "failures": outcome.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    if outcome.is_partial_failure() {
        println!(
            "  {} {} replied, {} failed",
            style("!").yellow().bold(),
            outcome.replies.len(),
            outcome.failures.len()
        );
    } else {
        println!(
            "  {} {} replied",
            style("✓").green().bold(),
            outcome.replies.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<AgentProfile> {
        vec![
            AgentProfile::new("Ada", "openai", "gpt-4o"),
            AgentProfile::new("Grace", "anthropic", "claude-sonnet-4"),
        ]
    }

    #[test]
    fn mentions_resolve_by_name_case_insensitively() {
        let members = members();
        let ids = resolve_mentions(&members, &["@grace".to_string(), "ADA".to_string()], false)
            .unwrap();
        assert_eq!(ids, vec![members[1].id, members[0].id]);
    }

    #[test]
    fn duplicate_mentions_collapse() {
        let members = members();
        let ids =
            resolve_mentions(&members, &["Ada".to_string(), members[0].id.to_string()], false)
                .unwrap();
        assert_eq!(ids, vec![members[0].id]);
    }

    #[test]
    fn unknown_name_lists_members() {
        let err = resolve_mentions(&members(), &["Linus".to_string()], false).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Linus"));
        assert!(text.contains("Ada, Grace"));
    }

    #[test]
    fn unknown_uuid_passes_through() {
        let stranger = Uuid::now_v7();
        let ids = resolve_mentions(&members(), &[stranger.to_string()], false).unwrap();
        assert_eq!(ids, vec![stranger]);
    }

    #[test]
    fn all_selects_every_member_in_order() {
        let members = members();
        let ids = resolve_mentions(&members, &[], true).unwrap();
        assert_eq!(ids, vec![members[0].id, members[1].id]);
    }

    #[test]
    fn no_mentions_means_nobody() {
        assert!(resolve_mentions(&members(), &[], false).unwrap().is_empty());
    }

    #[test]
    fn printer_drops_partial_reply_on_error() {
        let mut printer = ReplyPrinter::new(false, false);
        let room = Uuid::now_v7();
        let agent_id = Uuid::now_v7();
        let message_id = Uuid::now_v7();

        printer
            .handle(
                room,
                &AgentReplyEvent::TypingStarted {
                    agent_id,
                    agent_name: "Ada".to_string(),
                    message_id,
                },
            )
            .unwrap();
        assert!(printer.buffers.contains_key(&message_id));

        printer
            .handle(
                room,
                &AgentReplyEvent::Error {
                    agent_id,
                    agent_name: "Ada".to_string(),
                    message_id,
                    error: "rate limited".to_string(),
                },
            )
            .unwrap();
        assert!(printer.buffers.is_empty());
    }

    #[test]
    fn printer_buffers_deltas_until_complete() {
        let mut printer = ReplyPrinter::new(false, false);
        let room = Uuid::now_v7();
        let agent_id = Uuid::now_v7();
        let message_id = Uuid::now_v7();

        printer
            .handle(
                room,
                &AgentReplyEvent::Delta {
                    agent_id,
                    agent_name: "Ada".to_string(),
                    message_id,
                    content: "Hel".to_string(),
                },
            )
            .unwrap();
        assert_eq!(printer.buffers.get(&message_id).map(String::as_str), Some("Hel"));

        printer
            .handle(
                room,
                &AgentReplyEvent::Complete {
                    agent_id,
                    agent_name: "Ada".to_string(),
                    message_id,
                    content: "Hello".to_string(),
                },
            )
            .unwrap();
        assert!(printer.buffers.is_empty());
    }
}
