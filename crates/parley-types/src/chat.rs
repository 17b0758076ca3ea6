//! Room chat records and agent profiles.
//!
//! These model the collaborator side of the system: the messages stored in a
//! room and the per-agent vendor configuration the orchestrator reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who wrote a room message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender_kind IN ('human', 'agent'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    Human,
    Agent,
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderKind::Human => write!(f, "human"),
            SenderKind::Agent => write!(f, "agent"),
        }
    }
}

impl FromStr for SenderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(SenderKind::Human),
            "agent" => Ok(SenderKind::Agent),
            other => Err(format!("invalid sender kind: '{other}'")),
        }
    }
}

/// A message stored in a room.
///
/// Agent replies start life as an empty placeholder and are overwritten
/// with the final (or fallback) content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_kind: SenderKind,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    pub fn new(
        room_id: Uuid,
        sender_kind: SenderKind,
        sender_id: Uuid,
        sender_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            room_id,
            sender_kind,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An agent's vendor binding and prompt configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: Uuid,
    pub name: String,
    /// Provider identifier as entered; normalized by the registry.
    pub provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    /// Per-agent key that overrides the process default.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            system_prompt: None,
            api_key: None,
            endpoint: None,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl fmt::Debug for AgentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// How the user asked the agents to answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[default]
    Normal,
    /// Augment the user turn with web search snippets.
    Search,
    /// Add a step-by-step reasoning directive to the prompt.
    DeepThink,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Normal => write!(f, "normal"),
            ChatMode::Search => write!(f, "search"),
            ChatMode::DeepThink => write!(f, "deep_think"),
        }
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "normal" => Ok(ChatMode::Normal),
            "search" => Ok(ChatMode::Search),
            "deep_think" | "deepthink" => Ok(ChatMode::DeepThink),
            other => Err(format!("invalid chat mode: '{other}'")),
        }
    }
}

/// State of one agent's attempt to answer one human message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    #[default]
    Idle,
    Dispatched,
    Streaming,
    Completed,
    Failed,
}

impl TurnState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, Dispatched)
                | (Dispatched, Streaming)
                | (Dispatched, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Failed)
    }
}

/// A successful agent reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub message_id: Uuid,
    pub content: String,
}
