//! Room notification events.
//!
//! `RoomEvent` is what the orchestrator broadcasts while agents answer a
//! message. Transports (WebSocket, CLI) subscribe to the bus and forward
//! these to clients. All variants are Clone + Send + Sync for use with
//! tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification scoped to one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub room_id: Uuid,
    pub event: AgentReplyEvent,
}

impl RoomEvent {
    pub fn new(room_id: Uuid, event: AgentReplyEvent) -> Self {
        Self { room_id, event }
    }
}

/// Lifecycle of one agent's reply to a human message.
///
/// Every reply emits `TypingStarted` first, then any number of `Delta`s,
/// then exactly one of `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentReplyEvent {
    /// A placeholder message was created and the agent is working.
    TypingStarted {
        agent_id: Uuid,
        agent_name: String,
        message_id: Uuid,
    },

    /// A streamed fragment of the reply.
    Delta {
        agent_id: Uuid,
        agent_name: String,
        message_id: Uuid,
        content: String,
    },

    /// The reply finished; `content` is the full text.
    Complete {
        agent_id: Uuid,
        agent_name: String,
        message_id: Uuid,
        content: String,
    },

    /// The reply failed; the placeholder now holds the fallback text.
    Error {
        agent_id: Uuid,
        agent_name: String,
        message_id: Uuid,
        error: String,
    },
}

impl AgentReplyEvent {
    pub fn agent_id(&self) -> Uuid {
        match self {
            AgentReplyEvent::TypingStarted { agent_id, .. }
            | AgentReplyEvent::Delta { agent_id, .. }
            | AgentReplyEvent::Complete { agent_id, .. }
            | AgentReplyEvent::Error { agent_id, .. } => *agent_id,
        }
    }

    pub fn message_id(&self) -> Uuid {
        match self {
            AgentReplyEvent::TypingStarted { message_id, .. }
            | AgentReplyEvent::Delta { message_id, .. }
            | AgentReplyEvent::Complete { message_id, .. }
            | AgentReplyEvent::Error { message_id, .. } => *message_id,
        }
    }

    /// True for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentReplyEvent::Complete { .. } | AgentReplyEvent::Error { .. }
        )
    }
}
