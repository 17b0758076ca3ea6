//! Per-(room, agent) conversation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::CanonicalMessage;

/// The bounded history one agent sees in one room.
///
/// Created lazily on the agent's first turn, rewritten after every
/// completed turn and persisted by upsert on `(room_id, agent_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub room_id: Uuid,
    pub agent_id: Uuid,
    /// Chronological, oldest first. Never contains the system prompt.
    pub messages: Vec<CanonicalMessage>,
    pub system_prompt: Option<String>,
    pub token_count_estimate: u32,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn empty(room_id: Uuid, agent_id: Uuid, system_prompt: Option<String>) -> Self {
        Self {
            room_id,
            agent_id,
            messages: Vec::new(),
            system_prompt,
            token_count_estimate: 0,
            updated_at: Utc::now(),
        }
    }
}
