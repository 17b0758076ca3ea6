use thiserror::Error;
use uuid::Uuid;

use std::fmt;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from conversation context operations.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no context stored for agent {agent_id} in room {room_id}")]
    NotFound { room_id: Uuid, agent_id: Uuid },

    #[error("context storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors from chat orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// One agent's turn failed. Sibling turns are unaffected.
    #[error("agent '{agent_name}' ({agent_id}) failed in room {room_id}: {cause}")]
    AgentTurn {
        room_id: Uuid,
        agent_id: Uuid,
        agent_name: String,
        cause: String,
    },

    /// The room itself could not be loaded; no agent ran.
    #[error("chat storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OrchestratorError {
    pub fn agent_turn(
        room_id: Uuid,
        agent_id: Uuid,
        agent_name: &str,
        cause: impl fmt::Display,
    ) -> Self {
        OrchestratorError::AgentTurn {
            room_id,
            agent_id,
            agent_name: agent_name.to_string(),
            cause: cause.to_string(),
        }
    }
}
