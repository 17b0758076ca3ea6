//! ChatRepository trait definition.
//!
//! The room store is an external collaborator; this is the slice of it the
//! orchestrator and context manager need: room membership, recent history,
//! and message create/update by id.

use parley_types::chat::{AgentProfile, ChatMessageRecord};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for room messages and agent membership.
///
/// Implementations live in parley-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Agents that are members of the room.
    fn list_room_agents(
        &self,
        room_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AgentProfile>, RepositoryError>> + Send;

    /// The most recent `limit` messages in the room, newest first.
    fn recent_messages(
        &self,
        room_id: &Uuid,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessageRecord>, RepositoryError>> + Send;

    fn create_message(
        &self,
        message: &ChatMessageRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite a message's content. `NotFound` if the id is unknown.
    fn update_message_content(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_message(
        &self,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessageRecord>, RepositoryError>> + Send;

    /// Insert or replace an agent profile.
    fn save_agent(
        &self,
        agent: &AgentProfile,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_agent(
        &self,
        agent_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AgentProfile>, RepositoryError>> + Send;

    fn list_agents(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<AgentProfile>, RepositoryError>> + Send;

    /// Add an agent to a room. Adding an existing member is a no-op.
    fn add_room_agent(
        &self,
        room_id: &Uuid,
        agent_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
