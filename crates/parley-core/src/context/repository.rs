//! ContextRepository trait definition.
//!
//! Persists one conversation snapshot per (room, agent). The message list is
//! stored as raw JSON text; decoding is done defensively by the
//! [`super::manager::ContextManager`], not by the repository.

use chrono::{DateTime, Utc};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Persisted form of a conversation context.
#[derive(Debug, Clone)]
pub struct StoredContext {
    pub room_id: Uuid,
    pub agent_id: Uuid,
    /// JSON array of canonical messages, as last written.
    pub messages_json: String,
    pub token_count_estimate: u32,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for conversation context snapshots.
///
/// Implementations live in parley-infra (e.g., `SqliteContextRepository`).
pub trait ContextRepository: Send + Sync {
    fn get_context(
        &self,
        room_id: &Uuid,
        agent_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<StoredContext>, RepositoryError>> + Send;

    /// Insert or replace the snapshot for `(room_id, agent_id)`.
    fn upsert_context(
        &self,
        context: &StoredContext,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete the snapshot. Returns whether a row existed.
    fn delete_context(
        &self,
        room_id: &Uuid,
        agent_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
