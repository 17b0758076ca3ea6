//! SQLite conversation context repository.
//!
//! One row per (room, agent). Writes are plain upserts: the last writer
//! wins.

use sqlx::Row;
use uuid::Uuid;

use parley_core::context::repository::{ContextRepository, StoredContext};
use parley_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, query_error};

/// SQLite-backed implementation of `ContextRepository`.
pub struct SqliteContextRepository {
    pool: DatabasePool,
}

impl SqliteContextRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ContextRow {
    room_id: String,
    agent_id: String,
    messages: String,
    token_count_estimate: i64,
    updated_at: String,
}

impl ContextRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            room_id: row.try_get("room_id")?,
            agent_id: row.try_get("agent_id")?,
            messages: row.try_get("messages")?,
            token_count_estimate: row.try_get("token_count_estimate")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_stored(self) -> Result<StoredContext, RepositoryError> {
        Ok(StoredContext {
            room_id: parse_uuid(&self.room_id, "room id")?,
            agent_id: parse_uuid(&self.agent_id, "agent id")?,
            // Decoded leniently by the context manager.
            messages_json: self.messages,
            token_count_estimate: u32::try_from(self.token_count_estimate).unwrap_or(0),
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl ContextRepository for SqliteContextRepository {
    async fn get_context(
        &self,
        room_id: &Uuid,
        agent_id: &Uuid,
    ) -> Result<Option<StoredContext>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM conversation_contexts WHERE room_id = ? AND agent_id = ?",
        )
        .bind(room_id.to_string())
        .bind(agent_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        row.map(|row| {
            ContextRow::from_row(&row)
                .map_err(query_error)
                .and_then(ContextRow::into_stored)
        })
        .transpose()
    }

    async fn upsert_context(&self, context: &StoredContext) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversation_contexts (room_id, agent_id, messages, token_count_estimate, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(room_id, agent_id) DO UPDATE SET
                messages = excluded.messages,
                token_count_estimate = excluded.token_count_estimate,
                updated_at = excluded.updated_at",
        )
        .bind(context.room_id.to_string())
        .bind(context.agent_id.to_string())
        .bind(&context.messages_json)
        .bind(i64::from(context.token_count_estimate))
        .bind(format_datetime(&context.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn delete_context(&self, room_id: &Uuid, agent_id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM conversation_contexts WHERE room_id = ? AND agent_id = ?",
        )
        .bind(room_id.to_string())
        .bind(agent_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}
