//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `parley-core` with raw queries, private
//! row structs and split reader/writer pool usage.

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{AgentProfile, ChatMessageRecord, SenderKind};
use parley_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, query_error};

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct AgentRow {
    id: String,
    name: String,
    provider: String,
    model: String,
    system_prompt: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    temperature: Option<f64>,
    max_output_tokens: Option<i64>,
}

impl AgentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            provider: row.try_get("provider")?,
            model: row.try_get("model")?,
            system_prompt: row.try_get("system_prompt")?,
            api_key: row.try_get("api_key")?,
            endpoint: row.try_get("endpoint")?,
            temperature: row.try_get("temperature")?,
            max_output_tokens: row.try_get("max_output_tokens")?,
        })
    }

    fn into_agent(self) -> Result<AgentProfile, RepositoryError> {
        Ok(AgentProfile {
            id: parse_uuid(&self.id, "agent id")?,
            name: self.name,
            provider: self.provider,
            model: self.model,
            system_prompt: self.system_prompt,
            api_key: self.api_key,
            endpoint: self.endpoint,
            temperature: self.temperature.map(|t| t as f32),
            max_output_tokens: self.max_output_tokens.map(|t| t.max(0) as u32),
        })
    }
}

struct MessageRow {
    id: String,
    room_id: String,
    sender_kind: String,
    sender_id: String,
    sender_name: String,
    content: String,
    created_at: String,
    updated_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            sender_kind: row.try_get("sender_kind")?,
            sender_id: row.try_get("sender_id")?,
            sender_name: row.try_get("sender_name")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<ChatMessageRecord, RepositoryError> {
        let sender_kind: SenderKind = self
            .sender_kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessageRecord {
            id: parse_uuid(&self.id, "message id")?,
            room_id: parse_uuid(&self.room_id, "room id")?,
            sender_kind,
            sender_id: parse_uuid(&self.sender_id, "sender id")?,
            sender_name: self.sender_name,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_rows<R, T>(
    rows: &[sqlx::sqlite::SqliteRow],
    from_row: fn(&sqlx::sqlite::SqliteRow) -> Result<R, sqlx::Error>,
    convert: fn(R) -> Result<T, RepositoryError>,
) -> Result<Vec<T>, RepositoryError> {
    rows.iter()
        .map(|row| from_row(row).map_err(query_error).and_then(convert))
        .collect()
}

impl ChatRepository for SqliteChatRepository {
    async fn list_room_agents(&self, room_id: &Uuid) -> Result<Vec<AgentProfile>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT a.* FROM agents a
             JOIN room_agents ra ON ra.agent_id = a.id
             WHERE ra.room_id = ?
             ORDER BY ra.joined_at ASC",
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        map_rows(&rows, AgentRow::from_row, AgentRow::into_agent)
    }

    async fn recent_messages(
        &self,
        room_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE room_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(room_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        map_rows(&rows, MessageRow::from_row, MessageRow::into_record)
    }

    async fn create_message(&self, message: &ChatMessageRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO chat_messages (id, room_id, sender_kind, sender_id, sender_name, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.room_id.to_string())
        .bind(message.sender_kind.to_string())
        .bind(message.sender_id.to_string())
        .bind(&message.sender_name)
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .bind(format_datetime(&message.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("message '{}' already exists", message.id)),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn update_message_content(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chat_messages SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(format_datetime(&Utc::now()))
            .bind(message_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_message(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<ChatMessageRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_messages WHERE id = ?")
            .bind(message_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| {
            MessageRow::from_row(&row)
                .map_err(query_error)
                .and_then(MessageRow::into_record)
        })
        .transpose()
    }

    async fn save_agent(&self, agent: &AgentProfile) -> Result<(), RepositoryError> {
        let now = format_datetime(&Utc::now());
        sqlx::query(
            "INSERT INTO agents (id, name, provider, model, system_prompt, api_key, endpoint, temperature, max_output_tokens, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                provider = excluded.provider,
                model = excluded.model,
                system_prompt = excluded.system_prompt,
                api_key = excluded.api_key,
                endpoint = excluded.endpoint,
                temperature = excluded.temperature,
                max_output_tokens = excluded.max_output_tokens,
                updated_at = excluded.updated_at",
        )
        .bind(agent.id.to_string())
        .bind(&agent.name)
        .bind(&agent.provider)
        .bind(&agent.model)
        .bind(&agent.system_prompt)
        .bind(&agent.api_key)
        .bind(&agent.endpoint)
        .bind(agent.temperature.map(f64::from))
        .bind(agent.max_output_tokens.map(i64::from))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn get_agent(&self, agent_id: &Uuid) -> Result<Option<AgentProfile>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(agent_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| {
            AgentRow::from_row(&row)
                .map_err(query_error)
                .and_then(AgentRow::into_agent)
        })
        .transpose()
    }

    async fn list_agents(&self) -> Result<Vec<AgentProfile>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY created_at ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        map_rows(&rows, AgentRow::from_row, AgentRow::into_agent)
    }

    async fn add_room_agent(&self, room_id: &Uuid, agent_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO room_agents (room_id, agent_id, joined_at) VALUES (?, ?, ?)
             ON CONFLICT(room_id, agent_id) DO NOTHING",
        )
        .bind(room_id.to_string())
        .bind(agent_id.to_string())
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(query_error(e)),
        }
    }
}
