//! Per-(room, agent) conversation history with a token budget.
//!
//! Reads prefer the persisted snapshot and fall back to rebuilding from the
//! room's recent messages. Writes append the agent's reply, estimate the
//! token cost and drop the oldest messages when the budget is exceeded.

use std::sync::Arc;

use chrono::Utc;
use parley_types::chat::{ChatMessageRecord, SenderKind};
use parley_types::config::ContextConfig;
use parley_types::context::ConversationContext;
use parley_types::error::{ContextError, RepositoryError};
use parley_types::llm::{CanonicalMessage, MessageContent, MessageRole};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::repository::{ContextRepository, StoredContext};
use crate::chat::repository::ChatRepository;

/// Estimated token cost of `messages`: `ceil(total_chars / 4)`.
pub fn estimate_token_count(messages: &[CanonicalMessage]) -> u32 {
    let chars: usize = messages.iter().map(|m| m.content.char_count()).sum();
    chars.div_ceil(4) as u32
}

/// Loads, saves and resets conversation contexts.
///
/// Generic over both repositories so parley-core never depends on
/// parley-infra.
pub struct ContextManager<X: ContextRepository, C: ChatRepository> {
    contexts: Arc<X>,
    chat: Arc<C>,
    config: ContextConfig,
}

impl<X: ContextRepository, C: ChatRepository> ContextManager<X, C> {
    pub fn new(contexts: Arc<X>, chat: Arc<C>, config: ContextConfig) -> Self {
        Self {
            contexts,
            chat,
            config,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Load the context for `(room_id, agent_id)` in chronological order.
    ///
    /// Uses the persisted snapshot when one exists. Otherwise rebuilds from
    /// the room's most recent messages, skipping empty placeholders.
    pub async fn get_context(
        &self,
        room_id: Uuid,
        agent_id: Uuid,
        system_prompt: Option<&str>,
    ) -> Result<ConversationContext, ContextError> {
        let system_prompt = system_prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        if let Some(stored) = self.contexts.get_context(&room_id, &agent_id).await? {
            let messages = decode_messages(&stored.messages_json);
            debug!(
                %room_id,
                %agent_id,
                messages = messages.len(),
                "loaded persisted context"
            );
            return Ok(ConversationContext {
                room_id,
                agent_id,
                token_count_estimate: estimate_token_count(&messages),
                messages,
                system_prompt,
                updated_at: stored.updated_at,
            });
        }

        let mut recent = self
            .chat
            .recent_messages(&room_id, self.config.history_limit)
            .await?;
        // Query is newest first.
        recent.reverse();

        let messages: Vec<CanonicalMessage> = recent.iter().filter_map(record_to_message).collect();
        debug!(
            %room_id,
            %agent_id,
            messages = messages.len(),
            "rebuilt context from room history"
        );

        let mut context = ConversationContext::empty(room_id, agent_id, system_prompt);
        context.token_count_estimate = estimate_token_count(&messages);
        context.messages = messages;
        Ok(context)
    }

    /// Append `latest_reply` as an assistant turn and persist the result.
    ///
    /// When the estimate exceeds the token budget, the oldest messages are
    /// dropped so that at most `recent_message_cap` remain.
    pub async fn save_context(
        &self,
        room_id: Uuid,
        agent_id: Uuid,
        mut messages: Vec<CanonicalMessage>,
        latest_reply: &str,
    ) -> Result<ConversationContext, ContextError> {
        messages.retain(|m| m.role != MessageRole::System);
        messages.push(CanonicalMessage::assistant(latest_reply));

        let mut estimate = estimate_token_count(&messages);
        if estimate > self.config.token_budget && messages.len() > self.config.recent_message_cap {
            let excess = messages.len() - self.config.recent_message_cap;
            messages.drain(..excess);
            let truncated = estimate_token_count(&messages);
            debug!(
                %room_id,
                %agent_id,
                dropped = excess,
                before = estimate,
                after = truncated,
                "truncated context"
            );
            estimate = truncated;
        }

        let messages_json = serde_json::to_string(&messages)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let now = Utc::now();
        self.contexts
            .upsert_context(&StoredContext {
                room_id,
                agent_id,
                messages_json,
                token_count_estimate: estimate,
                updated_at: now,
            })
            .await?;

        Ok(ConversationContext {
            room_id,
            agent_id,
            messages,
            system_prompt: None,
            token_count_estimate: estimate,
            updated_at: now,
        })
    }

    /// Delete the context. `NotFound` when none was stored.
    pub async fn reset_context(&self, room_id: Uuid, agent_id: Uuid) -> Result<(), ContextError> {
        if self.contexts.delete_context(&room_id, &agent_id).await? {
            debug!(%room_id, %agent_id, "context reset");
            Ok(())
        } else {
            Err(ContextError::NotFound { room_id, agent_id })
        }
    }
}

fn record_to_message(record: &ChatMessageRecord) -> Option<CanonicalMessage> {
    if record.content.trim().is_empty() {
        return None;
    }
    let role = match record.sender_kind {
        SenderKind::Human => MessageRole::User,
        SenderKind::Agent => MessageRole::Assistant,
    };
    Some(CanonicalMessage::new(role, record.content.clone()))
}

/// Decode a persisted message list without ever failing.
///
/// Well-formed entries are kept as-is; anything else becomes a user-role
/// text message carrying whatever text could be recovered.
fn decode_messages(raw: &str) -> Vec<CanonicalMessage> {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(other) => {
            warn!("persisted context is not a list, coercing");
            vec![other]
        }
        Err(e) => {
            warn!(error = %e, "persisted context is not valid JSON, coercing");
            if raw.trim().is_empty() {
                return Vec::new();
            }
            vec![Value::String(raw.to_string())]
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<CanonicalMessage>(entry.clone()) {
            Ok(message) => Some(message),
            Err(_) => coerce_entry(entry),
        })
        .collect()
}

fn coerce_entry(entry: Value) -> Option<CanonicalMessage> {
    let text = match entry {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Object(ref map) => match map.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => entry.to_string(),
            Some(other) => other.to_string(),
        },
        other => other.to_string(),
    };
    Some(CanonicalMessage {
        role: MessageRole::User,
        content: MessageContent::Text(text),
        name: None,
    })
}
