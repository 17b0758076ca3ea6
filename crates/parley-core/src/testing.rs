//! In-memory repository doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use parley_types::chat::{AgentProfile, ChatMessageRecord};
use parley_types::error::RepositoryError;
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::context::repository::{ContextRepository, StoredContext};

#[derive(Default)]
pub struct InMemoryChatRepository {
    pub agents: Mutex<HashMap<Uuid, AgentProfile>>,
    pub members: Mutex<Vec<(Uuid, Uuid)>>,
    pub messages: Mutex<Vec<ChatMessageRecord>>,
}

impl InMemoryChatRepository {
    pub fn content_of(&self, message_id: &Uuid) -> Option<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == *message_id)
            .map(|m| m.content.clone())
    }
}

impl ChatRepository for InMemoryChatRepository {
    async fn list_room_agents(&self, room_id: &Uuid) -> Result<Vec<AgentProfile>, RepositoryError> {
        let members = self.members.lock().unwrap();
        let agents = self.agents.lock().unwrap();
        Ok(members
            .iter()
            .filter(|(room, _)| room == room_id)
            .filter_map(|(_, agent)| agents.get(agent).cloned())
            .collect())
    }

    async fn recent_messages(
        &self,
        room_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>, RepositoryError> {
        let mut messages: Vec<ChatMessageRecord> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.room_id == *room_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn create_message(&self, message: &ChatMessageRecord) -> Result<(), RepositoryError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn update_message_content(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.lock().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.id == *message_id)
            .ok_or(RepositoryError::NotFound)?;
        message.content = content.to_string();
        Ok(())
    }

    async fn get_message(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<ChatMessageRecord>, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == *message_id)
            .cloned())
    }

    async fn save_agent(&self, agent: &AgentProfile) -> Result<(), RepositoryError> {
        self.agents.lock().unwrap().insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get_agent(&self, agent_id: &Uuid) -> Result<Option<AgentProfile>, RepositoryError> {
        Ok(self.agents.lock().unwrap().get(agent_id).cloned())
    }

    async fn list_agents(&self) -> Result<Vec<AgentProfile>, RepositoryError> {
        Ok(self.agents.lock().unwrap().values().cloned().collect())
    }

    async fn add_room_agent(&self, room_id: &Uuid, agent_id: &Uuid) -> Result<(), RepositoryError> {
        let mut members = self.members.lock().unwrap();
        if !members.contains(&(*room_id, *agent_id)) {
            members.push((*room_id, *agent_id));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContextRepository {
    pub rows: Mutex<HashMap<(Uuid, Uuid), StoredContext>>,
}

impl ContextRepository for InMemoryContextRepository {
    async fn get_context(
        &self,
        room_id: &Uuid,
        agent_id: &Uuid,
    ) -> Result<Option<StoredContext>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(&(*room_id, *agent_id)).cloned())
    }

    async fn upsert_context(&self, context: &StoredContext) -> Result<(), RepositoryError> {
        self.rows
            .lock()
            .unwrap()
            .insert((context.room_id, context.agent_id), context.clone());
        Ok(())
    }

    async fn delete_context(&self, room_id: &Uuid, agent_id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.rows.lock().unwrap().remove(&(*room_id, *agent_id)).is_some())
    }
}
