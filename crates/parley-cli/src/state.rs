//! Application state wiring all services together.
//!
//! The core services are generic over repository and search traits;
//! AppState pins them to the SQLite repositories and the Serper client.

use std::path::Path;
use std::sync::Arc;

use parley_core::chat::ChatOrchestrator;
use parley_core::context::ContextManager;
use parley_core::event::EventBus;
use parley_core::llm::registry::ProviderRegistry;
use parley_core::search::{NoSearch, SearchError, SearchProvider, SearchResult};
use parley_infra::config::{load_config, resolve_data_dir};
use parley_infra::llm::DefaultProviderFactory;
use parley_infra::search::SerperSearch;
use parley_infra::secret::env::{SERPER_API_KEY, default_credentials, env_var};
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::context::SqliteContextRepository;
use parley_infra::sqlite::pool::DatabasePool;

/// Web search backend chosen at startup.
pub enum WebSearch {
    Serper(SerperSearch),
    Disabled(NoSearch),
}

impl WebSearch {
    /// Serper when `SERPER_API_KEY` is set, otherwise disabled.
    pub fn from_env() -> Self {
        match env_var(SERPER_API_KEY).map(SerperSearch::new) {
            Some(Ok(serper)) => WebSearch::Serper(serper),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "web search disabled");
                WebSearch::Disabled(NoSearch)
            }
            None => WebSearch::Disabled(NoSearch),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, WebSearch::Serper(_))
    }
}

impl SearchProvider for WebSearch {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        match self {
            WebSearch::Serper(serper) => serper.search(query, top_k).await,
            WebSearch::Disabled(none) => none.search(query, top_k).await,
        }
    }
}

pub type ConcreteContextManager = ContextManager<SqliteContextRepository, SqliteChatRepository>;

pub type ConcreteOrchestrator =
    ChatOrchestrator<SqliteChatRepository, SqliteContextRepository, WebSearch>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<SqliteChatRepository>,
    pub contexts: Arc<ConcreteContextManager>,
    pub registry: Arc<ProviderRegistry>,
    pub orchestrator: ConcreteOrchestrator,
    pub search_enabled: bool,
}

impl AppState {
    /// Initialize against the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        Self::open(&resolve_data_dir()).await
    }

    /// Connect to the database under `data_dir` and wire services.
    pub async fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let config = load_config(data_dir).await;
        let pool = DatabasePool::open(data_dir).await?;

        let chat = Arc::new(SqliteChatRepository::new(pool.clone()));
        let context_repo = Arc::new(SqliteContextRepository::new(pool));

        let contexts = Arc::new(ContextManager::new(
            context_repo,
            Arc::clone(&chat),
            config.context.clone(),
        ));

        let registry = Arc::new(ProviderRegistry::new(
            Arc::new(DefaultProviderFactory),
            default_credentials(&config.providers),
        ));

        let search = WebSearch::from_env();
        let search_enabled = search.is_enabled();

        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&chat),
            Arc::clone(&contexts),
            Arc::clone(&registry),
            Arc::new(search),
            EventBus::default(),
            config.chat.clone(),
        );

        tracing::debug!(
            data_dir = %data_dir.display(),
            providers = registry.provider_ids().len(),
            search_enabled,
            "application state ready"
        );

        Ok(Self {
            chat,
            contexts,
            registry,
            orchestrator,
            search_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::chat::ChatRepository;
    use parley_types::chat::AgentProfile;

    #[tokio::test]
    async fn open_creates_database_and_registry() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).await.unwrap();

        assert!(dir.path().join("parley.db").exists());
        assert!(state.registry.provider_ids().contains(&"ollama"));
        assert!(state.chat.list_agents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_shares_one_chat_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).await.unwrap();
        let agent = AgentProfile::new("Ada", "ollama", "llama3");
        state.chat.save_agent(&agent).await.unwrap();

        let reopened = AppState::open(dir.path()).await.unwrap();
        let stored = reopened.chat.get_agent(&agent.id).await.unwrap();
        assert_eq!(stored.map(|a| a.name), Some("Ada".to_string()));
    }
}
