//! Chat orchestrator: fans one human message out to the mentioned agents.
//!
//! Each mentioned agent gets its own task in a `JoinSet`. A turn creates an
//! empty placeholder message, streams the agent's vendor into it and then
//! either persists the final text or overwrites the placeholder with the
//! fallback message. A failing or panicking turn never affects its
//! siblings; the caller gets every successful reply plus one error per
//! failed agent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parley_types::chat::{AgentProfile, AgentReply, ChatMessageRecord, ChatMode, SenderKind, TurnState};
use parley_types::config::ChatConfig;
use parley_types::credential::CredentialOverride;
use parley_types::error::{ContextError, OrchestratorError};
use parley_types::event::AgentReplyEvent;
use parley_types::llm::{CanonicalMessage, GenerationRequest, LlmError, MessageRole, StreamDelta};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::context::manager::ContextManager;
use crate::context::repository::ContextRepository;
use crate::event::EventBus;
use crate::llm::registry::ProviderRegistry;
use crate::llm::stream::{StreamSink, stream_message};
use crate::search::{SearchProvider, augment_with_results};

/// One human message addressed to a room.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub room_id: Uuid,
    pub message: String,
    pub sender_id: Uuid,
    /// Agents that must answer. Empty means nobody answers.
    pub mentions: Vec<Uuid>,
    pub mode: ChatMode,
    /// Carried for callers that want to cancel; not acted upon yet.
    pub cancel: Option<CancellationToken>,
}

impl ChatRequest {
    pub fn new(room_id: Uuid, sender_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            room_id,
            message: message.into(),
            sender_id,
            mentions: Vec::new(),
            mode: ChatMode::Normal,
            cancel: None,
        }
    }

    pub fn mentioning(mut self, agents: impl IntoIterator<Item = Uuid>) -> Self {
        self.mentions.extend(agents);
        self
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Result of one fan-out. Non-empty `failures` is a partial failure.
#[derive(Debug, Default)]
pub struct ChatOutcome {
    pub replies: Vec<AgentReply>,
    pub failures: Vec<OrchestratorError>,
}

impl ChatOutcome {
    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("could not store reply: {0}")]
    Persist(String),
}

/// Coordinates agent turns for room messages.
///
/// Generic over the repositories and search backend so parley-core never
/// depends on parley-infra. Cheap to clone; all state is shared.
pub struct ChatOrchestrator<C, X, S>
where
    C: ChatRepository + 'static,
    X: ContextRepository + 'static,
    S: SearchProvider + 'static,
{
    chat: Arc<C>,
    contexts: Arc<ContextManager<X, C>>,
    registry: Arc<ProviderRegistry>,
    search: Arc<S>,
    bus: EventBus,
    config: Arc<ChatConfig>,
}

impl<C, X, S> Clone for ChatOrchestrator<C, X, S>
where
    C: ChatRepository + 'static,
    X: ContextRepository + 'static,
    S: SearchProvider + 'static,
{
    fn clone(&self) -> Self {
        Self {
            chat: Arc::clone(&self.chat),
            contexts: Arc::clone(&self.contexts),
            registry: Arc::clone(&self.registry),
            search: Arc::clone(&self.search),
            bus: self.bus.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C, X, S> ChatOrchestrator<C, X, S>
where
    C: ChatRepository + 'static,
    X: ContextRepository + 'static,
    S: SearchProvider + 'static,
{
    pub fn new(
        chat: Arc<C>,
        contexts: Arc<ContextManager<X, C>>,
        registry: Arc<ProviderRegistry>,
        search: Arc<S>,
        bus: EventBus,
        config: ChatConfig,
    ) -> Self {
        Self {
            chat,
            contexts,
            registry,
            search,
            bus,
            config: Arc::new(config),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Answer `request` with every mentioned agent that belongs to the room.
    ///
    /// Returns `Err` only if the room's agents cannot be loaded. Agent
    /// failures are reported in [`ChatOutcome::failures`].
    pub async fn process_chat(&self, request: ChatRequest) -> Result<ChatOutcome, OrchestratorError> {
        let room_id = request.room_id;
        info!(
            %room_id,
            sender_id = %request.sender_id,
            mode = %request.mode,
            mentions = request.mentions.len(),
            preview = %preview(&request.message),
            "processing chat message"
        );

        if request.mentions.is_empty() {
            debug!(%room_id, "no mentions, no agent will answer");
            return Ok(ChatOutcome::default());
        }

        let members = self.chat.list_room_agents(&room_id).await?;
        let targets = select_targets(&members, &request.mentions);
        for missing in request
            .mentions
            .iter()
            .filter(|id| !members.iter().any(|a| a.id == **id))
        {
            warn!(%room_id, agent_id = %missing, "mentioned agent is not in the room");
        }

        let request = Arc::new(request);
        let mut set = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, (AgentProfile, Uuid)> = HashMap::new();

        for agent in targets {
            let message_id = Uuid::now_v7();
            let span = info_span!(
                "chat.agent_turn",
                room_id = %room_id,
                agent_id = %agent.id,
                gen_ai.system = %agent.provider,
                gen_ai.request.model = %agent.model,
            );
            let this = self.clone();
            let req = Arc::clone(&request);
            let task_agent = agent.clone();
            let handle = set.spawn(
                async move { this.run_turn(&task_agent, &req, message_id).await }.instrument(span),
            );
            in_flight.insert(handle.id(), (agent, message_id));
        }

        let mut outcome = ChatOutcome::default();
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    match result {
                        Ok(reply) => outcome.replies.push(reply),
                        Err(e) => outcome.failures.push(e),
                    }
                }
                Err(join_error) => {
                    warn!(%room_id, error = %join_error, "agent turn panicked");
                    let Some((agent, message_id)) = in_flight.remove(&join_error.id()) else {
                        continue;
                    };
                    let cause = format!("turn panicked: {join_error}");
                    self.fail_turn(&agent, room_id, message_id, &request.message, &cause)
                        .await;
                    outcome
                        .failures
                        .push(OrchestratorError::agent_turn(room_id, agent.id, &agent.name, cause));
                }
            }
        }

        info!(
            %room_id,
            replies = outcome.replies.len(),
            failures = outcome.failures.len(),
            "chat message processed"
        );
        Ok(outcome)
    }

    async fn run_turn(
        &self,
        agent: &AgentProfile,
        request: &ChatRequest,
        message_id: Uuid,
    ) -> Result<AgentReply, OrchestratorError> {
        let room_id = request.room_id;

        let mut placeholder =
            ChatMessageRecord::new(room_id, SenderKind::Agent, agent.id, agent.name.clone(), "");
        placeholder.id = message_id;
        if let Err(e) = self.chat.create_message(&placeholder).await {
            warn!(%room_id, agent_id = %agent.id, error = %e, "could not create placeholder");
            return Err(OrchestratorError::agent_turn(room_id, agent.id, &agent.name, e));
        }
        self.bus.notify(
            room_id,
            AgentReplyEvent::TypingStarted {
                agent_id: agent.id,
                agent_name: agent.name.clone(),
                message_id,
            },
        );

        match self.generate(agent, request, message_id).await {
            Ok(content) => Ok(AgentReply {
                agent_id: agent.id,
                agent_name: agent.name.clone(),
                message_id,
                content,
            }),
            Err(e) => {
                let cause = e.to_string();
                self.fail_turn(agent, room_id, message_id, &request.message, &cause)
                    .await;
                Err(OrchestratorError::agent_turn(room_id, agent.id, &agent.name, cause))
            }
        }
    }

    async fn generate(
        &self,
        agent: &AgentProfile,
        request: &ChatRequest,
        message_id: Uuid,
    ) -> Result<String, TurnError> {
        let room_id = request.room_id;
        if request.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            debug!(%room_id, agent_id = %agent.id, "cancellation requested; continuing");
        }

        if agent.model.trim().is_empty() {
            return Err(LlmError::configuration(format!(
                "agent '{}' has no model configured",
                agent.name
            ))
            .into());
        }
        let overrides = CredentialOverride {
            api_key: agent.api_key.clone(),
            endpoint: agent.endpoint.clone(),
            ..CredentialOverride::default()
        };
        let provider = self.registry.resolve(&agent.provider, Some(&overrides))?;

        let context = self
            .contexts
            .get_context(room_id, agent.id, agent.system_prompt.as_deref())
            .await?;
        let mut history = context.messages;
        // The human message is usually already in the room history.
        if history
            .last()
            .is_some_and(|m| m.role == MessageRole::User && m.text() == request.message)
        {
            history.pop();
        }

        let user_text = match request.mode {
            ChatMode::Search => self.augment(&request.message, room_id).await,
            ChatMode::Normal | ChatMode::DeepThink => request.message.clone(),
        };

        let mut messages = Vec::with_capacity(history.len() + 3);
        if let Some(prompt) = &context.system_prompt {
            messages.push(CanonicalMessage::system(prompt.clone()));
        }
        if request.mode == ChatMode::DeepThink {
            messages.push(CanonicalMessage::system(self.config.deep_think_directive.clone()));
        }
        messages.extend(history.iter().cloned());
        messages.push(CanonicalMessage::user(user_text));

        let mut generation = GenerationRequest::new(agent.model.clone(), messages);
        generation.temperature = agent.temperature.or(self.config.default_temperature);
        generation.max_output_tokens = agent
            .max_output_tokens
            .or(self.config.default_max_output_tokens);

        history.push(CanonicalMessage::user(request.message.clone()));
        let mut sink = ReplySink {
            orchestrator: self,
            agent,
            room_id,
            message_id,
            history: Some(history),
            state: TurnState::Idle,
            persist_error: None,
        };
        sink.advance(TurnState::Dispatched);

        // TODO: stop reading the vendor stream once `request.cancel` fires.
        let summary = stream_message(&provider, generation, &mut sink).await?;
        if let Some(e) = sink.persist_error.take() {
            return Err(e);
        }

        debug!(
            %room_id,
            agent_id = %agent.id,
            chars = summary.content.chars().count(),
            usage = ?summary.usage,
            "agent turn completed"
        );
        Ok(summary.content)
    }

    /// Splice top-k search snippets into `message`. Search failures and
    /// empty results leave the message unmodified.
    async fn augment(&self, message: &str, room_id: Uuid) -> String {
        match self.search.search(message, self.config.search_top_k).await {
            Ok(results) => {
                debug!(%room_id, results = results.len(), "search completed");
                augment_with_results(message, &results)
            }
            Err(e) => {
                warn!(%room_id, error = %e, "search failed, using message as-is");
                message.to_string()
            }
        }
    }

    async fn fail_turn(
        &self,
        agent: &AgentProfile,
        room_id: Uuid,
        message_id: Uuid,
        message: &str,
        cause: &str,
    ) {
        warn!(
            %room_id,
            agent_id = %agent.id,
            agent_name = %agent.name,
            preview = %preview(message),
            error = %cause,
            "agent turn failed"
        );
        if let Err(e) = self
            .chat
            .update_message_content(&message_id, &self.config.fallback_message)
            .await
        {
            warn!(%room_id, agent_id = %agent.id, error = %e, "could not write fallback reply");
        }
        self.bus.notify(
            room_id,
            AgentReplyEvent::Error {
                agent_id: agent.id,
                agent_name: agent.name.clone(),
                message_id,
                error: cause.to_string(),
            },
        );
    }
}

/// Forwards deltas as they arrive and finalizes the placeholder.
struct ReplySink<'a, C, X, S>
where
    C: ChatRepository + 'static,
    X: ContextRepository + 'static,
    S: SearchProvider + 'static,
{
    orchestrator: &'a ChatOrchestrator<C, X, S>,
    agent: &'a AgentProfile,
    room_id: Uuid,
    message_id: Uuid,
    /// History plus the unaugmented user turn, saved on completion.
    history: Option<Vec<CanonicalMessage>>,
    state: TurnState,
    persist_error: Option<TurnError>,
}

impl<C, X, S> ReplySink<'_, C, X, S>
where
    C: ChatRepository + 'static,
    X: ContextRepository + 'static,
    S: SearchProvider + 'static,
{
    fn advance(&mut self, next: TurnState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            debug!(from = ?self.state, to = ?next, "ignoring turn state transition");
        }
    }
}

impl<C, X, S> StreamSink for ReplySink<'_, C, X, S>
where
    C: ChatRepository + 'static,
    X: ContextRepository + 'static,
    S: SearchProvider + 'static,
{
    async fn on_delta(&mut self, delta: &StreamDelta) {
        if self.state == TurnState::Dispatched {
            self.advance(TurnState::Streaming);
        }
        self.orchestrator.bus.notify(
            self.room_id,
            AgentReplyEvent::Delta {
                agent_id: self.agent.id,
                agent_name: self.agent.name.clone(),
                message_id: self.message_id,
                content: delta.content.clone(),
            },
        );
    }

    async fn on_complete(&mut self, full_text: &str) {
        let orchestrator = self.orchestrator;
        if let Err(e) = orchestrator
            .chat
            .update_message_content(&self.message_id, full_text)
            .await
        {
            self.advance(TurnState::Failed);
            self.persist_error = Some(TurnError::Persist(e.to_string()));
            return;
        }
        if self.state == TurnState::Dispatched {
            self.advance(TurnState::Streaming);
        }
        self.advance(TurnState::Completed);

        orchestrator.bus.notify(
            self.room_id,
            AgentReplyEvent::Complete {
                agent_id: self.agent.id,
                agent_name: self.agent.name.clone(),
                message_id: self.message_id,
                content: full_text.to_string(),
            },
        );

        let history = self.history.take().unwrap_or_default();
        if let Err(e) = orchestrator
            .contexts
            .save_context(self.room_id, self.agent.id, history, full_text)
            .await
        {
            warn!(
                room_id = %self.room_id,
                agent_id = %self.agent.id,
                error = %e,
                "could not save context"
            );
        }
    }

    async fn on_error(&mut self, error: &LlmError) {
        self.advance(TurnState::Failed);
        debug!(
            room_id = %self.room_id,
            agent_id = %self.agent.id,
            error = %error,
            "agent stream failed"
        );
    }
}

/// Mentioned room members, once each, in mention order.
fn select_targets(members: &[AgentProfile], mentions: &[Uuid]) -> Vec<AgentProfile> {
    let mut seen = HashSet::new();
    mentions
        .iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| members.iter().find(|a| a.id == *id).cloned())
        .collect()
}

fn preview(message: &str) -> String {
    const MAX: usize = 50;
    if message.chars().count() <= MAX {
        message.to_string()
    } else {
        let head: String = message.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::provider::{LlmProvider, LlmStream};
    use crate::llm::registry::ProviderFactory;
    use crate::search::{NoSearch, SearchError, SearchResult};
    use crate::testing::{InMemoryChatRepository, InMemoryContextRepository};
    use chrono::Utc;
    use futures_util::stream;
    use parley_types::config::ContextConfig;
    use parley_types::credential::ProviderCredential;
    use parley_types::event::RoomEvent;
    use parley_types::llm::{FinishReason, GenerationResult, StreamEvent, Usage};
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(String, GenerationRequest)>>>;

    #[derive(Clone)]
    enum Script {
        Reply(Vec<&'static str>),
        FailAfter(Vec<&'static str>),
        Panic,
    }

    struct ScriptedProvider {
        name: String,
        script: Script,
        calls: Calls,
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send_message(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResult, LlmError> {
            let text = match &self.script {
                Script::Reply(chunks) => chunks.concat(),
                _ => return Err(LlmError::vendor(&self.name, 500, "scripted failure")),
            };
            Ok(GenerationResult {
                id: "r".to_string(),
                created_at: Utc::now(),
                model: request.model.clone(),
                message: CanonicalMessage::assistant(text),
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
            })
        }

        fn stream(&self, request: GenerationRequest) -> LlmStream {
            self.calls
                .lock()
                .unwrap()
                .push((self.name.clone(), request));
            let delta = |c: &str| Ok(StreamEvent::Delta(StreamDelta::text(c)));
            match &self.script {
                Script::Reply(chunks) => {
                    let items: Vec<_> = chunks.iter().map(|c| delta(c)).collect();
                    Box::pin(stream::iter(items))
                }
                Script::FailAfter(chunks) => {
                    let mut items: Vec<_> = chunks.iter().map(|c| delta(c)).collect();
                    items.push(Err(LlmError::vendor(&self.name, 503, "upstream overloaded")));
                    Box::pin(stream::iter(items))
                }
                Script::Panic => panic!("scripted panic"),
            }
        }

        async fn validate_credential(&self) -> bool {
            true
        }

        async fn list_models(&self) -> Vec<String> {
            Vec::new()
        }
    }

    struct ScriptedFactory {
        calls: Calls,
    }

    impl ProviderFactory for ScriptedFactory {
        fn create(
            &self,
            provider: &str,
            _credential: ProviderCredential,
        ) -> Result<BoxLlmProvider, LlmError> {
            let script = match provider {
                "anthropic" => Script::FailAfter(vec!["partial"]),
                "deepseek" => Script::Panic,
                _ => Script::Reply(vec!["Hel", "lo"]),
            };
            Ok(BoxLlmProvider::new(ScriptedProvider {
                name: provider.to_string(),
                script,
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    struct StubSearch {
        results: Vec<SearchResult>,
        fail: bool,
    }

    impl SearchProvider for StubSearch {
        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
            if self.fail {
                return Err(SearchError::Request("boom".to_string()));
            }
            Ok(self.results.iter().take(top_k).cloned().collect())
        }
    }

    struct Harness {
        chat: Arc<InMemoryChatRepository>,
        contexts: Arc<InMemoryContextRepository>,
        calls: Calls,
        room: Uuid,
        human: Uuid,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                chat: Arc::default(),
                contexts: Arc::default(),
                calls: Arc::default(),
                room: Uuid::now_v7(),
                human: Uuid::now_v7(),
            }
        }

        fn orchestrator<S: SearchProvider + 'static>(
            &self,
            search: S,
        ) -> ChatOrchestrator<InMemoryChatRepository, InMemoryContextRepository, S> {
            let mut defaults = std::collections::HashMap::new();
            for id in crate::llm::alias::CANONICAL_PROVIDERS {
                defaults.insert(id.to_string(), ProviderCredential::new("env-key"));
            }
            let registry = ProviderRegistry::new(
                Arc::new(ScriptedFactory {
                    calls: Arc::clone(&self.calls),
                }),
                defaults,
            );
            let contexts = ContextManager::new(
                Arc::clone(&self.contexts),
                Arc::clone(&self.chat),
                ContextConfig::default(),
            );
            ChatOrchestrator::new(
                Arc::clone(&self.chat),
                Arc::new(contexts),
                Arc::new(registry),
                Arc::new(search),
                EventBus::new(256),
                ChatConfig::default(),
            )
        }

        async fn agent(&self, name: &str, provider: &str, model: &str) -> AgentProfile {
            let mut agent = AgentProfile::new(name, provider, model);
            agent.system_prompt = Some(format!("You are {name}."));
            self.chat.save_agent(&agent).await.unwrap();
            self.chat.add_room_agent(&self.room, &agent.id).await.unwrap();
            agent
        }

        fn request(&self, text: &str, mentions: &[&AgentProfile]) -> ChatRequest {
            ChatRequest::new(self.room, self.human, text).mentioning(mentions.iter().map(|a| a.id))
        }

        fn last_user_prompt(&self) -> String {
            let calls = self.calls.lock().unwrap();
            let (_, request) = calls.last().expect("no adapter call");
            request.messages.last().unwrap().text()
        }
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<RoomEvent>) -> Vec<AgentReplyEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event.event);
        }
        events
    }

    #[tokio::test]
    async fn zero_mentions_invokes_no_adapter() {
        let h = Harness::new();
        h.agent("Ada", "openai", "gpt-4o-mini").await;
        let orchestrator = h.orchestrator(NoSearch);
        let mut rx = orchestrator.event_bus().subscribe();

        let outcome = orchestrator
            .process_chat(h.request("hello everyone", &[]))
            .await
            .unwrap();

        assert!(outcome.replies.is_empty());
        assert!(outcome.failures.is_empty());
        assert!(h.calls.lock().unwrap().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn failing_agent_does_not_affect_sibling() {
        let h = Harness::new();
        let good = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let bad = h.agent("Claude", "anthropic", "claude-3-5-haiku").await;
        let orchestrator = h.orchestrator(NoSearch);
        let mut rx = orchestrator.event_bus().subscribe();

        let outcome = orchestrator
            .process_chat(h.request("hi both", &[&good, &bad]))
            .await
            .unwrap();

        assert_eq!(outcome.replies.len(), 1);
        assert!(outcome.is_partial_failure());
        let reply = &outcome.replies[0];
        assert_eq!(reply.agent_id, good.id);
        assert_eq!(reply.content, "Hello");
        assert_eq!(h.chat.content_of(&reply.message_id).unwrap(), "Hello");

        match &outcome.failures[0] {
            OrchestratorError::AgentTurn {
                agent_id, cause, room_id, ..
            } => {
                assert_eq!(*agent_id, bad.id);
                assert_eq!(*room_id, h.room);
                assert!(cause.contains("upstream overloaded"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }

        let events = drain(&mut rx);
        let bad_error = events
            .iter()
            .find_map(|e| match e {
                AgentReplyEvent::Error { agent_id, message_id, .. } if *agent_id == bad.id => {
                    Some(*message_id)
                }
                _ => None,
            })
            .expect("error event for failing agent");
        assert_eq!(
            h.chat.content_of(&bad_error).unwrap(),
            ChatConfig::default().fallback_message
        );
        assert!(events.iter().any(
            |e| matches!(e, AgentReplyEvent::Complete { agent_id, content, .. } if *agent_id == good.id && content == "Hello")
        ));
    }

    #[tokio::test]
    async fn events_follow_typing_delta_complete_order() {
        let h = Harness::new();
        let agent = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let orchestrator = h.orchestrator(NoSearch);
        let mut rx = orchestrator.event_bus().subscribe();

        orchestrator
            .process_chat(h.request("hi", &[&agent]))
            .await
            .unwrap();

        let kinds: Vec<&str> = drain(&mut rx)
            .iter()
            .map(|e| match e {
                AgentReplyEvent::TypingStarted { .. } => "typing",
                AgentReplyEvent::Delta { .. } => "delta",
                AgentReplyEvent::Complete { .. } => "complete",
                AgentReplyEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(kinds, vec!["typing", "delta", "delta", "complete"]);
    }

    #[tokio::test]
    async fn panicking_agent_is_isolated() {
        let h = Harness::new();
        let good = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let wild = h.agent("Deep", "deepseek", "deepseek-chat").await;
        let orchestrator = h.orchestrator(NoSearch);

        let outcome = orchestrator
            .process_chat(h.request("hi", &[&wild, &good]))
            .await
            .unwrap();

        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].agent_id, good.id);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].to_string().contains("Deep"));

        let messages = h.chat.messages.lock().unwrap();
        let wild_msg = messages.iter().find(|m| m.sender_id == wild.id).unwrap();
        assert_eq!(wild_msg.content, ChatConfig::default().fallback_message);
    }

    #[tokio::test]
    async fn blank_model_fails_fast_without_calling_vendor() {
        let h = Harness::new();
        let agent = h.agent("Ada", "openai", "  ").await;
        let orchestrator = h.orchestrator(NoSearch);

        let outcome = orchestrator
            .process_chat(h.request("hi", &[&agent]))
            .await
            .unwrap();

        assert!(outcome.replies.is_empty());
        assert!(outcome.failures[0].to_string().contains("no model configured"));
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_provider_surfaces_configuration_error() {
        let h = Harness::new();
        let agent = h.agent("Mia", "mistral", "mistral-large").await;
        let orchestrator = h.orchestrator(NoSearch);

        let outcome = orchestrator
            .process_chat(h.request("hi", &[&agent]))
            .await
            .unwrap();

        let text = outcome.failures[0].to_string();
        assert!(text.contains("unknown provider"));
        assert!(text.contains("mistral"));
    }

    #[tokio::test]
    async fn non_member_mentions_are_ignored() {
        let h = Harness::new();
        let member = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let outsider = AgentProfile::new("Ghost", "openai", "gpt-4o-mini");
        let orchestrator = h.orchestrator(NoSearch);

        let outcome = orchestrator
            .process_chat(h.request("hi", &[&member, &outsider, &member]))
            .await
            .unwrap();

        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(h.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prompt_has_system_history_and_user_turn() {
        let h = Harness::new();
        let agent = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let human = ChatMessageRecord::new(h.room, SenderKind::Human, h.human, "Bob", "what's up?");
        h.chat.create_message(&human).await.unwrap();
        let orchestrator = h.orchestrator(NoSearch);

        orchestrator
            .process_chat(h.request("what's up?", &[&agent]))
            .await
            .unwrap();

        let calls = h.calls.lock().unwrap();
        let (_, request) = &calls[0];
        assert_eq!(request.model, "gpt-4o-mini");
        assert!(request.stream);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[0].text(), "You are Ada.");
        // The stored human message is not duplicated.
        let user_turns = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count();
        assert_eq!(user_turns, 1);
    }

    #[tokio::test]
    async fn deep_think_adds_reasoning_directive() {
        let h = Harness::new();
        let agent = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let orchestrator = h.orchestrator(NoSearch);

        orchestrator
            .process_chat(h.request("prove it", &[&agent]).with_mode(ChatMode::DeepThink))
            .await
            .unwrap();

        let calls = h.calls.lock().unwrap();
        let (_, request) = &calls[0];
        let directive = ChatConfig::default().deep_think_directive;
        assert_eq!(request.messages[1].role, MessageRole::System);
        assert_eq!(request.messages[1].text(), directive);
    }

    #[tokio::test]
    async fn search_results_are_spliced_into_prompt() {
        let h = Harness::new();
        let agent = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let results: Vec<SearchResult> = (1..=3)
            .map(|i| SearchResult {
                title: format!("T{i}"),
                link: format!("https://example.com/{i}"),
                snippet: format!("fact number {i}"),
            })
            .collect();
        let orchestrator = h.orchestrator(StubSearch {
            results: results.clone(),
            fail: false,
        });

        orchestrator
            .process_chat(h.request("latest news?", &[&agent]).with_mode(ChatMode::Search))
            .await
            .unwrap();

        let prompt = h.last_user_prompt();
        for r in &results {
            assert!(prompt.contains(&r.snippet));
        }
        assert!(prompt.contains("latest news?"));
    }

    #[tokio::test]
    async fn search_without_results_leaves_prompt_unmodified() {
        for fail in [false, true] {
            let h = Harness::new();
            let agent = h.agent("Ada", "openai", "gpt-4o-mini").await;
            let orchestrator = h.orchestrator(StubSearch {
                results: Vec::new(),
                fail,
            });

            let outcome = orchestrator
                .process_chat(h.request("latest news?", &[&agent]).with_mode(ChatMode::Search))
                .await
                .unwrap();

            assert_eq!(outcome.replies.len(), 1);
            assert_eq!(h.last_user_prompt(), "latest news?");
        }
    }

    #[tokio::test]
    async fn completed_turn_saves_unaugmented_context() {
        let h = Harness::new();
        let agent = h.agent("Ada", "openai", "gpt-4o-mini").await;
        let orchestrator = h.orchestrator(StubSearch {
            results: vec![SearchResult {
                title: "T".to_string(),
                link: "https://example.com".to_string(),
                snippet: "snippet".to_string(),
            }],
            fail: false,
        });

        orchestrator
            .process_chat(h.request("question", &[&agent]).with_mode(ChatMode::Search))
            .await
            .unwrap();

        let rows = h.contexts.rows.lock().unwrap();
        let stored = rows.get(&(h.room, agent.id)).expect("context saved");
        let messages: Vec<CanonicalMessage> = serde_json::from_str(&stored.messages_json).unwrap();
        let texts: Vec<String> = messages.iter().map(CanonicalMessage::text).collect();
        assert_eq!(texts, vec!["question", "Hello"]);
    }

    #[test]
    fn preview_truncates_long_messages() {
        assert_eq!(preview("short"), "short");
        let long = "a".repeat(80);
        assert_eq!(preview(&long).chars().count(), 53);
    }
}
