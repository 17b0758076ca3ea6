//! OpenAI-compatible LLM provider implementation.
//!
//! A single [`OpenAiCompatibleProvider`] serves OpenAI, DeepSeek, Moonshot,
//! Qwen (DashScope compatible mode) and Zhipu from one codebase via
//! per-vendor base URLs.

pub mod config;
pub mod streaming;
pub mod types;

use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use secrecy::ExposeSecret;

use parley_core::llm::provider::{LlmProvider, LlmStream};
use parley_types::llm::{
    CanonicalMessage, FinishReason, GenerationRequest, GenerationResult, LlmError, Usage,
};

use self::config::{OpenAiCompatConfig, fallback_models};
use self::streaming::create_openai_stream;
use self::types::{ChatCompletionRequest, ChatCompletionResponse, ModelList};
use super::http;

/// Unified provider for any OpenAI-compatible API.
///
/// Does NOT derive Debug; the API key lives in `config`.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        let client = http::build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.bearer_auth(self.config.api_key.expose_secret());
        match self.config.organization.as_deref() {
            Some(org) if !org.trim().is_empty() => builder.header("OpenAI-Organization", org),
            _ => builder,
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, LlmError> {
        let provider = &self.config.provider_name;
        let request = self.authorized(self.client.get(self.url("/models")));
        let response = http::send_checked(provider, request).await?;
        let list: ModelList = http::read_json(provider, response).await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    async fn send_message(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let provider = self.config.provider_name.as_str();
        let body = ChatCompletionRequest::from_canonical(request, false);
        let url = self.url("/chat/completions");

        let response = http::send_with_retries(provider, self.config.max_retries, || {
            self.authorized(self.client.post(&url)).json(&body)
        })
        .await?;

        let completion: ChatCompletionResponse = http::read_json(provider, response).await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| http::invalid_payload(provider, "response contained no choices"))?;

        Ok(GenerationResult {
            id: completion.id,
            created_at: completion
                .created
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now),
            model: completion.model.unwrap_or_else(|| request.model.clone()),
            message: CanonicalMessage::assistant(choice.message.content.unwrap_or_default()),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Stop),
            usage: completion.usage.map(Usage::from).unwrap_or_default(),
        })
    }

    fn stream(&self, request: GenerationRequest) -> LlmStream {
        let body = ChatCompletionRequest::from_canonical(&request, true);
        let builder = self
            .authorized(self.client.post(self.url("/chat/completions")))
            .json(&body);
        create_openai_stream(self.config.provider_name.clone(), builder)
    }

    async fn validate_credential(&self) -> bool {
        match self.fetch_models().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = %self.config.provider_name, error = %e, "credential check failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => fallback_list(&self.config.provider_name),
            Err(e) => {
                tracing::debug!(provider = %self.config.provider_name, error = %e, "model listing failed, using built-in list");
                fallback_list(&self.config.provider_name)
            }
        }
    }
}

fn fallback_list(provider: &str) -> Vec<String> {
    fallback_models(provider).iter().map(|m| m.to_string()).collect()
}
