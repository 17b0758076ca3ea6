//! AnthropicProvider -- concrete [`LlmProvider`] implementation for Anthropic Claude.
//!
//! Sends requests to the Messages API (`/v1/messages`) with the
//! `x-api-key` and `anthropic-version` headers. The API key is wrapped in
//! [`SecretString`] and is only exposed when building request headers.

use chrono::Utc;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::provider::{LlmProvider, LlmStream};
use parley_types::credential::ProviderCredential;
use parley_types::llm::{
    CanonicalMessage, FinishReason, GenerationRequest, GenerationResult, LlmError, Usage,
};

use super::streaming::create_anthropic_stream;
use super::types::{AnthropicContentBlock, AnthropicRequest, AnthropicResponse, ModelList};
use crate::llm::http;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const FALLBACK_MODELS: &[&str] = &[
    "claude-3-5-sonnet-latest",
    "claude-3-5-haiku-latest",
    "claude-3-opus-latest",
];

/// Anthropic Claude LLM provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    max_retries: u32,
}

impl AnthropicProvider {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(credential: ProviderCredential) -> Result<Self, LlmError> {
        let client = http::build_client(credential.timeout)?;
        let base_url = credential
            .endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(Self {
            client,
            api_key: credential.api_key,
            base_url,
            max_retries: credential.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
    }

    async fn fetch_models(&self) -> Result<Vec<String>, LlmError> {
        let request = self.authorized(self.client.get(self.url("/v1/models")));
        let response = http::send_checked(self.name(), request).await?;
        let list: ModelList = http::read_json(self.name(), response).await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

// AnthropicProvider intentionally does NOT derive Debug.

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send_message(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let body = AnthropicRequest::from_canonical(request, false);
        let url = self.url("/v1/messages");

        let response = http::send_with_retries(self.name(), self.max_retries, || {
            self.authorized(self.client.post(&url)).json(&body)
        })
        .await?;

        let message: AnthropicResponse = http::read_json(self.name(), response).await?;

        let content: String = message
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect();

        Ok(GenerationResult {
            id: message.id,
            created_at: Utc::now(),
            model: message.model,
            message: CanonicalMessage::assistant(content),
            finish_reason: message
                .stop_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Stop),
            usage: Usage::new(message.usage.input_tokens, message.usage.output_tokens),
        })
    }

    fn stream(&self, request: GenerationRequest) -> LlmStream {
        let body = AnthropicRequest::from_canonical(&request, true);
        let builder = self
            .authorized(self.client.post(self.url("/v1/messages")))
            .json(&body);
        create_anthropic_stream(builder)
    }

    async fn validate_credential(&self) -> bool {
        match self.fetch_models().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = "anthropic", error = %e, "credential check failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => models,
            _ => FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}
