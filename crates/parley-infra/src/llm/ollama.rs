//! Ollama provider for locally hosted models.
//!
//! Talks to the native `/api/chat` endpoint. Streaming responses are bare
//! newline-delimited JSON objects with no sentinel; the end of the body is
//! the completion signal. No API key is needed.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use parley_core::llm::provider::{LlmProvider, LlmStream};
use parley_types::credential::ProviderCredential;
use parley_types::llm::{
    CanonicalMessage, FinishReason, GenerationRequest, GenerationResult, LlmError, StreamDelta,
    StreamEvent, Usage,
};

use super::http;

pub const OLLAMA_HOST: &str = "http://localhost:11434";

const PROVIDER: &str = "ollama";
const FALLBACK_MODELS: &[&str] = &["llama3", "qwen2.5"];

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.num_predict.is_none()
            && self.top_p.is_none()
            && self.stop.is_none()
    }
}

impl OllamaChatRequest {
    fn from_canonical(request: &GenerationRequest, stream: bool) -> Self {
        Self {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.to_string(),
                    content: m.text(),
                })
                .collect(),
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_output_tokens,
                top_p: request.top_p,
                stop: request.stop.clone(),
            },
        }
    }
}

/// One response object; the final streamed object has `done = true`.
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChatChunk {
    fn usage(&self) -> Option<Usage> {
        if self.prompt_eval_count.is_none() && self.eval_count.is_none() {
            return None;
        }
        Some(Usage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Parse one NDJSON line into canonical stream items.
fn parse_line(line: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let chunk: OllamaChatChunk = serde_json::from_str(line)
        .map_err(|e| http::invalid_payload(PROVIDER, format!("stream line: {e}")))?;

    if let Some(error) = chunk.error.as_deref().filter(|e| !e.is_empty()) {
        return Err(LlmError::vendor(PROVIDER, 500, error));
    }

    let mut items = Vec::new();
    let content = chunk
        .message
        .as_ref()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let finish_reason = chunk.done.then(|| {
        chunk
            .done_reason
            .as_deref()
            .map(FinishReason::from_vendor)
            .unwrap_or(FinishReason::Stop)
    });
    if !content.is_empty() || finish_reason.is_some() {
        items.push(StreamEvent::Delta(StreamDelta {
            content,
            finish_reason,
        }));
    }
    if chunk.done {
        if let Some(usage) = chunk.usage() {
            items.push(StreamEvent::Usage(usage));
        }
    }
    Ok(items)
}

fn create_ollama_stream(request: RequestBuilder) -> LlmStream {
    Box::pin(async_stream::try_stream! {
        let response = http::send_checked(PROVIDER, request).await?;
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| http::transport_error(PROVIDER, e))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                for item in parse_line(line)? {
                    yield item;
                }
            }
        }

        // A final object without a trailing newline.
        let rest = String::from_utf8_lossy(&buffer);
        let rest = rest.trim();
        if !rest.is_empty() {
            for item in parse_line(rest)? {
                yield item;
            }
        }
    })
}

/// Ollama provider. No credential is required.
pub struct OllamaProvider {
    client: reqwest::Client,
    host: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(credential: ProviderCredential) -> Result<Self, LlmError> {
        let client = http::build_client(credential.timeout)?;
        let host = credential
            .endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .unwrap_or(OLLAMA_HOST)
            .to_string();
        Ok(Self {
            client,
            host,
            max_retries: credential.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    async fn fetch_tags(&self) -> Result<Vec<String>, LlmError> {
        let response = http::send_checked(PROVIDER, self.client.get(self.url("/api/tags"))).await?;
        let tags: TagList = http::read_json(PROVIDER, response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    async fn send_message(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let body = OllamaChatRequest::from_canonical(request, false);
        let url = self.url("/api/chat");
        let response = http::send_with_retries(PROVIDER, self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await?;

        let chunk: OllamaChatChunk = http::read_json(PROVIDER, response).await?;
        if let Some(error) = chunk.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(LlmError::vendor(PROVIDER, 500, error));
        }

        let usage = chunk.usage().unwrap_or_default();
        let created_at = chunk.created_at.unwrap_or_else(Utc::now);
        Ok(GenerationResult {
            id: format!("ollama-{}", created_at.timestamp_millis()),
            created_at,
            model: chunk.model.unwrap_or_else(|| request.model.clone()),
            message: CanonicalMessage::assistant(
                chunk.message.map(|m| m.content).unwrap_or_default(),
            ),
            finish_reason: chunk
                .done_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Stop),
            usage,
        })
    }

    fn stream(&self, request: GenerationRequest) -> LlmStream {
        let body = OllamaChatRequest::from_canonical(&request, true);
        create_ollama_stream(self.client.post(self.url("/api/chat")).json(&body))
    }

    async fn validate_credential(&self) -> bool {
        self.fetch_tags().await.is_ok()
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(models) if !models.is_empty() => models,
            _ => FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}
