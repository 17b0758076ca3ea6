//! ErnieProvider -- [`LlmProvider`] for Baidu Qianfan (ERNIE).
//!
//! Every call first obtains an access token from the adapter's
//! [`TokenCache`], then passes it as the `access_token` query parameter.
//! When Qianfan reports the token as invalid the cache is dropped and the
//! call is retried once with a fresh token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::Response;
use secrecy::ExposeSecret;

use parley_core::llm::provider::{LlmProvider, LlmStream};
use parley_types::credential::ProviderCredential;
use parley_types::llm::{
    CanonicalMessage, FinishReason, GenerationRequest, GenerationResult, LlmError, StreamDelta,
    StreamEvent, Usage,
};

use super::auth::{ClientCredentials, TokenCache};
use super::types::{
    ErnieChatRequest, ErnieChatResponse, MODEL_ENDPOINTS, TOKEN_ERROR_CODES, endpoint_for_model,
};
use crate::llm::http;

pub const DEFAULT_BASE_URL: &str = "https://aip.baidubce.com";

const PROVIDER: &str = "ernie";
const CHAT_PATH: &str = "/rpc/2.0/ai_custom/v1/wenxinworkshop/chat";

/// Map an in-body Qianfan error code onto an HTTP-like status.
fn status_for_code(code: i64) -> u16 {
    match code {
        110 | 111 => 401,
        4 | 17 | 18 | 336501 | 336502 => 429,
        _ => 400,
    }
}

fn body_error(code: i64, message: &str) -> LlmError {
    LlmError::vendor(PROVIDER, status_for_code(code), format!("{message} (code {code})"))
}

fn is_token_error(err: &LlmError) -> bool {
    matches!(err, LlmError::Vendor { status: 401, .. })
}

/// Shared between the adapter and its in-flight streams.
struct ErnieInner {
    client: reqwest::Client,
    chat_base: String,
    tokens: TokenCache,
}

impl ErnieInner {
    fn chat_url(&self, model: &str) -> String {
        format!("{}/{}", self.chat_base, endpoint_for_model(model))
    }

    /// Send one chat request with a cached token.
    async fn post_chat(&self, model: &str, body: &ErnieChatRequest) -> Result<Response, LlmError> {
        let token = self.tokens.access_token().await?;
        let request = self
            .client
            .post(self.chat_url(model))
            .query(&[("access_token", token.expose_secret())])
            .json(body);
        http::send_checked(PROVIDER, request).await
    }

    /// Non-streaming exchange, retried once on a token error.
    async fn complete(&self, model: &str, body: &ErnieChatRequest) -> Result<ErnieChatResponse, LlmError> {
        let mut retried = false;
        loop {
            let response = self.post_chat(model, body).await?;
            let parsed: ErnieChatResponse = http::read_json(PROVIDER, response).await?;
            match parsed.error() {
                None => return Ok(parsed),
                Some((code, _)) if TOKEN_ERROR_CODES.contains(&code) && !retried => {
                    tracing::debug!(provider = PROVIDER, code, "access token rejected, refreshing");
                    self.tokens.invalidate().await;
                    retried = true;
                }
                Some((code, message)) => return Err(body_error(code, message)),
            }
        }
    }

    /// Open a stream. An error object arrives as a plain JSON body instead
    /// of an event stream; token errors are retried once.
    async fn open_stream(&self, model: &str, body: &ErnieChatRequest) -> Result<Response, LlmError> {
        let mut retried = false;
        loop {
            let response = self.post_chat(model, body).await?;
            if !is_json(&response) {
                return Ok(response);
            }
            let parsed: ErnieChatResponse = http::read_json(PROVIDER, response).await?;
            let err = match parsed.error() {
                Some((code, message)) => body_error(code, message),
                None => http::invalid_payload(PROVIDER, "expected an event stream"),
            };
            if is_token_error(&err) && !retried {
                self.tokens.invalidate().await;
                retried = true;
                continue;
            }
            return Err(err);
        }
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Convert one `data:` frame into canonical items. `is_end` closes the stream.
pub(crate) fn process_frame(data: &str) -> Result<(Vec<StreamEvent>, bool), LlmError> {
    let frame: ErnieChatResponse = serde_json::from_str(data)
        .map_err(|e| http::invalid_payload(PROVIDER, format!("stream frame: {e}")))?;
    if let Some((code, message)) = frame.error() {
        return Err(body_error(code, message));
    }

    let mut items = Vec::new();
    let finish_reason = frame.is_end.then(|| {
        frame
            .finish_reason
            .as_deref()
            .map(FinishReason::from_vendor)
            .unwrap_or(FinishReason::Stop)
    });
    if !frame.result.is_empty() || finish_reason.is_some() {
        items.push(StreamEvent::Delta(StreamDelta {
            content: frame.result,
            finish_reason,
        }));
    }
    if frame.is_end {
        if let Some(usage) = frame.usage {
            items.push(StreamEvent::Usage(usage.into()));
        }
    }
    Ok((items, frame.is_end))
}

/// Baidu ERNIE provider.
pub struct ErnieProvider {
    inner: Arc<ErnieInner>,
}

impl ErnieProvider {
    pub fn new(credential: ProviderCredential) -> Result<Self, LlmError> {
        let client = http::build_client(credential.timeout)?;
        let base = credential
            .endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        let credentials = ClientCredentials::new(&credential.api_key, credential.secret_key.as_ref());
        let tokens = TokenCache::new(client.clone(), format!("{base}/oauth/2.0/token"), credentials);

        Ok(Self {
            inner: Arc::new(ErnieInner {
                client,
                chat_base: format!("{base}{CHAT_PATH}"),
                tokens,
            }),
        })
    }
}

impl LlmProvider for ErnieProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send_message(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let body = ErnieChatRequest::from_canonical(request, false);
        let response = self.inner.complete(&request.model, &body).await?;

        Ok(GenerationResult {
            id: response.id,
            created_at: response
                .created
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now),
            model: request.model.clone(),
            message: CanonicalMessage::assistant(response.result),
            finish_reason: response
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Stop),
            usage: response.usage.map(Usage::from).unwrap_or_default(),
        })
    }

    fn stream(&self, request: GenerationRequest) -> LlmStream {
        let inner = Arc::clone(&self.inner);
        let body = ErnieChatRequest::from_canonical(&request, true);
        let model = request.model;

        Box::pin(async_stream::try_stream! {
            let response = inner.open_stream(&model, &body).await?;
            let mut events = Box::pin(http::sse_events(PROVIDER.to_string(), response));

            while let Some(event) = events.next().await {
                let event = event?;
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                let (items, is_end) = process_frame(data)?;
                for item in items {
                    yield item;
                }
                if is_end {
                    break;
                }
            }
        })
    }

    /// A successful token exchange proves the key pair.
    async fn validate_credential(&self) -> bool {
        match self.inner.tokens.access_token().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = PROVIDER, error = %e, "credential check failed");
                false
            }
        }
    }

    /// Qianfan has no listing endpoint; the known model table is returned.
    async fn list_models(&self) -> Vec<String> {
        MODEL_ENDPOINTS.iter().map(|(id, _)| id.to_string()).collect()
    }
}
