//! HTTP plumbing shared by every vendor adapter.
//!
//! Centralizes client construction, status checking, vendor error-body
//! parsing and transport-error diagnosis so that each adapter maps failures
//! onto [`LlmError`] the same way. Request URLs never reach error text:
//! ERNIE carries its access token in the query string.

use std::time::Duration;

use eventsource_stream::{Event, Eventsource};
use futures_util::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use parley_types::llm::LlmError;

/// Longest slice of a raw error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Build a reqwest client with the credential's timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::configuration(format!("failed to create HTTP client: {e}")))
}

/// Describe a reqwest failure without leaking the request URL.
pub fn transport_error(provider: &str, err: reqwest::Error) -> LlmError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect to the vendor endpoint (connection refused or DNS failure)".to_string()
    } else if err.is_decode() {
        "could not read the response body".to_string()
    } else {
        format!("request failed: {}", err.without_url())
    };
    LlmError::transport(provider, message)
}

/// Map a non-2xx response body onto a vendor error.
///
/// Recognizes the common JSON error shapes (`{"error": {"message"}}`,
/// `{"error": "..."}`, `{"error_msg"}`, `{"message"}`) and falls back to a
/// truncated raw body, or the status reason when the body is empty.
pub fn vendor_error(provider: &str, status: StatusCode, body: &str) -> LlmError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
        }
    });
    LlmError::vendor(provider, status.as_u16(), message)
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let candidates = [
        value.pointer("/error/message"),
        value.get("error").filter(|v| v.is_string()),
        value.get("error_msg"),
        value.get("message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Payload that arrived with a success status but failed validation.
pub fn invalid_payload(provider: &str, detail: impl std::fmt::Display) -> LlmError {
    LlmError::vendor(
        provider,
        StatusCode::OK.as_u16(),
        format!("malformed response: {detail}"),
    )
}

/// Send the request and turn any non-2xx status into a vendor error.
pub async fn send_checked(provider: &str, request: RequestBuilder) -> Result<Response, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(provider, status = %status, "vendor returned an error response");
    Err(vendor_error(provider, status, &body))
}

/// Like [`send_checked`], retrying up to `max_retries` extra times on
/// transport failures, 429 and 5xx. No backoff.
pub async fn send_with_retries<F>(
    provider: &str,
    max_retries: u32,
    build: F,
) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match send_checked(provider, build()).await {
            Ok(response) => return Ok(response),
            Err(err) if attempt < max_retries && is_retryable(&err) => {
                attempt += 1;
                tracing::debug!(provider, attempt, error = %err, "retrying vendor request");
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_retryable(err: &LlmError) -> bool {
    match err {
        LlmError::Transport { .. } => true,
        LlmError::Vendor { status, .. } => *status == 429 || *status >= 500,
        LlmError::Configuration(_) => false,
    }
}

/// Decode a JSON body, reporting failures as malformed vendor payloads.
pub async fn read_json<T: DeserializeOwned>(provider: &str, response: Response) -> Result<T, LlmError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;
    serde_json::from_slice(&bytes).map_err(|e| invalid_payload(provider, e))
}

/// Server-sent events of a streaming response, with errors mapped to
/// transport errors.
pub fn sse_events(
    provider: String,
    response: Response,
) -> impl Stream<Item = Result<Event, LlmError>> + Send + 'static {
    response.bytes_stream().eventsource().map(move |item| {
        item.map_err(|e| LlmError::transport(&provider, format!("event stream interrupted: {e}")))
    })
}
