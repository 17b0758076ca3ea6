//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Each `data:` line carries one JSON chunk; the literal `data: [DONE]`
//! terminates the stream. Chunks with an empty choices array may carry
//! usage.

use futures_util::StreamExt;
use reqwest::RequestBuilder;

use parley_core::llm::provider::LlmStream;
use parley_types::llm::{FinishReason, StreamDelta, StreamEvent};

use super::types::ChatCompletionChunk;
use crate::llm::http;

/// Sentinel payload closing an OpenAI event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

pub fn create_openai_stream(provider: String, request: RequestBuilder) -> LlmStream {
    Box::pin(async_stream::try_stream! {
        let response = http::send_checked(&provider, request).await?;
        let mut events = Box::pin(http::sse_events(provider.clone(), response));

        while let Some(event) = events.next().await {
            let event = event?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                break;
            }

            let chunk: ChatCompletionChunk = serde_json::from_str(data)
                .map_err(|e| http::invalid_payload(&provider, format!("stream chunk: {e}")))?;

            if let Some(usage) = chunk.usage {
                yield StreamEvent::Usage(usage.into());
            }

            for choice in chunk.choices {
                let content = choice.delta.content.unwrap_or_default();
                let finish_reason = choice.finish_reason.as_deref().map(FinishReason::from_vendor);
                if content.is_empty() && finish_reason.is_none() {
                    continue;
                }
                yield StreamEvent::Delta(StreamDelta { content, finish_reason });
            }
        }
    })
}
