//! Anthropic SSE stream to [`StreamEvent`] adapter.
//!
//! The stream names its events: `message_start`, `content_block_start`,
//! `content_block_delta`, `content_block_stop`, `message_delta`,
//! `message_stop`, `ping` and `error`. Only text deltas, the stop reason,
//! usage and errors matter here; `message_stop` ends the stream.

use futures_util::StreamExt;
use reqwest::RequestBuilder;

use parley_core::llm::provider::LlmStream;
use parley_types::llm::{FinishReason, LlmError, StreamDelta, StreamEvent, Usage};

use super::types::{
    AnthropicDelta, ContentBlockDeltaPayload, ErrorPayload, MessageDeltaPayload,
    MessageStartPayload,
};
use crate::llm::http;

const PROVIDER: &str = "anthropic";

/// What one SSE event contributes to the canonical stream.
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    Emit(Vec<StreamEvent>),
    Skip,
    Stop,
}

/// Interpret one named event. `input_tokens` carries the prompt size from
/// `message_start` until usage is reported in `message_delta`.
pub(crate) fn process_event(
    event_type: &str,
    data: &str,
    input_tokens: &mut u32,
) -> Result<Step, LlmError> {
    let parse_err = |e: serde_json::Error| http::invalid_payload(PROVIDER, format!("{event_type}: {e}"));

    match event_type {
        "message_start" => {
            let payload: MessageStartPayload = serde_json::from_str(data).map_err(parse_err)?;
            *input_tokens = payload.message.usage.input_tokens;
            Ok(Step::Skip)
        }
        "content_block_delta" => {
            let payload: ContentBlockDeltaPayload = serde_json::from_str(data).map_err(parse_err)?;
            match payload.delta {
                AnthropicDelta::TextDelta { text } if !text.is_empty() => {
                    Ok(Step::Emit(vec![StreamEvent::Delta(StreamDelta::text(text))]))
                }
                _ => Ok(Step::Skip),
            }
        }
        "message_delta" => {
            let payload: MessageDeltaPayload = serde_json::from_str(data).map_err(parse_err)?;
            let mut items = Vec::with_capacity(2);
            if let Some(reason) = payload.delta.stop_reason.as_deref() {
                items.push(StreamEvent::Delta(StreamDelta {
                    content: String::new(),
                    finish_reason: Some(FinishReason::from_vendor(reason)),
                }));
            }
            items.push(StreamEvent::Usage(Usage::new(
                *input_tokens,
                payload.usage.output_tokens,
            )));
            Ok(Step::Emit(items))
        }
        "message_stop" => Ok(Step::Stop),
        "error" => {
            let payload: ErrorPayload = serde_json::from_str(data).map_err(parse_err)?;
            Err(LlmError::vendor(
                PROVIDER,
                payload.error.status(),
                payload.error.message,
            ))
        }
        other => {
            tracing::trace!(event_type = %other, "ignoring anthropic event");
            Ok(Step::Skip)
        }
    }
}

pub fn create_anthropic_stream(request: RequestBuilder) -> LlmStream {
    Box::pin(async_stream::try_stream! {
        let response = http::send_checked(PROVIDER, request).await?;
        let mut events = Box::pin(http::sse_events(PROVIDER.to_string(), response));
        let mut input_tokens = 0u32;

        while let Some(event) = events.next().await {
            let event = event?;
            match process_event(&event.event, &event.data, &mut input_tokens)? {
                Step::Emit(items) => {
                    for item in items {
                        yield item;
                    }
                }
                Step::Skip => {}
                Step::Stop => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta_emits() {
        let mut input = 0;
        let step = process_event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            &mut input,
        )
        .unwrap();
        assert_eq!(step, Step::Emit(vec![StreamEvent::Delta(StreamDelta::text("Hi"))]));
    }

    #[test]
    fn test_non_text_delta_skips() {
        let mut input = 0;
        let step = process_event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            &mut input,
        )
        .unwrap();
        assert_eq!(step, Step::Skip);
    }

    #[test]
    fn test_message_start_records_input_tokens() {
        let mut input = 0;
        let step = process_event(
            "message_start",
            r#"{"type":"message_start","message":{"id":"msg_1","model":"claude","usage":{"input_tokens":25,"output_tokens":1}}}"#,
            &mut input,
        )
        .unwrap();
        assert_eq!(step, Step::Skip);
        assert_eq!(input, 25);
    }

    #[test]
    fn test_message_delta_maps_stop_reason() {
        let mut input = 25;
        let step = process_event(
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":15}}"#,
            &mut input,
        )
        .unwrap();
        let Step::Emit(items) = step else {
            panic!("expected emitted events");
        };
        match &items[..] {
            [StreamEvent::Delta(d), StreamEvent::Usage(usage)] => {
                assert!(d.content.is_empty());
                assert_eq!(d.finish_reason, Some(FinishReason::Length));
                assert_eq!(*usage, Usage::new(25, 15));
            }
            other => panic!("unexpected items {other:?}"),
        }
    }

    #[test]
    fn test_message_stop_and_ping() {
        let mut input = 0;
        assert_eq!(process_event("message_stop", "{}", &mut input).unwrap(), Step::Stop);
        assert_eq!(process_event("ping", "{}", &mut input).unwrap(), Step::Skip);
    }

    #[test]
    fn test_error_event_is_vendor_error() {
        let mut input = 0;
        let err = process_event(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            &mut input,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Vendor { status: 529, .. }));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let mut input = 0;
        let err = process_event("content_block_delta", "not json", &mut input).unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }
}
