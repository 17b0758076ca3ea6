//! Stream driver: turns an adapter stream into sink callbacks.
//!
//! Adapters only yield deltas; this driver owns the terminal guarantee.
//! Exactly one of `on_complete` or `on_error` is delivered after any number
//! of `on_delta` calls, regardless of how the vendor stream ends.

use std::future::Future;

use futures_util::StreamExt;

use parley_types::llm::{GenerationRequest, LlmError, StreamDelta, StreamEvent, Usage};

use super::box_provider::BoxLlmProvider;
use super::provider::LlmStream;

/// Receiver for one streamed generation.
pub trait StreamSink: Send {
    /// Called once per non-empty fragment, in vendor order.
    fn on_delta(&mut self, delta: &StreamDelta) -> impl Future<Output = ()> + Send;

    /// Called once with the concatenated text when the vendor finishes.
    fn on_complete(&mut self, full_text: &str) -> impl Future<Output = ()> + Send;

    /// Called once if the stream fails at any point.
    fn on_error(&mut self, error: &LlmError) -> impl Future<Output = ()> + Send;
}

/// Final state of a driven stream.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Open a stream on `provider` and drive it into `sink`.
pub async fn stream_message<S: StreamSink>(
    provider: &BoxLlmProvider,
    mut request: GenerationRequest,
    sink: &mut S,
) -> Result<StreamSummary, LlmError> {
    request.stream = true;
    drive_stream(provider.stream(request), sink).await
}

/// Drive an already-open stream into `sink`.
pub async fn drive_stream<S: StreamSink>(
    mut stream: LlmStream,
    sink: &mut S,
) -> Result<StreamSummary, LlmError> {
    let mut summary = StreamSummary::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamEvent::Delta(delta)) => {
                if delta.content.is_empty() {
                    continue;
                }
                summary.content.push_str(&delta.content);
                sink.on_delta(&delta).await;
            }
            Ok(StreamEvent::Usage(usage)) => {
                summary.usage = Some(usage);
            }
            Err(e) => {
                sink.on_error(&e).await;
                return Err(e);
            }
        }
    }

    sink.on_complete(&summary.content).await;
    Ok(summary)
}
