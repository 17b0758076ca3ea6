//! LlmProvider trait definition.
//!
//! Every vendor adapter implements this one contract. Uses RPITIT for the
//! request/response methods and `Pin<Box<dyn Stream>>` for `stream`, since
//! streams need to be object-safe for the `BoxLlmProvider` wrapper.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use parley_types::llm::{GenerationRequest, GenerationResult, LlmError, StreamEvent};

/// A raw adapter stream. Ends after the vendor's completion signal.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for vendor adapters (OpenAI-compatible, Anthropic, Ollama, ERNIE).
///
/// Implementations live in parley-infra. Adapters convert vendor payloads
/// to canonical types at the boundary and never log credential values.
pub trait LlmProvider: Send + Sync {
    /// Canonical provider id (e.g., "openai", "ernie").
    fn name(&self) -> &str;

    /// Whether calls fail without an API key. Local runtimes return false.
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Send a request and receive the full result.
    fn send_message(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResult, LlmError>> + Send;

    /// Open a streaming generation.
    ///
    /// The stream yields deltas in vendor order and simply ends when the
    /// vendor signals completion. Use [`super::stream::stream_message`] to
    /// drive it into a [`super::stream::StreamSink`].
    fn stream(&self, request: GenerationRequest) -> LlmStream;

    /// Cheap authenticated call. Any failure is `false`.
    fn validate_credential(&self) -> impl Future<Output = bool> + Send;

    /// Model ids offered by the vendor, or a built-in list on failure.
    fn list_models(&self) -> impl Future<Output = Vec<String>> + Send;
}
