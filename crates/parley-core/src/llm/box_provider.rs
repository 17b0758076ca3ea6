//! BoxLlmProvider -- object-safe dynamic dispatch wrapper for LlmProvider.
//!
//! 1. An object-safe `LlmProviderDyn` trait with boxed futures
//! 2. Blanket-impl `LlmProviderDyn` for all `T: LlmProvider`
//! 3. `BoxLlmProvider` wraps `Box<dyn LlmProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use parley_types::llm::{GenerationRequest, GenerationResult, LlmError};

use super::provider::{LlmProvider, LlmStream};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn requires_api_key(&self) -> bool;

    fn send_message_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<GenerationResult, LlmError>>;

    fn stream_boxed(&self, request: GenerationRequest) -> LlmStream;

    fn validate_credential_boxed(&self) -> BoxFuture<'_, bool>;

    fn list_models_boxed(&self) -> BoxFuture<'_, Vec<String>>;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn requires_api_key(&self) -> bool {
        LlmProvider::requires_api_key(self)
    }

    fn send_message_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<GenerationResult, LlmError>> {
        Box::pin(self.send_message(request))
    }

    fn stream_boxed(&self, request: GenerationRequest) -> LlmStream {
        self.stream(request)
    }

    fn validate_credential_boxed(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.validate_credential())
    }

    fn list_models_boxed(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(self.list_models())
    }
}

/// Type-erased adapter for runtime provider selection.
///
/// `LlmProvider` uses RPITIT and cannot be a trait object directly, so the
/// registry hands these out instead.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn requires_api_key(&self) -> bool {
        self.inner.requires_api_key()
    }

    pub async fn send_message(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, LlmError> {
        self.inner.send_message_boxed(request).await
    }

    pub fn stream(&self, request: GenerationRequest) -> LlmStream {
        self.inner.stream_boxed(request)
    }

    pub async fn validate_credential(&self) -> bool {
        self.inner.validate_credential_boxed().await
    }

    pub async fn list_models(&self) -> Vec<String> {
        self.inner.list_models_boxed().await
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .finish()
    }
}
