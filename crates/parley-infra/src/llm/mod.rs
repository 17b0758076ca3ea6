//! LLM provider implementations.
//!
//! Concrete implementations of the [`LlmProvider`] trait defined in
//! `parley-core`, plus [`DefaultProviderFactory`], the factory the
//! provider registry uses to build them.
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod anthropic;
pub mod ernie;
pub mod http;
pub mod ollama;
pub mod openai_compat;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::registry::ProviderFactory;
use parley_types::credential::ProviderCredential;
use parley_types::llm::LlmError;

use self::anthropic::AnthropicProvider;
use self::ernie::ErnieProvider;
use self::ollama::OllamaProvider;
use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::{OPENAI_COMPATIBLE_PROVIDERS, OpenAiCompatConfig};

/// Create a [`BoxLlmProvider`] for a canonical provider id.
///
/// # Errors
///
/// Returns a `Configuration` error for ids no adapter serves, or when the
/// HTTP client cannot be built.
pub fn create_provider(provider: &str, credential: ProviderCredential) -> Result<BoxLlmProvider, LlmError> {
    match provider {
        "anthropic" => Ok(BoxLlmProvider::new(AnthropicProvider::new(credential)?)),
        "ollama" => Ok(BoxLlmProvider::new(OllamaProvider::new(credential)?)),
        "ernie" => Ok(BoxLlmProvider::new(ErnieProvider::new(credential)?)),
        id if OPENAI_COMPATIBLE_PROVIDERS.contains(&id) => {
            let config = OpenAiCompatConfig::from_credential(id, credential)?;
            Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(config)?))
        }
        other => Err(LlmError::configuration(format!("no adapter for provider '{other}'"))),
    }
}

/// [`ProviderFactory`] over the built-in adapters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        provider: &str,
        credential: ProviderCredential,
    ) -> Result<BoxLlmProvider, LlmError> {
        create_provider(provider, credential)
    }
}
