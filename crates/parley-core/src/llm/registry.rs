//! Provider registry: name normalization plus adapter resolution.
//!
//! Built once at startup from the environment-bound default credentials and
//! shared via `Arc`. Default adapters are constructed eagerly and reused by
//! every call; a call that carries its own credential override gets a fresh
//! adapter that is dropped when the call finishes.

use std::collections::HashMap;
use std::sync::Arc;

use parley_types::credential::{CredentialOverride, ProviderCredential};
use parley_types::llm::LlmError;

use super::alias::{CANONICAL_PROVIDERS, normalize_provider_name};
use super::box_provider::BoxLlmProvider;

/// Builds adapters for canonical provider ids.
///
/// Implemented in parley-infra; the registry never names a concrete adapter.
pub trait ProviderFactory: Send + Sync {
    /// Build an adapter for `provider` over `credential`.
    ///
    /// Returns a `Configuration` error for provider ids it does not know.
    fn create(
        &self,
        provider: &str,
        credential: ProviderCredential,
    ) -> Result<BoxLlmProvider, LlmError>;
}

struct RegisteredProvider {
    credential: ProviderCredential,
    adapter: Arc<BoxLlmProvider>,
}

/// Resolves free-text provider names to ready adapters.
pub struct ProviderRegistry {
    factory: Arc<dyn ProviderFactory>,
    providers: HashMap<String, RegisteredProvider>,
}

impl ProviderRegistry {
    /// Build default adapters for every canonical provider the factory
    /// supports. Providers without an entry in `defaults` get an anonymous
    /// credential; they still resolve if the adapter needs no key.
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        mut defaults: HashMap<String, ProviderCredential>,
    ) -> Self {
        let mut providers = HashMap::new();

        for id in CANONICAL_PROVIDERS {
            let credential = defaults.remove(*id).unwrap_or_default();
            match factory.create(id, credential.clone()) {
                Ok(adapter) => {
                    providers.insert(
                        (*id).to_string(),
                        RegisteredProvider {
                            credential,
                            adapter: Arc::new(adapter),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(provider = %id, error = %e, "skipping provider");
                }
            }
        }

        tracing::debug!(count = providers.len(), "provider registry built");
        Self { factory, providers }
    }

    /// Canonical ids with a registered default adapter, in display order.
    pub fn provider_ids(&self) -> Vec<&str> {
        CANONICAL_PROVIDERS
            .iter()
            .copied()
            .filter(|id| self.providers.contains_key(*id))
            .collect()
    }

    /// Normalize a free-text provider name. See [`normalize_provider_name`].
    pub fn normalize(&self, input: &str) -> String {
        normalize_provider_name(input)
    }

    /// Whether a default credential with a key was bound for `provider`.
    pub fn has_default_key(&self, provider: &str) -> bool {
        self.providers
            .get(&normalize_provider_name(provider))
            .is_some_and(|p| p.credential.has_api_key())
    }

    /// The shared default adapter, without credential checks.
    ///
    /// Used for model listing, which falls back to a built-in list when the
    /// vendor rejects the call.
    pub fn default_adapter(&self, provider: &str) -> Result<Arc<BoxLlmProvider>, LlmError> {
        let (_, registered) = self.lookup(provider)?;
        Ok(Arc::clone(&registered.adapter))
    }

    /// Resolve an adapter for one call.
    ///
    /// With no override (or a blank one) the shared default adapter is
    /// returned. A non-blank override yields a new adapter over the
    /// override merged onto the default credential; it is never shared.
    pub fn resolve(
        &self,
        provider: &str,
        overrides: Option<&CredentialOverride>,
    ) -> Result<Arc<BoxLlmProvider>, LlmError> {
        let (id, registered) = self.lookup(provider)?;

        match overrides.filter(|o| !o.is_blank()) {
            None => {
                ensure_key(&id, &registered.adapter, &registered.credential)?;
                Ok(Arc::clone(&registered.adapter))
            }
            Some(overrides) => {
                let credential = registered.credential.merged_with(overrides);
                let adapter = self.factory.create(&id, credential.clone())?;
                ensure_key(&id, &adapter, &credential)?;
                tracing::debug!(provider = %id, "built call-scoped adapter");
                Ok(Arc::new(adapter))
            }
        }
    }

    fn lookup(&self, provider: &str) -> Result<(String, &RegisteredProvider), LlmError> {
        let id = normalize_provider_name(provider);
        match self.providers.get(&id) {
            Some(registered) => Ok((id, registered)),
            None => Err(LlmError::configuration(format!(
                "unknown provider '{}' (normalized to '{id}')",
                provider.trim()
            ))),
        }
    }
}

fn ensure_key(
    id: &str,
    adapter: &BoxLlmProvider,
    credential: &ProviderCredential,
) -> Result<(), LlmError> {
    if adapter.requires_api_key() && !credential.has_api_key() {
        return Err(LlmError::configuration(format!(
            "no API key configured for provider '{id}'"
        )));
    }
    Ok(())
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{LlmProvider, LlmStream};
    use crate::llm::alias::PROVIDER_ALIASES;
    use chrono::Utc;
    use futures_util::stream;
    use parley_types::llm::{CanonicalMessage, FinishReason, GenerationRequest, GenerationResult, Usage};
    use secrecy::ExposeSecret;

    /// Echoes its own API key so tests can tell adapters apart.
    struct KeyEchoProvider {
        name: String,
        key: String,
        requires_key: bool,
    }

    impl LlmProvider for KeyEchoProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn requires_api_key(&self) -> bool {
            self.requires_key
        }

        async fn send_message(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResult, LlmError> {
            Ok(GenerationResult {
                id: "echo".to_string(),
                created_at: Utc::now(),
                model: request.model.clone(),
                message: CanonicalMessage::assistant(self.key.clone()),
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
            })
        }

        fn stream(&self, _request: GenerationRequest) -> LlmStream {
            Box::pin(stream::empty())
        }

        async fn validate_credential(&self) -> bool {
            !self.key.is_empty()
        }

        async fn list_models(&self) -> Vec<String> {
            vec!["echo-1".to_string()]
        }
    }

    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn create(
            &self,
            provider: &str,
            credential: ProviderCredential,
        ) -> Result<BoxLlmProvider, LlmError> {
            Ok(BoxLlmProvider::new(KeyEchoProvider {
                name: provider.to_string(),
                key: credential.api_key.expose_secret().to_string(),
                requires_key: provider != "ollama",
            }))
        }
    }

    fn registry() -> ProviderRegistry {
        let mut defaults = HashMap::new();
        for id in CANONICAL_PROVIDERS {
            defaults.insert(id.to_string(), ProviderCredential::new(format!("env-{id}")));
        }
        defaults.insert("moonshot".to_string(), ProviderCredential::anonymous());
        ProviderRegistry::new(Arc::new(EchoFactory), defaults)
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("m", vec![CanonicalMessage::user("hi")])
    }

    #[tokio::test]
    async fn every_alias_resolves_to_a_usable_adapter() {
        let registry = registry();
        for (alias, canonical) in PROVIDER_ALIASES {
            if *canonical == "moonshot" {
                continue;
            }
            let adapter = registry.resolve(alias, None).unwrap();
            assert_eq!(adapter.name(), *canonical);
            assert!(adapter.send_message(&request()).await.is_ok());
        }
    }

    #[test]
    fn default_resolution_is_shared() {
        let registry = registry();
        let a = registry.resolve("OpenAI", None).unwrap();
        let b = registry.resolve("chatgpt", None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let blank = CredentialOverride {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let c = registry.resolve("openai", Some(&blank)).unwrap();
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn override_builds_isolated_adapters() {
        let registry = registry();
        let alice = CredentialOverride::with_api_key("alice-key");
        let bob = CredentialOverride::with_api_key("bob-key");

        let (ra, rb, rd) = tokio::join!(
            async { registry.resolve("deepseek", Some(&alice)).unwrap().send_message(&request()).await },
            async { registry.resolve("deepseek", Some(&bob)).unwrap().send_message(&request()).await },
            async { registry.resolve("deepseek", None).unwrap().send_message(&request()).await },
        );

        assert_eq!(ra.unwrap().content(), "alice-key");
        assert_eq!(rb.unwrap().content(), "bob-key");
        assert_eq!(rd.unwrap().content(), "env-deepseek");
    }

    #[test]
    fn unknown_provider_names_raw_and_normalized() {
        let registry = registry();
        let err = registry.resolve("  Mistral ", None).unwrap_err();
        assert!(err.is_configuration());
        let text = err.to_string();
        assert!(text.contains("Mistral"));
        assert!(text.contains("'mistral'"));
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let registry = registry();
        let err = registry.resolve("kimi", None).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("moonshot"));

        // An override supplies the missing key.
        let ov = CredentialOverride::with_api_key("user-key");
        assert!(registry.resolve("kimi", Some(&ov)).is_ok());
    }

    #[test]
    fn keyless_provider_resolves_without_key() {
        let registry = ProviderRegistry::new(Arc::new(EchoFactory), HashMap::new());
        assert!(registry.resolve("ollama", None).is_ok());
        assert!(registry.resolve("openai", None).is_err());
        assert!(!registry.has_default_key("openai"));
    }

    #[test]
    fn provider_ids_follow_display_order() {
        let registry = registry();
        assert_eq!(registry.provider_ids(), CANONICAL_PROVIDERS.to_vec());
    }
}
