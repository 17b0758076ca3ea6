//! Environment variable credential binding.
//!
//! Key resolution per canonical provider id `<P>` (upper-cased):
//! - `<P>_API_KEY`: API key (ERNIE: client id, or packed `id:secret`)
//! - `<P>_SECRET_KEY`: second half of a key pair (ERNIE client secret)
//! - `<P>_BASE_URL`: endpoint override, taking precedence over config
//! - `OPENAI_ORGANIZATION`: OpenAI organization header
//!
//! Timeouts and retry counts come from `[providers.<id>]` in config.

use std::collections::HashMap;
use std::time::Duration;

use parley_core::llm::alias::CANONICAL_PROVIDERS;
use parley_types::config::ProviderSettings;
use parley_types::credential::ProviderCredential;

/// Web search key read by the CLI.
pub const SERPER_API_KEY: &str = "SERPER_API_KEY";

/// Read a variable, treating unset, non-Unicode and blank values as absent.
pub fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        // Non-Unicode values are treated as not found.
        _ => None,
    }
}

/// Default credentials for every canonical provider, from the process
/// environment.
pub fn default_credentials(
    settings: &HashMap<String, ProviderSettings>,
) -> HashMap<String, ProviderCredential> {
    credentials_from(env_var, settings)
}

/// Same as [`default_credentials`] with an injectable lookup.
pub fn credentials_from<F>(
    lookup: F,
    settings: &HashMap<String, ProviderSettings>,
) -> HashMap<String, ProviderCredential>
where
    F: Fn(&str) -> Option<String>,
{
    let mut credentials = HashMap::new();

    for id in CANONICAL_PROVIDERS {
        let prefix = id.to_uppercase();
        let provider_settings = settings.get(*id);

        let mut credential = match lookup(&format!("{prefix}_API_KEY")) {
            Some(key) => ProviderCredential::new(key.trim()),
            None => ProviderCredential::anonymous(),
        };
        if let Some(secret) = lookup(&format!("{prefix}_SECRET_KEY")) {
            credential = credential.with_secret_key(secret.trim());
        }

        let endpoint = lookup(&format!("{prefix}_BASE_URL"))
            .or_else(|| provider_settings.and_then(|s| s.endpoint.clone()));
        if let Some(endpoint) = endpoint {
            credential = credential.with_endpoint(endpoint.trim());
        }

        if *id == "openai" {
            credential.organization = lookup("OPENAI_ORGANIZATION");
        }

        if let Some(settings) = provider_settings {
            if let Some(secs) = settings.timeout_secs {
                credential = credential.with_timeout(Duration::from_secs(secs));
            }
            if let Some(retries) = settings.max_retries {
                credential.max_retries = retries;
            }
        }

        tracing::debug!(
            provider = %id,
            has_key = credential.has_api_key(),
            custom_endpoint = credential.endpoint.is_some(),
            "bound provider credential"
        );
        credentials.insert((*id).to_string(), credential);
    }

    credentials
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_binds_every_canonical_provider() {
        let credentials = credentials_from(lookup_from(&[]), &HashMap::new());
        assert_eq!(credentials.len(), CANONICAL_PROVIDERS.len());
        assert!(credentials.values().all(|c| !c.has_api_key()));
    }

    #[test]
    fn test_reads_key_secret_and_base_url() {
        let credentials = credentials_from(
            lookup_from(&[
                ("DEEPSEEK_API_KEY", " sk-deep "),
                ("DEEPSEEK_BASE_URL", "https://proxy.local"),
                ("ERNIE_API_KEY", "client-id"),
                ("ERNIE_SECRET_KEY", "client-secret"),
                ("OPENAI_ORGANIZATION", "org-1"),
            ]),
            &HashMap::new(),
        );

        let deepseek = &credentials["deepseek"];
        assert_eq!(deepseek.api_key.expose_secret(), "sk-deep");
        assert_eq!(deepseek.endpoint.as_deref(), Some("https://proxy.local"));

        let ernie = &credentials["ernie"];
        assert_eq!(ernie.secret_key.as_ref().unwrap().expose_secret(), "client-secret");

        assert_eq!(credentials["openai"].organization.as_deref(), Some("org-1"));
        assert!(credentials["anthropic"].organization.is_none());
    }

    #[test]
    fn test_config_settings_apply_and_env_endpoint_wins() {
        let mut settings = HashMap::new();
        settings.insert(
            "qwen".to_string(),
            ProviderSettings {
                endpoint: Some("https://config.example/v1".to_string()),
                timeout_secs: Some(30),
                max_retries: Some(2),
            },
        );
        settings.insert(
            "ollama".to_string(),
            ProviderSettings {
                endpoint: Some("http://gpu-box:11434".to_string()),
                timeout_secs: None,
                max_retries: None,
            },
        );

        let credentials = credentials_from(
            lookup_from(&[("QWEN_BASE_URL", "https://env.example/v1")]),
            &settings,
        );

        let qwen = &credentials["qwen"];
        assert_eq!(qwen.endpoint.as_deref(), Some("https://env.example/v1"));
        assert_eq!(qwen.timeout, Duration::from_secs(30));
        assert_eq!(qwen.max_retries, 2);
        assert_eq!(credentials["ollama"].endpoint.as_deref(), Some("http://gpu-box:11434"));
    }
}
