//! Per-vendor defaults and endpoint normalization for OpenAI-compatible
//! providers.

use std::time::Duration;

use secrecy::SecretString;

use parley_types::credential::ProviderCredential;
use parley_types::llm::LlmError;

/// Vendors served by [`super::OpenAiCompatibleProvider`].
pub const OPENAI_COMPATIBLE_PROVIDERS: &[&str] = &["openai", "deepseek", "moonshot", "qwen", "zhipu"];

/// Configuration for one OpenAI-compatible adapter.
///
/// Does not derive `Debug`; `api_key` stays out of formatted output.
pub struct OpenAiCompatConfig {
    /// Canonical provider id (e.g., "deepseek").
    pub provider_name: String,
    /// Normalized base URL ending in a version segment.
    pub base_url: String,
    pub api_key: SecretString,
    pub organization: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl OpenAiCompatConfig {
    /// Build a config for `provider` from a resolved credential, falling back
    /// to the vendor's public endpoint.
    pub fn from_credential(provider: &str, credential: ProviderCredential) -> Result<Self, LlmError> {
        let default = default_base_url(provider).ok_or_else(|| {
            LlmError::configuration(format!("'{provider}' is not an OpenAI-compatible provider"))
        })?;

        let base_url = credential
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(normalize_endpoint)
            .unwrap_or_else(|| default.to_string());

        Ok(Self {
            provider_name: provider.to_string(),
            base_url,
            api_key: credential.api_key,
            organization: credential.organization,
            timeout: credential.timeout,
            max_retries: credential.max_retries,
        })
    }
}

/// Public API base for a vendor.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "moonshot" => Some("https://api.moonshot.cn/v1"),
        "qwen" => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
        "zhipu" => Some("https://open.bigmodel.cn/api/paas/v4"),
        _ => None,
    }
}

/// Models reported when the vendor's `/models` listing is unavailable.
pub fn fallback_models(provider: &str) -> &'static [&'static str] {
    match provider {
        "openai" => &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"],
        "deepseek" => &["deepseek-chat", "deepseek-reasoner"],
        "moonshot" => &["moonshot-v1-8k", "moonshot-v1-32k", "moonshot-v1-128k"],
        "qwen" => &["qwen-max", "qwen-plus", "qwen-turbo"],
        "zhipu" => &["glm-4-plus", "glm-4", "glm-4-flash"],
        _ => &[],
    }
}

const REQUEST_PATH_SUFFIXES: &[&str] = &["/chat/completions", "/completions", "/models"];

/// Normalize a user-supplied base URL.
///
/// Trailing slashes are removed, a pasted request path is stripped back to
/// the base, and `/v1` is appended when the last path segment is not a
/// version (`v4`, `v1beta`).
pub fn normalize_endpoint(raw: &str) -> String {
    let mut url = raw.trim().trim_end_matches('/').to_string();

    for suffix in REQUEST_PATH_SUFFIXES {
        if let Some(stripped) = url.strip_suffix(suffix) {
            url = stripped.trim_end_matches('/').to_string();
            break;
        }
    }

    let last_segment = url.rsplit('/').next().unwrap_or_default();
    if !is_version_segment(last_segment) {
        url.push_str("/v1");
    }
    url
}

fn is_version_segment(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('v') else {
        return false;
    };
    let digits = rest.strip_suffix("beta").unwrap_or(rest);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
