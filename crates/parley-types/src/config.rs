//! Global configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `config.toml`. Every field has a
//! default so a missing or partial file is always usable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration.
///
/// Loaded from `~/.parley/config.toml` (or `$PARLEY_DATA_DIR/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    /// Per-provider transport settings keyed by canonical provider id.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

/// Context window limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Estimated-token ceiling before history is truncated.
    #[serde(default = "default_token_budget")]
    pub token_budget: u32,

    /// Messages kept after truncation.
    #[serde(default = "default_recent_message_cap")]
    pub recent_message_cap: usize,

    /// Room messages read when rebuilding a context with no snapshot.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_token_budget() -> u32 {
    4000
}

fn default_recent_message_cap() -> usize {
    20
}

fn default_history_limit() -> usize {
    20
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            recent_message_cap: default_recent_message_cap(),
            history_limit: default_history_limit(),
        }
    }
}

/// Chat orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Content written into an agent's placeholder when its turn fails.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Extra system directive added in deep-think mode.
    #[serde(default = "default_deep_think_directive")]
    pub deep_think_directive: String,

    #[serde(default)]
    pub default_temperature: Option<f32>,

    #[serde(default)]
    pub default_max_output_tokens: Option<u32>,
}

fn default_fallback_message() -> String {
    "Sorry, I couldn't generate a reply just now. Please try again.".to_string()
}

fn default_search_top_k() -> usize {
    3
}

fn default_deep_think_directive() -> String {
    "Think through the problem step by step before answering. \
     Lay out your reasoning, then give a clear final answer."
        .to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fallback_message: default_fallback_message(),
            search_top_k: default_search_top_k(),
            deep_think_directive: default_deep_think_directive(),
            default_temperature: None,
            default_max_output_tokens: None,
        }
    }
}

/// Transport settings for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL overriding the built-in default.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub max_retries: Option<u32>,
}
