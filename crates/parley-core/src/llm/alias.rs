//! Provider name normalization.
//!
//! Users type provider names freely ("OpenAI", "通义千问", "Kimi"). The
//! static tables here map those onto canonical provider ids; the lookup is a
//! pure function so it can be tested without any adapters.

/// Canonical provider ids, in display order.
pub const CANONICAL_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "deepseek",
    "moonshot",
    "qwen",
    "zhipu",
    "ernie",
    "ollama",
];

/// Ordered `(alias, canonical)` pairs. The first alias contained in the
/// input wins, so longer or more specific aliases come before shorter ones
/// that they contain. Each canonical id is also listed as its own alias so
/// qualified names like "Moonshot AI" resolve.
pub const PROVIDER_ALIASES: &[(&str, &str)] = &[
    ("openai", "openai"),
    ("chatgpt", "openai"),
    ("open ai", "openai"),
    ("gpt", "openai"),
    ("anthropic", "anthropic"),
    ("claude", "anthropic"),
    ("deepseek", "deepseek"),
    ("深度求索", "deepseek"),
    ("deep seek", "deepseek"),
    ("moonshot", "moonshot"),
    ("月之暗面", "moonshot"),
    ("kimi", "moonshot"),
    ("qwen", "qwen"),
    ("通义千问", "qwen"),
    ("通义", "qwen"),
    ("千问", "qwen"),
    ("tongyi", "qwen"),
    ("dashscope", "qwen"),
    ("zhipu", "zhipu"),
    ("智谱清言", "zhipu"),
    ("智谱", "zhipu"),
    ("chatglm", "zhipu"),
    ("bigmodel", "zhipu"),
    ("glm", "zhipu"),
    ("ernie", "ernie"),
    ("文心一言", "ernie"),
    ("文心", "ernie"),
    ("wenxin", "ernie"),
    ("qianfan", "ernie"),
    ("千帆", "ernie"),
    ("百度", "ernie"),
    ("baidu", "ernie"),
    ("ollama", "ollama"),
    ("llama", "ollama"),
];

/// Normalize a free-text provider name to a canonical id.
///
/// Trims and lowercases, then tries an exact canonical match, then the first
/// alias contained in the input. Anything else is returned lowercased and
/// unchanged so that a later registry lookup fails with a clear error.
pub fn normalize_provider_name(input: &str) -> String {
    let lowered = input.trim().to_lowercase();

    if let Some(canonical) = CANONICAL_PROVIDERS.iter().find(|c| **c == lowered) {
        return (*canonical).to_string();
    }

    PROVIDER_ALIASES
        .iter()
        .find(|(alias, _)| lowered.contains(alias))
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lowered)
}

/// Whether `id` is one of the canonical provider ids.
pub fn is_canonical(id: &str) -> bool {
    CANONICAL_PROVIDERS.contains(&id)
}
