//! OpenTelemetry GenAI semantic-convention attribute names for CLI spans.
//!
//! Usable as constant field names in tracing macros:
//! `info_span!("chat", { GEN_AI_OPERATION_NAME } = OP_CHAT)`.
//!
//! `parley-core` does not depend on this crate; its per-turn span spells
//! `gen_ai.system` and `gen_ai.request.model` as dotted field literals.

/// The operation being performed (e.g., "chat").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The vendor behind the call (e.g., "anthropic", "ernie").
pub const GEN_AI_SYSTEM: &str = "gen_ai.system";

// --- Operation name values ---

/// One user message fanned out to a room.
pub const OP_CHAT: &str = "chat";

/// Credential check against a vendor.
pub const OP_VALIDATE: &str = "validate_credential";

/// Model catalog lookup.
pub const OP_LIST_MODELS: &str = "list_models";
