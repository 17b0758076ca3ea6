//! Canonical generation types shared by every vendor adapter.
//!
//! Adapters translate these shapes to and from their vendor wire formats at
//! the boundary; nothing past the adapter sees a vendor payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "tool" => Ok(MessageRole::Tool),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// One element of structured message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

/// Message content: plain text or a non-empty ordered list of parts.
///
/// An empty part list is unrepresentable; both [`MessageContent::parts`] and
/// deserialization reject it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContent", into = "RawContent")]
pub enum MessageContent {
    Text(String),
    Parts(NonEmptyParts),
}

/// A part list holding at least one element.
///
/// The field is private; [`MessageContent::parts`] is the only constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct NonEmptyParts(Vec<ContentPart>);

impl NonEmptyParts {
    pub fn as_slice(&self) -> &[ContentPart] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ContentPart> {
        self.0
    }
}

impl std::ops::Deref for NonEmptyParts {
    type Target = [ContentPart];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a NonEmptyParts {
    type Item = &'a ContentPart;
    type IntoIter = std::slice::Iter<'a, ContentPart>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl TryFrom<RawContent> for MessageContent {
    type Error = String;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        match raw {
            RawContent::Text(text) => Ok(MessageContent::Text(text)),
            RawContent::Parts(parts) => MessageContent::parts(parts)
                .ok_or_else(|| "structured content must contain at least one part".to_string()),
        }
    }
}

impl From<MessageContent> for RawContent {
    fn from(content: MessageContent) -> Self {
        match content {
            MessageContent::Text(text) => RawContent::Text(text),
            MessageContent::Parts(parts) => RawContent::Parts(parts.into_vec()),
        }
    }
}

impl MessageContent {
    /// Structured content, or `None` when `parts` is empty.
    pub fn parts(parts: Vec<ContentPart>) -> Option<Self> {
        if parts.is_empty() {
            None
        } else {
            Some(MessageContent::Parts(NonEmptyParts(parts)))
        }
    }

    /// Flattened text view. Non-text parts contribute nothing; text parts
    /// are joined with newlines.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Number of characters in the flattened text view.
    pub fn char_count(&self) -> usize {
        match self {
            MessageContent::Text(text) => text.chars().count(),
            MessageContent::Parts(_) => self.as_text().chars().count(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// A single message in vendor-neutral form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CanonicalMessage {
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn text(&self) -> String {
        self.content.as_text()
    }
}

/// Request to a vendor for one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<CanonicalMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_output_tokens: None,
            top_p: None,
            stop: None,
            stream: false,
        }
    }

    /// Concatenated text of every system message, if any.
    ///
    /// Used by adapters whose vendors take the system prompt as a top-level
    /// field instead of a message-array entry.
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(CanonicalMessage::text)
            .filter(|t| !t.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Messages other than system messages, in order.
    pub fn conversation(&self) -> impl Iterator<Item = &CanonicalMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
    }
}

/// Why the vendor stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

impl FinishReason {
    /// Map a vendor-specific reason string onto the canonical set.
    ///
    /// Unrecognized reasons are treated as a normal stop.
    pub fn from_vendor(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" | "sensitive" | "refusal" => FinishReason::ContentFilter,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
        }
    }
}

/// Token accounting for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Result of a non-streaming generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    /// Always an assistant-role message.
    pub message: CanonicalMessage,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl GenerationResult {
    pub fn content(&self) -> String {
        self.message.text()
    }
}

/// One incremental fragment of a streamed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: None,
        }
    }
}

/// Items yielded by an adapter's raw stream.
///
/// End of stream is the completion signal; there is no explicit `Done`
/// variant. Errors are carried by the stream's `Result` item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Delta(StreamDelta),
    Usage(Usage),
}

/// Errors from vendor adapter and registry operations.
///
/// Messages never contain credential values or request URLs.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{provider} returned status {status}: {message}")]
    Vendor {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },
}

impl LlmError {
    pub fn configuration(message: impl Into<String>) -> Self {
        LlmError::Configuration(message.into())
    }

    pub fn vendor(provider: &str, status: u16, message: impl Into<String>) -> Self {
        LlmError::Vendor {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn transport(provider: &str, message: impl Into<String>) -> Self {
        LlmError::Transport {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, LlmError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
        ] {
            let parsed: MessageRole = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_text_content_serializes_as_string() {
        let msg = CanonicalMessage::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_parts_content_deserializes() {
        let json = r#"{"role":"user","content":[{"type":"text","text":"a"},{"type":"image_url","url":"http://x/y.png"},{"type":"text","text":"b"}]}"#;
        let msg: CanonicalMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg.content, MessageContent::Parts(ref p) if p.len() == 3));
        assert_eq!(msg.text(), "a\nb");
    }

    #[test]
    fn test_empty_parts_rejected() {
        assert!(MessageContent::parts(Vec::new()).is_none());
        let json = r#"{"role":"user","content":[]}"#;
        assert!(serde_json::from_str::<CanonicalMessage>(json).is_err());
    }

    #[test]
    fn test_parts_survive_serialization() {
        let content = MessageContent::parts(vec![
            ContentPart::Text { text: "look".to_string() },
            ContentPart::ImageUrl { url: "http://x/y.png".to_string() },
        ])
        .unwrap();
        let msg = CanonicalMessage::user(content);

        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"content\":[]"));
        let back: CanonicalMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        match back.content {
            MessageContent::Parts(parts) => {
                assert!(!parts.is_empty());
                assert_eq!(parts.as_slice()[0], ContentPart::Text { text: "look".to_string() });
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn test_char_count_counts_characters_not_bytes() {
        let content = MessageContent::from("你好");
        assert_eq!(content.char_count(), 2);
    }

    #[test]
    fn test_system_text_hoisting() {
        let req = GenerationRequest::new(
            "m",
            vec![
                CanonicalMessage::system("be brief"),
                CanonicalMessage::user("hi"),
                CanonicalMessage::system("be kind"),
            ],
        );
        assert_eq!(req.system_text().as_deref(), Some("be brief\n\nbe kind"));
        assert_eq!(req.conversation().count(), 1);
    }

    #[test]
    fn test_system_text_absent() {
        let req = GenerationRequest::new("m", vec![CanonicalMessage::user("hi")]);
        assert!(req.system_text().is_none());
    }

    #[test]
    fn test_finish_reason_from_vendor() {
        assert_eq!(FinishReason::from_vendor("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_vendor("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_vendor("max_tokens"), FinishReason::Length);
        assert_eq!(FinishReason::from_vendor("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_vendor("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_vendor("whatever"), FinishReason::Stop);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::vendor("deepseek", 401, "invalid api key");
        assert_eq!(
            err.to_string(),
            "deepseek returned status 401: invalid api key"
        );
        let err = LlmError::transport("ollama", "connection refused");
        assert!(err.to_string().contains("ollama"));
        assert!(LlmError::configuration("x").is_configuration());
    }

    #[test]
    fn test_stream_event_serde() {
        let event = StreamEvent::Delta(StreamDelta::text("hi"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"delta\""));
        let parsed: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
