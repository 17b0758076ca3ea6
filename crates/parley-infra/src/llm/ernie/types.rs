//! Qianfan (ERNIE) chat wire types.

use serde::{Deserialize, Serialize};

use parley_types::llm::{CanonicalMessage, GenerationRequest, MessageRole, Usage};

/// Error codes meaning the access token is invalid or expired.
pub const TOKEN_ERROR_CODES: &[i64] = &[110, 111];

#[derive(Debug, Serialize)]
pub struct ErnieChatRequest {
    pub messages: Vec<ErnieMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl ErnieChatRequest {
    /// System messages are hoisted into the top-level `system` field.
    pub fn from_canonical(request: &GenerationRequest, stream: bool) -> Self {
        Self {
            messages: request.conversation().map(ErnieMessage::from).collect(),
            system: request.system_text(),
            stream,
            // Qianfan rejects a temperature of exactly zero.
            temperature: request.temperature.map(|t| t.clamp(0.01, 1.0)),
            top_p: request.top_p,
            max_output_tokens: request.max_output_tokens,
            stop: request.stop.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErnieMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<&CanonicalMessage> for ErnieMessage {
    fn from(message: &CanonicalMessage) -> Self {
        let role = match message.role {
            MessageRole::Assistant => "assistant",
            _ => "user",
        };
        Self {
            role,
            content: message.text(),
        }
    }
}

/// Response body, also the payload of each streamed `data:` frame.
///
/// Failures arrive as `{error_code, error_msg}` with HTTP 200.
#[derive(Debug, Deserialize)]
pub struct ErnieChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub is_end: bool,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<ErnieUsage>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl ErnieChatResponse {
    /// The in-body error, if any.
    pub fn error(&self) -> Option<(i64, &str)> {
        self.error_code
            .filter(|code| *code != 0)
            .map(|code| (code, self.error_msg.as_deref().unwrap_or("unknown error")))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ErnieUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl From<ErnieUsage> for Usage {
    fn from(usage: ErnieUsage) -> Self {
        Usage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

/// Qianfan endpoint path segment for a model id.
///
/// Unknown ids are used verbatim, which covers custom deployments.
pub fn endpoint_for_model(model: &str) -> String {
    let lowered = model.trim().to_lowercase();
    MODEL_ENDPOINTS
        .iter()
        .find(|(id, _)| *id == lowered)
        .map(|(_, endpoint)| endpoint.to_string())
        .unwrap_or(lowered)
}

/// Known model ids and their endpoint segments, in display order.
pub const MODEL_ENDPOINTS: &[(&str, &str)] = &[
    ("ernie-4.0-8k", "completions_pro"),
    ("ernie-4.0-turbo-8k", "ernie-4.0-turbo-8k"),
    ("ernie-3.5-8k", "completions"),
    ("ernie-speed-8k", "ernie_speed"),
    ("ernie-lite-8k", "ernie-lite-8k"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_endpoint_mapping() {
        assert_eq!(endpoint_for_model("ERNIE-4.0-8K"), "completions_pro");
        assert_eq!(endpoint_for_model("ernie-3.5-8k"), "completions");
        assert_eq!(endpoint_for_model("my-custom-deploy"), "my-custom-deploy");
    }

    #[test]
    fn test_request_hoists_system_and_clamps_temperature() {
        let mut request = GenerationRequest::new(
            "ernie-4.0-8k",
            vec![CanonicalMessage::system("你是助手"), CanonicalMessage::user("你好")],
        );
        request.temperature = Some(0.0);
        let body = ErnieChatRequest::from_canonical(&request, true);
        assert_eq!(body.system.as_deref(), Some("你是助手"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.temperature, Some(0.01));
    }

    #[test]
    fn test_in_body_error() {
        let response: ErnieChatResponse =
            serde_json::from_str(r#"{"error_code":110,"error_msg":"Access token invalid or no longer valid"}"#)
                .unwrap();
        assert_eq!(
            response.error(),
            Some((110, "Access token invalid or no longer valid"))
        );
    }

    #[test]
    fn test_frame_parses() {
        let frame: ErnieChatResponse = serde_json::from_str(
            r#"{"id":"as-1","object":"chat.completion","created":1700000000,"sentence_id":0,"is_end":false,"result":"你好","usage":{"prompt_tokens":2,"completion_tokens":1,"total_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(frame.result, "你好");
        assert!(!frame.is_end);
        assert!(frame.error().is_none());
    }
}
