//! Completion service: the single seam through which the rest of the
//! service talks to an LLM backend.
//!
//! ARCHITECTURAL RULE: no other module may call a model API directly. The
//! selector, conversation driver, evaluation engine, and question generator
//! all receive an `Arc<dyn CompletionService>` and treat any error from it as
//! the trigger for their own deterministic fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod gemini;

/// One turn of a conversation, as a closed union rather than a role string
/// plus loose fields. The `role` tag is also the wire representation used for
/// the rolling conversation log stored on sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatTurn {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    ToolCall { name: String, args: Value },
    ToolResult { name: String, content: String },
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn::Assistant {
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Model returned empty content")]
    EmptyContent,
}

/// Stateless text-completion capability: a system prompt plus ordered turns
/// in, generated text out. Timeouts are the implementation's concern and
/// surface as ordinary errors; callers never distinguish them.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, CompletionError>;
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n[{\"question\": \"q\"}]\n```";
        assert_eq!(strip_json_fences(input), "[{\"question\": \"q\"}]");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_chat_turn_serializes_with_role_tag() {
        let turn = ChatTurn::user("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn test_chat_turn_round_trip_all_variants() {
        let turns = vec![
            ChatTurn::System {
                content: "be brief".to_string(),
            },
            ChatTurn::user("hi"),
            ChatTurn::assistant("hello"),
            ChatTurn::ToolCall {
                name: "generate_and_save".to_string(),
                args: serde_json::json!({"topic": "sql", "mcq_count": 3}),
            },
            ChatTurn::ToolResult {
                name: "generate_and_save".to_string(),
                content: "saved 3 questions".to_string(),
            },
        ];

        let json = serde_json::to_string(&turns).unwrap();
        let recovered: Vec<ChatTurn> = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered.len(), 5);
        assert!(matches!(recovered[3], ChatTurn::ToolCall { .. }));
        assert!(matches!(recovered[4], ChatTurn::ToolResult { .. }));
    }
}
