//! Gemini `generateContent` backend for [`CompletionService`].
//!
//! Retries on 429 and 5xx with exponential backoff; any other non-success
//! status is returned immediately. The request carries a bounded timeout;
//! a timeout is indistinguishable from any other failure to callers, which
//! is exactly what the fallback policy wants.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatTurn, CompletionError, CompletionService};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// Gemini-backed completion client. One instance is shared process-wide via
/// `AppState`; constructing it is cheap but the connection pool is not.
pub struct GeminiCompletion {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiCompletion {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for GeminiCompletion {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, CompletionError> {
        let request_body = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part::text(system)],
            },
            contents: build_contents(turns),
        };

        let url = format!(
            "{GEMINI_API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let mut last_error: Option<CompletionError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Completion call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self.client.post(&url).json(&request_body).send().await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(CompletionError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Completion API returned {}: {}", status, body);
                last_error = Some(CompletionError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<GeminiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(CompletionError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: GenerateResponse = response.json().await?;
            let text = extract_text(&parsed);

            if text.is_empty() {
                return Err(CompletionError::EmptyContent);
            }

            debug!("Completion call succeeded ({} chars)", text.len());
            return Ok(text);
        }

        Err(last_error.unwrap_or(CompletionError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Maps chat turns onto Gemini `contents`. System turns are excluded (they
/// belong in `systemInstruction`), assistant text and tool calls become
/// `model` entries, and tool results go back as `user` functionResponse
/// parts, matching the API's expected call/response pairing.
fn build_contents(turns: &[ChatTurn]) -> Vec<Content> {
    turns
        .iter()
        .filter_map(|turn| match turn {
            ChatTurn::System { .. } => None,
            ChatTurn::User { content } => Some(Content {
                role: "user".to_string(),
                parts: vec![Part::text(content)],
            }),
            ChatTurn::Assistant { content } => Some(Content {
                role: "model".to_string(),
                parts: vec![Part::text(content)],
            }),
            ChatTurn::ToolCall { name, args } => Some(Content {
                role: "model".to_string(),
                parts: vec![Part {
                    function_call: Some(FunctionCall {
                        name: name.clone(),
                        args: args.clone(),
                    }),
                    ..Default::default()
                }],
            }),
            ChatTurn::ToolResult { name, content } => Some(Content {
                role: "user".to_string(),
                parts: vec![Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: serde_json::json!({ "result": content }),
                    }),
                    ..Default::default()
                }],
            }),
        })
        .collect()
}

fn extract_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_contents_skips_system_turns() {
        let turns = vec![
            ChatTurn::System {
                content: "persona".to_string(),
            },
            ChatTurn::user("hello"),
        ];
        let contents = build_contents(&turns);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
    }

    #[test]
    fn test_build_contents_maps_assistant_to_model_role() {
        let contents = build_contents(&[ChatTurn::assistant("reply")]);
        assert_eq!(contents[0].role, "model");
        assert_eq!(contents[0].parts[0].text.as_deref(), Some("reply"));
    }

    #[test]
    fn test_build_contents_maps_tool_turns() {
        let turns = vec![
            ChatTurn::ToolCall {
                name: "generate_and_save".to_string(),
                args: serde_json::json!({"topic": "sql"}),
            },
            ChatTurn::ToolResult {
                name: "generate_and_save".to_string(),
                content: "done".to_string(),
            },
        ];
        let contents = build_contents(&turns);

        assert_eq!(contents[0].role, "model");
        assert_eq!(
            contents[0].parts[0].function_call.as_ref().unwrap().name,
            "generate_and_save"
        );
        assert_eq!(contents[1].role, "user");
        assert_eq!(
            contents[1].parts[0]
                .function_response
                .as_ref()
                .unwrap()
                .response["result"],
            "done"
        );
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let response = GenerateResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: "model".to_string(),
                    parts: vec![Part::text("Hello, "), Part::text("world")],
                }),
            }],
        };
        assert_eq!(extract_text(&response), "Hello, world");
    }

    #[test]
    fn test_extract_text_empty_when_no_candidates() {
        let response = GenerateResponse { candidates: vec![] };
        assert_eq!(extract_text(&response), "");
    }
}
