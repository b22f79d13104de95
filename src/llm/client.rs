//! Completion client.
//!
//! One outbound HTTP call per invocation, no retry logic. Transport
//! failures and non-success statuses surface as typed errors for the
//! invoker above to classify.

use crate::config::LlmConfig;
use crate::error::{truncate_str, LlmError, BODY_PREVIEW_CHARS};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Seam over the remote completion endpoint. Implemented by [`ChatClient`]
/// for real traffic and by stubs in tests.
pub trait Completion {
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>>;
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

impl Completion for ChatClient {
    /// Send one prompt as a single user message and return the first
    /// choice's content, trimmed.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .http
            .post(self.config.endpoint())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Protocol {
                status: status.as_u16(),
                body: truncate_str(&text, BODY_PREVIEW_CHARS).to_string(),
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|_| LlmError::Protocol {
                status: status.as_u16(),
                body: truncate_str(&text, BODY_PREVIEW_CHARS).to_string(),
            })?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(LlmError::EmptyChoices)?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest {
            model: "deepseek-chat",
            max_tokens: 2048,
            temperature: 0.0,
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_chat_response_parses_first_choice() {
        let body = r##"{"choices":[{"message":{"content":"# Reasoning:\n1. x\n# Answer:\nSecure"}}]}"##;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.contains("# Answer:"));
    }

    #[test]
    fn test_chat_response_tolerates_extra_fields() {
        let body = r#"{"id":"x","choices":[{"message":{"content":"ok"},"finish_reason":"stop"}],"usage":{"total_tokens":10}}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "ok");
    }
}
