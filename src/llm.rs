//! Blocking client for OpenAI-compatible `/chat/completions` endpoints (Mistral, Groq).

use crate::error::{GatewayError, GatewayResult};
use crate::types::TokenUsage;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: MessageContent,
}

impl RequestMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

/// Response body. Only the fields we use are declared; anything else on the wire is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice, if non-blank.
    pub fn first_text(&self) -> GatewayResult<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|s| !s.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

pub fn parse_completion(body: &str) -> GatewayResult<CompletionResponse> {
    serde_json::from_str(body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

pub struct CompletionClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl CompletionClient {
    /// `base_url` is the API root, e.g. `https://api.groq.com/openai/v1`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn complete(&self, request: &CompletionRequest) -> GatewayResult<CompletionResponse> {
        tracing::debug!(endpoint = %self.endpoint, model = %request.model, "chat completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|e| {
                GatewayError::Network(
                    if e.is_connect() || e.is_timeout() {
                        "Check your internet connection and try again."
                    } else {
                        "Network error."
                    }
                    .to_string(),
                )
            })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), model = %request.model, "chat completion rejected");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: if body.is_empty() {
                    "Invalid API key?".to_string()
                } else {
                    body
                },
            });
        }

        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_request_serializes_as_parts() {
        let request = CompletionRequest {
            model: "pixtral-12b-2409".to_string(),
            messages: vec![RequestMessage::user_parts(vec![
                ContentPart::Text {
                    text: "read this".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: "data:image/png;base64,AAAA".to_string(),
                },
            ])],
            temperature: 0.1,
            max_tokens: 2000,
        };
        let json = serde_json::to_value(&request).unwrap();
        let parts = &json["messages"][0]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"], "data:image/png;base64,AAAA");
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn text_message_serializes_as_string() {
        let json = serde_json::to_value(RequestMessage::system("be brief")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be brief");
    }

    #[test]
    fn parses_completion_and_ignores_unknown_fields() {
        let body = r#"{
            "id": "cmpl-1",
            "object": "chat.completion",
            "model": "llama-3.3-70b-versatile",
            "created": 1700000000,
            "system_fingerprint": "fp_x",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6, "queue_time": 0.1}
        }"#;
        let resp = parse_completion(body).unwrap();
        assert_eq!(resp.first_text().unwrap(), "hi");
        assert_eq!(resp.finish_reason(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, Some(6));
    }

    #[test]
    fn blank_content_is_empty_response() {
        let resp = parse_completion(r#"{"choices": [{"message": {"content": "  "}}]}"#).unwrap();
        assert!(matches!(resp.first_text(), Err(GatewayError::EmptyResponse)));
        let resp = parse_completion(r#"{"choices": []}"#).unwrap();
        assert!(matches!(resp.first_text(), Err(GatewayError::EmptyResponse)));
    }

    #[test]
    fn malformed_body_is_invalid_response() {
        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client =
            CompletionClient::new("https://api.groq.com/openai/v1/", "k", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
    }
}
