//! LLM provider client.
//!
//! The provider is an OpenAI-compatible chat-completions endpoint that
//! supports `response_format: json_schema` for structured output and an
//! optional live-search mode. The trait is the seam everything else depends
//! on; tests swap in [`crate::mock::MockLlm`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::schema::OutputSchema;

/// One structured-output completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_payload: String,
    pub schema: OutputSchema,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Enable the provider's web-search tool for this call.
    pub web_search: bool,
}

/// Raw provider response before schema validation.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Number of web sources consulted (0 when search was off).
    pub sources_count: u32,
}

impl RawCompletion {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider seam: one request in, one raw completion out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion>;
}

// ── Wire format ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct SearchParameters {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_parameters: Option<SearchParameters>,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: WireUsage,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

/// HTTP client for the real provider.
pub struct HttpLlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion> {
        let wire = WireRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: &request.user_payload,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &request.schema.name,
                    schema: &request.schema.schema,
                    strict: true,
                },
            },
            search_parameters: request.web_search.then_some(SearchParameters { mode: "auto" }),
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_secs())
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<WireErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(LlmError::Transport(format!("provider {status}: {detail}")));
        }

        let parsed: WireResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::Transport(format!("unparseable provider response: {e}")))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::Transport("provider returned no content".into()))?;

        Ok(RawCompletion {
            content,
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
            sources_count: parsed.citations.len() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_request_shape() {
        let schema = OutputSchema::new("factors", json!({"type": "object"}));
        let wire = WireRequest {
            model: "grok-beta",
            messages: vec![WireMessage {
                role: "system",
                content: "be brief",
            }],
            temperature: 0.7,
            max_tokens: 4000,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &schema.name,
                    schema: &schema.schema,
                    strict: true,
                },
            },
            search_parameters: None,
        };
        let body = serde_json::to_value(&wire).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        // Search parameters omitted entirely when disabled
        assert!(body.get("search_parameters").is_none());
    }

    #[test]
    fn test_wire_response_parsing() {
        let body = json!({
            "choices": [{"message": {"content": "{\"ok\": true}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 40},
            "citations": ["https://a", "https://b"]
        });
        let parsed: WireResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.usage.prompt_tokens, 120);
        assert_eq!(parsed.citations.len(), 2);
    }

    #[test]
    fn test_wire_response_without_citations() {
        let body = json!({
            "choices": [{"message": {"content": "{}"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        });
        let parsed: WireResponse = serde_json::from_value(body).unwrap();
        assert!(parsed.citations.is_empty());
    }
}
