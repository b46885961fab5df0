//! Retry driver turning raw completions into schema-valid typed outputs.
//!
//! Transport errors retry with exponential backoff plus jitter; schema
//! violations retry with the validation error appended so the model can
//! correct itself. Token usage accumulates across every attempt and is
//! surfaced in the final result either way.

use rand::Rng;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::client::{CompletionRequest, LlmClient};
use crate::error::{LlmError, Result};
use crate::schema::normalize;

/// Knobs for a structured call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub max_retries: u32,
    /// Base delay for exponential backoff (`base * 2^attempt` + jitter).
    pub backoff_base: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// A schema-valid output together with its aggregate usage.
#[derive(Debug, Clone)]
pub struct StructuredOutput<T> {
    pub value: T,
    /// Raw JSON as validated (for the agent log's output blob).
    pub raw: serde_json::Value,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub sources_count: u32,
}

impl<T> StructuredOutput<T> {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Drive a completion request to a schema-valid typed output.
pub async fn call_structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: &CompletionRequest,
    options: &CallOptions,
) -> Result<StructuredOutput<T>> {
    let mut prompt_tokens = 0u64;
    let mut completion_tokens = 0u64;
    let mut sources_count = 0u32;
    let mut payload = request.user_payload.clone();
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..=request_attempts(options) {
        if attempt > 0 {
            backoff(options, attempt).await;
        }

        let attempt_request = CompletionRequest {
            user_payload: payload.clone(),
            ..request.clone()
        };

        let raw = match client.complete(&attempt_request).await {
            Ok(raw) => raw,
            Err(e) if e.is_transient() => {
                tracing::warn!(attempt, error = %e, "transient llm failure, retrying");
                last_error = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        };

        prompt_tokens += raw.prompt_tokens;
        completion_tokens += raw.completion_tokens;
        sources_count = sources_count.max(raw.sources_count);

        match validate::<T>(&raw.content, request) {
            Ok((value, raw_json)) => {
                return Ok(StructuredOutput {
                    value,
                    raw: raw_json,
                    prompt_tokens,
                    completion_tokens,
                    sources_count,
                });
            }
            Err(violation) => {
                tracing::warn!(attempt, %violation, "schema violation, re-prompting");
                // Re-prompt with the validation error appended.
                payload = format!(
                    "{}\n\nYour previous response was invalid: {}. \
                     Respond again with JSON that conforms exactly to the schema.",
                    request.user_payload, violation
                );
                last_error = Some(LlmError::SchemaViolation(violation));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Transport("no attempts were made".into())))
}

fn request_attempts(options: &CallOptions) -> u32 {
    options.max_retries
}

async fn backoff(options: &CallOptions, attempt: u32) {
    let base = options.backoff_base.as_millis() as u64;
    let exp = base.saturating_mul(1u64 << (attempt - 1).min(10));
    let jitter = rand::thread_rng().gen_range(0..=base);
    tokio::time::sleep(Duration::from_millis(exp + jitter)).await;
}

fn validate<T: DeserializeOwned>(
    content: &str,
    request: &CompletionRequest,
) -> std::result::Result<(T, serde_json::Value), String> {
    let mut value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("output is not valid JSON: {e}"))?;
    normalize(&mut value, &request.schema.schema)?;
    let typed: T = serde_json::from_value(value.clone())
        .map_err(|e| format!("output does not match schema {}: {e}", request.schema.name))?;
    Ok((typed, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawCompletion;
    use crate::schema::OutputSchema;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Verdict {
        prediction_probability: f64,
        confidence: f64,
    }

    /// Client scripted with a fixed sequence of outcomes.
    struct SequenceClient {
        outcomes: Mutex<Vec<std::result::Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl SequenceClient {
        fn new(outcomes: Vec<std::result::Result<String, LlmError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for SequenceClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<RawCompletion> {
            *self.calls.lock() += 1;
            let mut outcomes = self.outcomes.lock();
            match outcomes.remove(0) {
                Ok(content) => Ok(RawCompletion {
                    content,
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    sources_count: 0,
                }),
                Err(e) => Err(e),
            }
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "forecast".into(),
            user_payload: "question".into(),
            schema: OutputSchema::new(
                "verdict",
                json!({
                    "type": "object",
                    "properties": {
                        "prediction_probability": {"type": "number"},
                        "confidence": {"type": "number"}
                    },
                    "required": ["prediction_probability", "confidence"]
                }),
            ),
            temperature: 0.7,
            max_tokens: 1000,
            web_search: false,
        }
    }

    fn fast_options() -> CallOptions {
        CallOptions {
            max_retries: 3,
            backoff_base: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_valid_first_attempt() {
        let client = SequenceClient::new(vec![Ok(
            r#"{"prediction_probability": 0.62, "confidence": 0.7}"#.into(),
        )]);
        let out = call_structured::<Verdict>(&client, &request(), &fast_options())
            .await
            .unwrap();
        assert_eq!(out.value.prediction_probability, 0.62);
        assert_eq!(out.total_tokens(), 15);
        assert_eq!(*client.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_transport_retry_then_success() {
        let client = SequenceClient::new(vec![
            Err(LlmError::Transport("429".into())),
            Ok(r#"{"prediction_probability": 0.5, "confidence": 0.5}"#.into()),
        ]);
        let out = call_structured::<Verdict>(&client, &request(), &fast_options())
            .await
            .unwrap();
        assert_eq!(out.value.confidence, 0.5);
        assert_eq!(*client.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_schema_violation_reprompts_and_aggregates_tokens() {
        let client = SequenceClient::new(vec![
            Ok(r#"{"prediction_probability": 0.5}"#.into()), // missing confidence
            Ok(r#"{"prediction_probability": 0.5, "confidence": "0.8"}"#.into()),
        ]);
        let out = call_structured::<Verdict>(&client, &request(), &fast_options())
            .await
            .unwrap();
        // Numeric string coerced on the second attempt.
        assert_eq!(out.value.confidence, 0.8);
        // Tokens from both attempts counted.
        assert_eq!(out.total_tokens(), 30);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_schema_violation() {
        let bad = r#"{"prediction_probability": 0.5}"#;
        let client = SequenceClient::new(vec![
            Ok(bad.into()),
            Ok(bad.into()),
            Ok(bad.into()),
            Ok(bad.into()),
        ]);
        let err = call_structured::<Verdict>(&client, &request(), &fast_options())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_probability_clamped_in_pipeline() {
        let client = SequenceClient::new(vec![Ok(
            r#"{"prediction_probability": 1.7, "confidence": 0.9}"#.into(),
        )]);
        let out = call_structured::<Verdict>(&client, &request(), &fast_options())
            .await
            .unwrap();
        assert_eq!(out.value.prediction_probability, 1.0);
    }
}
