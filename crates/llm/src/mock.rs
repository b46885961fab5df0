//! Scripted LLM client for tests and offline runs.
//!
//! Routes are matched by substring against the system prompt, first match
//! wins; unmatched requests fall through to the default behavior. Behaviors
//! can model every failure mode the wrapper handles.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{CompletionRequest, LlmClient, RawCompletion};
use crate::error::{LlmError, Result};

/// What a scripted route does when hit.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Respond with this JSON value.
    Reply(serde_json::Value),
    /// Respond with raw (possibly malformed) text.
    ReplyRaw(String),
    /// Fail with a transport error.
    Transport,
    /// Hang for the given duration, then reply (for timeout tests).
    Hang(Duration, serde_json::Value),
}

struct Route {
    pattern: String,
    behavior: MockBehavior,
}

/// Scripted [`LlmClient`] implementation.
pub struct MockLlm {
    routes: Mutex<Vec<Route>>,
    default: Mutex<Option<MockBehavior>>,
    calls: AtomicU32,
    tokens_per_call: u64,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            default: Mutex::new(None),
            calls: AtomicU32::new(0),
            tokens_per_call: 100,
        }
    }

    /// Add a route: requests whose system prompt contains `pattern` get
    /// `behavior`.
    pub fn route(self, pattern: impl Into<String>, behavior: MockBehavior) -> Self {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.into(),
            behavior,
        });
        self
    }

    /// Behavior for requests no route matches.
    pub fn default_behavior(self, behavior: MockBehavior) -> Self {
        *self.default.lock().unwrap() = Some(behavior);
        self
    }

    /// Total completions served (including failures).
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, request: &CompletionRequest) -> Option<MockBehavior> {
        let routes = self.routes.lock().unwrap();
        routes
            .iter()
            .find(|r| {
                request.system_prompt.contains(&r.pattern)
                    || request.user_payload.contains(&r.pattern)
            })
            .map(|r| r.behavior.clone())
            .or_else(|| self.default.lock().unwrap().clone())
    }

    fn reply(&self, content: String) -> RawCompletion {
        RawCompletion {
            content,
            prompt_tokens: self.tokens_per_call / 2,
            completion_tokens: self.tokens_per_call / 2,
            sources_count: 0,
        }
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior_for(request) {
            Some(MockBehavior::Reply(value)) => Ok(self.reply(value.to_string())),
            Some(MockBehavior::ReplyRaw(text)) => Ok(self.reply(text)),
            Some(MockBehavior::Transport) => {
                Err(LlmError::Transport("scripted transport failure".into()))
            }
            Some(MockBehavior::Hang(duration, value)) => {
                tokio::time::sleep(duration).await;
                Ok(self.reply(value.to_string()))
            }
            None => Err(LlmError::Transport(format!(
                "no mock route for system prompt: {}",
                &request.system_prompt.chars().take(60).collect::<String>()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OutputSchema;
    use serde_json::json;

    fn request(system: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: system.into(),
            user_payload: "payload".into(),
            schema: OutputSchema::new("x", json!({"type": "object"})),
            temperature: 0.7,
            max_tokens: 100,
            web_search: false,
        }
    }

    #[tokio::test]
    async fn test_route_matching() {
        let mock = MockLlm::new()
            .route("discovery", MockBehavior::Reply(json!({"factors": []})))
            .default_behavior(MockBehavior::Transport);

        let hit = mock.complete(&request("You are a discovery analyst")).await;
        assert!(hit.is_ok());

        let miss = mock.complete(&request("You are a validator")).await;
        assert!(miss.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_first_route_wins() {
        let mock = MockLlm::new()
            .route("analyst", MockBehavior::Reply(json!({"which": 1})))
            .route("analyst", MockBehavior::Reply(json!({"which": 2})));
        let out = mock.complete(&request("analyst")).await.unwrap();
        assert!(out.content.contains("\"which\":1"));
    }
}
