//! Failure taxonomy for LLM calls.

/// Errors surfaced by the structured wrapper after retries are exhausted.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Network failure or provider 5xx/429.
    #[error("llm transport error: {0}")]
    Transport(String),

    /// Output did not conform to the declared schema after all retries.
    #[error("llm schema violation: {0}")]
    SchemaViolation(String),

    /// The provider did not answer within the deadline.
    #[error("llm timeout after {0} seconds")]
    Timeout(u64),
}

impl LlmError {
    /// Transient errors are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transport(_) | LlmError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
