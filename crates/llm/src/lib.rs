//! Structured LLM worker wrapper.
//!
//! Given a system prompt, a user payload, and a declared output schema,
//! obtain a JSON object that validates against the schema, while tracking
//! token usage and web-search sources. All retry and parsing responsibility
//! lives here so workers stay agnostic of provider behavior.

pub mod client;
pub mod error;
pub mod mock;
pub mod schema;
pub mod structured;

pub use client::{CompletionRequest, HttpLlmClient, LlmClient, RawCompletion};
pub use error::{LlmError, Result};
pub use mock::{MockBehavior, MockLlm};
pub use schema::OutputSchema;
pub use structured::{call_structured, CallOptions, StructuredOutput};
