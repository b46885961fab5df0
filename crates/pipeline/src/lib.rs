//! Forecasting pipeline: the phase-gated agent orchestrator.
//!
//! Spawns parallel LLM workers per phase, enforces structured outputs,
//! propagates typed data between phases, records per-phase timing and token
//! usage, and emits the AgentLog event stream live observers rely on.

pub mod counts;
pub mod orchestrator;
pub mod outputs;
pub mod prompts;
pub mod worker;

pub use counts::{AgentCounts, AgentCountsRequest};
pub use orchestrator::{Orchestrator, OrchestratorConfig, PipelineError};
pub use outputs::{
    DiscoveryOutput, FactorCandidate, RatedFactor, RatingConsensusOutput, ResearchOutput,
    SynthesisOutput, ValidationOutput,
};
pub use worker::{run_worker, WorkerEnv};
