//! Shared server state.
//!
//! `Resources` bundles the external collaborators (store, LLM, signal
//! providers) built once at process start; `AppContext` adds the market,
//! the simulation registry, and per-request configuration templates. No
//! process-wide singletons: everything handlers touch flows through here.

use std::sync::Arc;

use llm::LlmClient;
use market::Market;
use pipeline::OrchestratorConfig;
use sim::{SchedulerConfig, SimRegistry};
use store::Store;
use traders::{AccountFeedProvider, SentimentProvider};

/// External collaborators, initialized at startup and torn down at
/// shutdown.
#[derive(Clone)]
pub struct Resources {
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn LlmClient>,
    pub sentiment: Arc<dyn SentimentProvider>,
    pub feeds: Arc<dyn AccountFeedProvider>,
}

/// Everything route handlers need, cloned cheaply via `Arc`.
pub struct AppContext {
    pub resources: Resources,
    pub market: Arc<Market>,
    pub simulations: Arc<SimRegistry>,
    /// Template for per-session orchestrator runs; counts and classes are
    /// overridden per request.
    pub orchestrator: OrchestratorConfig,
    pub scheduler: SchedulerConfig,
    /// Window within which an identical active question dedups to the
    /// existing session.
    pub dedup_window: chrono::Duration,
}

impl AppContext {
    pub fn new(resources: Resources) -> Self {
        let market = Arc::new(Market::new(Arc::clone(&resources.store)));
        Self {
            resources,
            market,
            simulations: Arc::new(SimRegistry::new()),
            orchestrator: OrchestratorConfig::default(),
            scheduler: SchedulerConfig::default(),
            dedup_window: chrono::Duration::minutes(10),
        }
    }

    pub fn with_orchestrator(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator = config;
        self
    }

    pub fn with_scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.resources.store
    }
}

/// Handler state alias.
pub type ServerState = Arc<AppContext>;
