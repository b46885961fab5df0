//! forecast-sim - main binary.
//!
//! Wires the external collaborators (store, LLM provider, signal sources)
//! into the HTTP server that fronts both engines:
//!
//! ```text
//! POST /api/forecasts ──▶ Orchestrator (4-phase pipeline)
//! POST /api/sessions/run ──▶ Orchestrator + RoundScheduler (18 traders)
//! ```
//!
//! Exit codes: 0 normal, 1 fatal configuration error, 2 unrecoverable
//! store error on startup.

mod config;

use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use llm::HttpLlmClient;
use pipeline::OrchestratorConfig;
use server::{create_app, AppContext, Resources, ServerConfig};
use sim::SchedulerConfig;
use store::MemoryStore;
use tracing_subscriber::EnvFilter;
use traders::{StaticFeeds, StaticSentiment};

use config::AppConfig;

fn build_store(config: &AppConfig) -> Result<Arc<MemoryStore>, String> {
    // The in-process store is the only substrate this binary ships; a
    // hosted deployment backs the same trait with its own adapter.
    if config.store_url.starts_with("memory://") {
        Ok(Arc::new(MemoryStore::new()))
    } else {
        Err(format!(
            "unsupported store url {:?} (expected memory://)",
            config.store_url
        ))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            exit(1);
        }
    };

    let store = match build_store(&config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("store error: {e}");
            exit(2);
        }
    };

    let llm = match HttpLlmClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
        config.agent_timeout.as_secs(),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("llm client error: {e}");
            exit(1);
        }
    };

    let resources = Resources {
        store,
        llm,
        // Live sentiment and account feeds are deployment adapters; the
        // process starts with the static providers.
        sentiment: Arc::new(StaticSentiment::neutral()),
        feeds: Arc::new(StaticFeeds::new()),
    };

    let context = AppContext::new(resources)
        .with_orchestrator(OrchestratorConfig {
            worker_timeout: config.agent_timeout,
            ..OrchestratorConfig::default()
        })
        .with_scheduler(SchedulerConfig {
            interval: config.trading_interval,
            seed_poll_interval: Duration::from_millis(500),
        });

    let server_config = ServerConfig::from_env();
    let app = create_app(Arc::new(context));

    let listener = match tokio::net::TcpListener::bind(server_config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {}: {e}", server_config.bind_addr());
            exit(1);
        }
    };
    tracing::info!(addr = %server_config.bind_addr(), "forecast-sim listening");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("server error: {e}");
        exit(1);
    }
}
