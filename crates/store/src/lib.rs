//! Persistence substrate for sessions, pipeline rows, and market rows.
//!
//! The [`Store`] trait is the row-CRUD contract the orchestrator, matching
//! engine, and HTTP layer depend on; the [`Broadcaster`] fans out row changes
//! to live observers. [`MemoryStore`] is the in-process implementation (the
//! production deployment would back the same trait with a hosted Postgres).

pub mod broadcast;
pub mod memory;

pub use broadcast::{Broadcaster, Channel, RowEvent};
pub use memory::MemoryStore;

use async_trait::async_trait;
use types::{
    AgentLog, AgentLogId, Factor, ForecasterResponse, Order, Phase, ResponseId, Session,
    SessionId, Trade, TraderName, TraderState,
};

/// Errors surfaced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Row CRUD contract over the persistence substrate.
///
/// Writers are partitioned by contract: the orchestrator owns sessions,
/// agent logs, factors, and forecaster responses; the matching engine owns
/// orders, trades, and trader states.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Sessions ────────────────────────────────────────────────────────

    async fn insert_session(&self, session: Session) -> Result<()>;

    async fn session(&self, id: SessionId) -> Result<Option<Session>>;

    /// Record the phase the pipeline just entered.
    async fn update_session_phase(&self, id: SessionId, phase: Phase) -> Result<()>;

    /// Mark the session completed and stamp `completed_at`.
    async fn complete_session(&self, id: SessionId) -> Result<()>;

    /// Mark the session failed with a reason; `current_phase` keeps the
    /// phase that failed.
    async fn fail_session(&self, id: SessionId, error: String) -> Result<()>;

    /// Roll worker token usage up into the session total.
    async fn add_session_tokens(&self, id: SessionId, tokens: u64) -> Result<()>;

    /// List sessions newest-first with an optional substring filter on the
    /// question text. Returns the page and the total count before paging.
    async fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
        question_filter: Option<&str>,
    ) -> Result<(Vec<Session>, usize)>;

    /// Find a non-terminal session with the same question created within the
    /// given window (server-side idempotency for run requests).
    async fn find_active_session(
        &self,
        question_text: &str,
        window: chrono::Duration,
    ) -> Result<Option<Session>>;

    // ── Agent logs ──────────────────────────────────────────────────────

    async fn insert_agent_log(&self, log: AgentLog) -> Result<()>;

    /// Terminal transition to `completed` with the validated output blob.
    async fn complete_agent_log(
        &self,
        id: AgentLogId,
        output: serde_json::Value,
        tokens: u64,
    ) -> Result<()>;

    /// Terminal transition to `failed` with a reason.
    async fn fail_agent_log(&self, id: AgentLogId, error: String, tokens: u64) -> Result<()>;

    async fn agent_logs(&self, session: SessionId) -> Result<Vec<AgentLog>>;

    // ── Factors ─────────────────────────────────────────────────────────

    /// Replace the session's factor set (validation rewrites discovery's).
    async fn replace_factors(&self, session: SessionId, factors: Vec<Factor>) -> Result<()>;

    /// Update a single factor row in place (score or research summary).
    async fn update_factor(&self, factor: Factor) -> Result<()>;

    async fn factors(&self, session: SessionId) -> Result<Vec<Factor>>;

    // ── Forecaster responses ────────────────────────────────────────────

    async fn insert_response(&self, response: ForecasterResponse) -> Result<()>;

    /// Overwrite a response row (terminal update by the orchestrator).
    async fn update_response(&self, response: ForecasterResponse) -> Result<()>;

    async fn responses(&self, session: SessionId) -> Result<Vec<ForecasterResponse>>;

    async fn response(&self, id: ResponseId) -> Result<Option<ForecasterResponse>>;

    // ── Market rows (matcher-owned) ─────────────────────────────────────

    async fn upsert_order(&self, order: Order) -> Result<()>;

    async fn orders(&self, session: SessionId) -> Result<Vec<Order>>;

    async fn insert_trade(&self, trade: Trade) -> Result<()>;

    async fn trades(&self, session: SessionId) -> Result<Vec<Trade>>;

    async fn upsert_trader_state(&self, state: TraderState) -> Result<()>;

    async fn trader_states(&self, session: SessionId) -> Result<Vec<TraderState>>;

    async fn trader_state(
        &self,
        session: SessionId,
        name: TraderName,
    ) -> Result<Option<TraderState>>;
}
