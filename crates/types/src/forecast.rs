//! Forecasting pipeline rows: agent logs, factors, forecaster responses.

use crate::ids::{AgentLogId, FactorId, ResponseId, SessionId, Timestamp};
use crate::session::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of a single worker execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

/// One worker execution record.
///
/// Created with `status = Running` before the LLM call, then updated exactly
/// once to a terminal state. These rows are the event stream live observers
/// subscribe to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLog {
    pub id: AgentLogId,
    pub session_id: SessionId,
    pub agent_name: String,
    pub phase: Phase,
    pub status: AgentStatus,
    /// Schema-typed output blob, present iff `status == Completed`.
    pub output_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub tokens_used: u64,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl AgentLog {
    /// Create a running log row for a freshly spawned worker.
    pub fn running(session_id: SessionId, agent_name: impl Into<String>, phase: Phase) -> Self {
        Self {
            id: AgentLogId::new(),
            session_id,
            agent_name: agent_name.into(),
            phase,
            status: AgentStatus::Running,
            output_data: None,
            error_message: None,
            tokens_used: 0,
            created_at: crate::ids::now(),
            completed_at: None,
        }
    }
}

/// A factor that could influence the forecast outcome.
///
/// Created in discovery/validation; `importance_score` set only by the
/// rating-consensus step, `research_summary` only by research workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub id: FactorId,
    pub session_id: SessionId,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Importance on `[0, 10]`; `None` until rated.
    pub importance_score: Option<f64>,
    /// Concatenated research worker summaries; `None` until researched.
    pub research_summary: Option<String>,
}

impl Factor {
    pub fn new(
        session_id: SessionId,
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: FactorId::new(),
            session_id,
            name: name.into(),
            description: description.into(),
            category: category.into(),
            importance_score: None,
            research_summary: None,
        }
    }

    /// Key used for deduplication: lowercased, trimmed name.
    pub fn normalized_name(&self) -> String {
        normalize_factor_name(&self.name)
    }
}

/// Normalize a factor name for uniqueness checks.
pub fn normalize_factor_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Analyst personality that modulates the synthesis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecasterClass {
    Conservative,
    Momentum,
    Historical,
    Realtime,
    Balanced,
}

impl ForecasterClass {
    /// All personalities, in canonical order.
    pub const ALL: [ForecasterClass; 5] = [
        ForecasterClass::Conservative,
        ForecasterClass::Momentum,
        ForecasterClass::Historical,
        ForecasterClass::Realtime,
        ForecasterClass::Balanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ForecasterClass::Conservative => "conservative",
            ForecasterClass::Momentum => "momentum",
            ForecasterClass::Historical => "historical",
            ForecasterClass::Realtime => "realtime",
            ForecasterClass::Balanced => "balanced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for ForecasterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a forecaster response row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Running,
    Completed,
    Failed,
}

/// Wall-clock seconds spent in each pipeline phase.
pub type PhaseDurations = BTreeMap<String, f64>;

/// One synthesis result per (session, personality).
///
/// `prediction_probability` and `confidence` are non-null iff
/// `status == Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecasterResponse {
    pub id: ResponseId,
    pub session_id: SessionId,
    pub forecaster_class: ForecasterClass,
    pub prediction_probability: Option<f64>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
    pub key_factors: Vec<String>,
    pub phase_durations: PhaseDurations,
    pub status: ResponseStatus,
    pub created_at: Timestamp,
}

impl ForecasterResponse {
    /// Create a running response row for a personality.
    pub fn running(session_id: SessionId, class: ForecasterClass) -> Self {
        Self {
            id: ResponseId::new(),
            session_id,
            forecaster_class: class,
            prediction_probability: None,
            confidence: None,
            reasoning: None,
            key_factors: Vec::new(),
            phase_durations: PhaseDurations::new(),
            status: ResponseStatus::Running,
            created_at: crate::ids::now(),
        }
    }
}
