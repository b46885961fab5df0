//! Session rows: one end-to-end forecasting + trading run.

use crate::ids::{SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of question the session is forecasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Binary,
    Numeric,
    Categorical,
}

/// Terminal-or-running status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Whether the session has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// Pipeline phase, as recorded on the session and on agent logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Validation,
    Research,
    Synthesis,
}

impl Phase {
    /// Phases in pipeline order.
    pub const ALL: [Phase; 4] = [
        Phase::Discovery,
        Phase::Validation,
        Phase::Research,
        Phase::Synthesis,
    ];

    /// Snake-case name matching the wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Validation => "validation",
            Phase::Research => "research",
            Phase::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-to-end forecasting (and optionally trading) run.
///
/// The orchestrator is the only writer of `status` and `current_phase`; the
/// session is never deleted by system logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub question_text: String,
    pub question_type: QuestionType,
    pub status: SessionStatus,
    /// Phase the pipeline is in (or was in when it terminated).
    pub current_phase: Option<Phase>,
    /// Human-readable reason when `status == Failed`.
    pub error_message: Option<String>,
    /// Total LLM tokens consumed across all workers.
    pub tokens_used: u64,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Session {
    /// Create a new running session for a question.
    pub fn new(question_text: impl Into<String>, question_type: QuestionType) -> Self {
        let now = crate::ids::now();
        Self {
            id: SessionId::new(),
            question_text: question_text.into(),
            question_type,
            status: SessionStatus::Running,
            current_phase: None,
            error_message: None,
            tokens_used: 0,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }
}
