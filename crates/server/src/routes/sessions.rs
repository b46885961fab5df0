//! Trading session endpoints: start the coupled pipeline + simulation,
//! inspect status and the live order book, stop or complete the run.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{AgentCountsRequest, Orchestrator};
use sim::RoundScheduler;
use types::{QuestionType, Session, SessionId};

use crate::error::{AppError, AppResult};
use crate::routes::forecasts::{orchestrator_config, resolve_classes, validate_question};
use crate::state::ServerState;

/// Body for `POST /api/sessions/run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub trading_interval_seconds: Option<u64>,
    #[serde(default)]
    pub agent_counts: Option<AgentCountsRequest>,
    #[serde(default)]
    pub forecaster_class: Option<String>,
    #[serde(default)]
    pub run_all_forecasters: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub session_id: SessionId,
}

/// `POST /api/sessions/run` — start pipeline + trading simulation.
///
/// Idempotent: an active session with the same question inside the dedup
/// window is returned instead of double-starting (the server-side
/// replacement for the UI's double-invoke guard).
pub async fn run_session(
    State(state): State<ServerState>,
    Json(req): Json<RunRequest>,
) -> AppResult<Json<RunResponse>> {
    validate_question(&req.question_text)?;
    let classes = resolve_classes(req.forecaster_class.as_deref(), req.run_all_forecasters)?;
    let question = req.question_text.trim().to_string();

    if let Some(existing) = state
        .store()
        .find_active_session(&question, state.dedup_window)
        .await?
    {
        tracing::info!(session_id = %existing.id, "returning existing active session");
        return Ok(Json(RunResponse {
            session_id: existing.id,
        }));
    }

    let session = Session::new(&question, req.question_type);
    let session_id = session.id;
    state.store().insert_session(session).await?;

    // Pipeline task.
    let config = orchestrator_config(&state.orchestrator, req.agent_counts.as_ref(), classes);
    let orchestrator = Orchestrator::new(
        Arc::clone(state.store()),
        Arc::clone(&state.resources.llm),
        config,
    );
    tokio::spawn(async move {
        let _ = orchestrator.run(session_id).await;
    });

    // Simulation task; blocks on the pipeline's synthesis seeds.
    let mut scheduler_config = state.scheduler.clone();
    if let Some(secs) = req.trading_interval_seconds {
        scheduler_config.interval = Duration::from_secs(secs.max(1));
    }
    let scheduler = Arc::new(RoundScheduler::new(
        session_id,
        question,
        Arc::clone(state.store()),
        Arc::clone(&state.market),
        Arc::clone(&state.resources.sentiment),
        Arc::clone(&state.resources.feeds),
        scheduler_config,
    ));
    state.simulations.insert(session_id, Arc::clone(&scheduler));
    tokio::spawn(scheduler.run());

    tracing::info!(%session_id, "trading session started");
    Ok(Json(RunResponse { session_id }))
}

fn simulation(state: &ServerState, id: SessionId) -> AppResult<Arc<RoundScheduler>> {
    state
        .simulations
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("no simulation for session {id}")))
}

/// `GET /api/sessions/{id}/status`
pub async fn get_status(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> AppResult<Json<sim::SimStatus>> {
    Ok(Json(simulation(&state, id)?.status()))
}

/// `POST /api/sessions/{id}/stop`
pub async fn stop_session(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> AppResult<Json<Value>> {
    simulation(&state, id)?.stop();
    Ok(Json(json!({"stopped": true})))
}

/// `POST /api/sessions/{id}/complete`
pub async fn complete_session(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> AppResult<Json<Value>> {
    simulation(&state, id)?.complete().await;
    Ok(Json(json!({"completed": true})))
}

/// `GET /api/sessions/{id}/orderbook`
pub async fn get_orderbook(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> AppResult<Json<types::BookSnapshot>> {
    // The book may legitimately be empty; 404 only for unknown sessions.
    state
        .store()
        .session(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {id}")))?;
    Ok(Json(state.market.snapshot(id).await))
}
