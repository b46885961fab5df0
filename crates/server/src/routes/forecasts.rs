//! Forecast endpoints: create a pipeline-only session, fetch its full
//! detail, and list past sessions.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pipeline::{AgentCountsRequest, Orchestrator, OrchestratorConfig};
use types::{
    AgentLog, Factor, ForecasterClass, ForecasterResponse, QuestionType, Session, SessionId,
};

use crate::error::{AppError, AppResult};
use crate::state::ServerState;

/// Body for `POST /api/forecasts`.
#[derive(Debug, Deserialize)]
pub struct ForecastCreate {
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub agent_counts: Option<AgentCountsRequest>,
    #[serde(default)]
    pub forecaster_class: Option<String>,
    #[serde(default)]
    pub run_all_forecasters: Option<bool>,
}

/// Resolve the personality set a request asks for.
pub(crate) fn resolve_classes(
    forecaster_class: Option<&str>,
    run_all: Option<bool>,
) -> AppResult<Vec<ForecasterClass>> {
    if run_all.unwrap_or(false) {
        return Ok(ForecasterClass::ALL.to_vec());
    }
    match forecaster_class {
        None => Ok(vec![ForecasterClass::Balanced]),
        Some(raw) => ForecasterClass::parse(raw)
            .map(|c| vec![c])
            .ok_or_else(|| AppError::BadRequest(format!("unknown forecaster_class {raw:?}"))),
    }
}

pub(crate) fn validate_question(question_text: &str) -> AppResult<()> {
    if question_text.trim().is_empty() {
        return Err(AppError::BadRequest("question_text cannot be empty".into()));
    }
    Ok(())
}

/// Build the per-request orchestrator config from the server template.
pub(crate) fn orchestrator_config(
    template: &OrchestratorConfig,
    counts: Option<&AgentCountsRequest>,
    classes: Vec<ForecasterClass>,
) -> OrchestratorConfig {
    let mut config = template.clone();
    if let Some(counts) = counts {
        config.counts = counts.resolve();
    }
    config.classes = classes;
    config
}

/// `POST /api/forecasts` — create a session and start the pipeline.
pub async fn create_forecast(
    State(state): State<ServerState>,
    Json(req): Json<ForecastCreate>,
) -> AppResult<Json<Session>> {
    validate_question(&req.question_text)?;
    let classes = resolve_classes(req.forecaster_class.as_deref(), req.run_all_forecasters)?;

    let session = Session::new(req.question_text.trim(), req.question_type);
    let session_id = session.id;
    state.store().insert_session(session.clone()).await?;

    let config = orchestrator_config(&state.orchestrator, req.agent_counts.as_ref(), classes);
    let orchestrator = Orchestrator::new(
        Arc::clone(state.store()),
        Arc::clone(&state.resources.llm),
        config,
    );
    tokio::spawn(async move {
        // Terminal session state is recorded by the orchestrator itself.
        let _ = orchestrator.run(session_id).await;
    });

    tracing::info!(%session_id, "forecast session started");
    Ok(Json(session))
}

/// Full session detail for observers.
#[derive(Debug, Serialize)]
pub struct ForecastDetail {
    #[serde(flatten)]
    pub session: Session,
    pub forecaster_responses: Vec<ForecasterResponse>,
    pub factors: Vec<Factor>,
    pub agent_logs: Vec<AgentLog>,
}

/// `GET /api/forecasts/{id}` — pure projection of the session's rows.
pub async fn get_forecast(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> AppResult<Json<ForecastDetail>> {
    let session = state
        .store()
        .session(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {id}")))?;

    Ok(Json(ForecastDetail {
        forecaster_responses: state.store().responses(id).await?,
        factors: state.store().factors(id).await?,
        agent_logs: state.store().agent_logs(id).await?,
        session,
    }))
}

/// Query for `GET /api/forecasts`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub question_text: Option<String>,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct ForecastList {
    pub forecasts: Vec<Session>,
    pub total: usize,
}

/// `GET /api/forecasts` — newest-first listing with optional text filter.
pub async fn list_forecasts(
    State(state): State<ServerState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ForecastList>> {
    let (forecasts, total) = state
        .store()
        .list_sessions(params.limit, params.offset, params.question_text.as_deref())
        .await?;
    Ok(Json(ForecastList { forecasts, total }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_classes_default_is_balanced() {
        assert_eq!(
            resolve_classes(None, None).unwrap(),
            vec![ForecasterClass::Balanced]
        );
    }

    #[test]
    fn test_resolve_classes_run_all_wins() {
        let classes = resolve_classes(Some("momentum"), Some(true)).unwrap();
        assert_eq!(classes.len(), 5);
    }

    #[test]
    fn test_resolve_classes_rejects_unknown() {
        assert!(resolve_classes(Some("yolo"), None).is_err());
    }

    #[test]
    fn test_validate_question_rejects_blank() {
        assert!(validate_question("   ").is_err());
        assert!(validate_question("Will X happen?").is_ok());
    }
}
