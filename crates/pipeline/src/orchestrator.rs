//! Phase-gated orchestrator.
//!
//! Drives a session through discovery → validation → research → synthesis.
//! Each phase fans out workers in parallel and completes only when every
//! worker reaches a terminal state; the next phase starts only after that
//! barrier. Worker outputs are collected in completion order but consumed in
//! a deterministic canonical order (worker index / agent name).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use llm::{CallOptions, LlmClient};
use store::{Store, StoreError};
use tokio::sync::{watch, Semaphore};
use types::{
    normalize_factor_name, Factor, ForecasterClass, ForecasterResponse, Phase, PhaseDurations,
    QuestionType, ResponseStatus, Session, SessionId, SessionStatus,
};

use crate::counts::AgentCounts;
use crate::outputs::{
    ConsensusOutput, DiscoveryOutput, FactorCandidate, RatingConsensusOutput, RatingOutput,
    ResearchOutput, SynthesisOutput, ValidationOutput,
};
use crate::prompts::{
    consensus_request, discovery_request, rater_request, rating_consensus_request,
    research_request, synthesis_request, validator_request, ResearchKind,
};
use crate::worker::{run_worker, WorkerEnv};

/// Errors terminating a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("phase {phase} failed: {reason}")]
    PhaseFailed { phase: Phase, reason: String },

    #[error("session cancelled externally")]
    Cancelled,

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    fn phase(phase: Phase, reason: impl Into<String>) -> Self {
        Self::PhaseFailed {
            phase,
            reason: reason.into(),
        }
    }
}

/// Orchestrator configuration.
#[derive(Clone)]
pub struct OrchestratorConfig {
    pub counts: AgentCounts,
    /// Personalities to synthesize, 1 to 5.
    pub classes: Vec<ForecasterClass>,
    /// Hard per-worker deadline.
    pub worker_timeout: Duration,
    /// Ceiling on concurrent LLM requests; defaults to the phase's worker
    /// count.
    pub max_concurrent: Option<usize>,
    pub call_options: CallOptions,
    /// Factors surviving validation into research.
    pub top_k: usize,
    /// How often the cancellation monitor re-reads the session row.
    pub cancel_poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            counts: AgentCounts::default(),
            classes: vec![ForecasterClass::Balanced],
            worker_timeout: Duration::from_secs(300),
            max_concurrent: None,
            call_options: CallOptions::default(),
            top_k: 5,
            cancel_poll_interval: Duration::from_millis(500),
        }
    }
}

/// The four-phase pipeline driver for one session at a time.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    llm: Arc<dyn LlmClient>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Arc<dyn LlmClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { store, llm, config }
    }

    /// Run the full pipeline for a session, leaving it `completed` or
    /// `failed`.
    pub async fn run(&self, session_id: SessionId) -> Result<(), PipelineError> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(PipelineError::SessionNotFound(session_id))?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let monitor = self.spawn_cancel_monitor(session_id, cancel_tx);

        let result = self.run_phases(&session, cancel_rx).await;
        monitor.abort();

        match &result {
            Ok(()) => {
                // Guard against a terminal state set externally mid-flight.
                if let Some(current) = self.store.session(session_id).await? {
                    if current.status == SessionStatus::Running {
                        self.store.complete_session(session_id).await?;
                    }
                }
                tracing::info!(%session_id, "session completed");
            }
            Err(PipelineError::Cancelled) => {
                // The session was flipped to failed externally; nothing to
                // overwrite.
                tracing::info!(%session_id, "session cancelled externally");
            }
            Err(e) => {
                // Guard against clobbering an externally-failed session.
                if let Some(current) = self.store.session(session_id).await? {
                    if current.status == SessionStatus::Running {
                        self.store.fail_session(session_id, e.to_string()).await?;
                    }
                }
                tracing::warn!(%session_id, error = %e, "session failed");
            }
        }
        result
    }

    fn spawn_cancel_monitor(
        &self,
        session_id: SessionId,
        cancel_tx: watch::Sender<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let interval = self.config.cancel_poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match store.session(session_id).await {
                    Ok(Some(s)) if s.status == SessionStatus::Failed => {
                        let _ = cancel_tx.send(true);
                        break;
                    }
                    Ok(Some(s)) if s.status.is_terminal() => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "cancel monitor store read failed");
                    }
                }
            }
        })
    }

    fn worker_env(&self, session: SessionId, cancel: &watch::Receiver<bool>, phase_workers: usize) -> WorkerEnv {
        let limit = self.config.max_concurrent.unwrap_or(phase_workers).max(1);
        WorkerEnv {
            store: Arc::clone(&self.store),
            llm: Arc::clone(&self.llm),
            session,
            cancel: cancel.clone(),
            limiter: Arc::new(Semaphore::new(limit)),
            timeout: self.config.worker_timeout,
            call_options: self.config.call_options.clone(),
        }
    }

    async fn run_phases(
        &self,
        session: &Session,
        cancel: watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        let mut durations = PhaseDurations::new();

        // Phase 1 — discovery.
        let candidates = self
            .run_discovery(session, &cancel, &mut durations)
            .await?;

        // Phase 2 — validation.
        let top_factors = self
            .run_validation(session, &cancel, candidates, &mut durations)
            .await?;

        // Phase 3 — research.
        let researched = self
            .run_research(session, &cancel, top_factors, &mut durations)
            .await?;

        // Phase 4 — synthesis, once per personality.
        self.run_synthesis(session, &cancel, researched, durations)
            .await
    }

    fn check_cancelled(cancel: &watch::Receiver<bool>) -> Result<(), PipelineError> {
        if *cancel.borrow() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    // ── Phase 1 ─────────────────────────────────────────────────────────

    async fn run_discovery(
        &self,
        session: &Session,
        cancel: &watch::Receiver<bool>,
        durations: &mut PhaseDurations,
    ) -> Result<Vec<FactorCandidate>, PipelineError> {
        Self::check_cancelled(cancel)?;
        self.store
            .update_session_phase(session.id, Phase::Discovery)
            .await?;
        let started = Instant::now();

        let n = self.config.counts.phase_1_discovery;
        let env = self.worker_env(session.id, cancel, n);

        let workers = (0..n).map(|i| {
            let env = env.clone();
            let request =
                discovery_request(i, &session.question_text, session.question_type);
            let name = format!("discovery_{}", i + 1);
            async move {
                let output =
                    run_worker::<DiscoveryOutput>(&env, &name, Phase::Discovery, request).await;
                (i, output)
            }
        });

        let mut results: Vec<(usize, Option<llm::StructuredOutput<DiscoveryOutput>>)> =
            join_all(workers).await;
        // Canonical order: worker index, regardless of completion order.
        results.sort_by_key(|(i, _)| *i);

        Self::check_cancelled(cancel)?;

        let successes = results.iter().filter(|(_, o)| o.is_some()).count();
        if successes == 0 {
            return Err(PipelineError::phase(
                Phase::Discovery,
                "no discovery worker succeeded",
            ));
        }

        // Up to 5 candidates per worker.
        let candidates: Vec<FactorCandidate> = results
            .into_iter()
            .filter_map(|(_, o)| o)
            .flat_map(|o| o.value.factors.into_iter().take(5))
            .collect();

        durations.insert(
            Phase::Discovery.as_str().into(),
            started.elapsed().as_secs_f64(),
        );
        tracing::info!(
            session = %session.id,
            workers = n,
            successes,
            candidates = candidates.len(),
            "discovery complete"
        );
        Ok(candidates)
    }

    // ── Phase 2 ─────────────────────────────────────────────────────────

    async fn run_validation(
        &self,
        session: &Session,
        cancel: &watch::Receiver<bool>,
        candidates: Vec<FactorCandidate>,
        durations: &mut PhaseDurations,
    ) -> Result<Vec<Factor>, PipelineError> {
        Self::check_cancelled(cancel)?;
        self.store
            .update_session_phase(session.id, Phase::Validation)
            .await?;
        let started = Instant::now();
        let env = self.worker_env(session.id, cancel, 1);

        // Validator: dedup and relevance-check the discovery multiset.
        let validated = run_worker::<ValidationOutput>(
            &env,
            "validator",
            Phase::Validation,
            validator_request(&session.question_text, &candidates),
        )
        .await
        .ok_or_else(|| PipelineError::phase(Phase::Validation, "validator failed"))?;

        let unique = dedup_candidates(validated.value.validated_factors);
        if unique.is_empty() {
            return Err(PipelineError::phase(
                Phase::Validation,
                "validation produced zero factors",
            ));
        }

        // Rating: merged rating_consensus by default, split rater +
        // consensus in the 3-agent design.
        let rated = match self.config.counts.phase_2_validation {
            3 => {
                let rating = run_worker::<RatingOutput>(
                    &env,
                    "rater",
                    Phase::Validation,
                    rater_request(&session.question_text, &unique),
                )
                .await
                .ok_or_else(|| PipelineError::phase(Phase::Validation, "rater failed"))?;
                // Consensus advises; the deterministic selection below
                // arbitrates. Its failure is non-fatal.
                let _ = run_worker::<ConsensusOutput>(
                    &env,
                    "consensus",
                    Phase::Validation,
                    consensus_request(
                        &session.question_text,
                        &rating.value.rated_factors,
                        self.config.top_k,
                    ),
                )
                .await;
                rating.value.rated_factors
            }
            _ => {
                run_worker::<RatingConsensusOutput>(
                    &env,
                    "rating_consensus",
                    Phase::Validation,
                    rating_consensus_request(&session.question_text, &unique, self.config.top_k),
                )
                .await
                .ok_or_else(|| {
                    PipelineError::phase(Phase::Validation, "rating_consensus failed")
                })?
                .value
                .rated_factors
            }
        };

        Self::check_cancelled(cancel)?;

        // Scores keyed by normalized name, clamped to [0, 10].
        let scores: HashMap<String, f64> = rated
            .iter()
            .map(|r| {
                (
                    normalize_factor_name(&r.name),
                    r.importance_score.clamp(0.0, 10.0),
                )
            })
            .collect();

        let mut factors: Vec<Factor> = unique
            .into_iter()
            .map(|c| {
                let mut factor =
                    Factor::new(session.id, c.name, c.description, c.category);
                factor.importance_score = scores.get(&factor.normalized_name()).copied();
                factor
            })
            .collect();

        // Top-K selection: score descending, ties broken by lexicographic
        // name; unscored factors rank last.
        factors.sort_by(|a, b| {
            let sa = a.importance_score.unwrap_or(f64::NEG_INFINITY);
            let sb = b.importance_score.unwrap_or(f64::NEG_INFINITY);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        let top: Vec<Factor> = factors.iter().take(self.config.top_k).cloned().collect();

        self.store.replace_factors(session.id, factors).await?;

        durations.insert(
            Phase::Validation.as_str().into(),
            started.elapsed().as_secs_f64(),
        );
        tracing::info!(session = %session.id, surviving = top.len(), "validation complete");
        Ok(top)
    }

    // ── Phase 3 ─────────────────────────────────────────────────────────

    async fn run_research(
        &self,
        session: &Session,
        cancel: &watch::Receiver<bool>,
        mut factors: Vec<Factor>,
        durations: &mut PhaseDurations,
    ) -> Result<Vec<Factor>, PipelineError> {
        Self::check_cancelled(cancel)?;
        self.store
            .update_session_phase(session.id, Phase::Research)
            .await?;
        let started = Instant::now();

        let k = factors.len();
        let n_h = self.config.counts.phase_3_historical;
        let n_c = self.config.counts.phase_3_current;

        // Workers are assigned to factors round-robin within each kind.
        let assignments: Vec<(String, ResearchKind, usize)> = (0..n_h)
            .map(|j| {
                (
                    format!("research_historical_{}", j + 1),
                    ResearchKind::Historical,
                    j % k,
                )
            })
            .chain((0..n_c).map(|j| {
                (
                    format!("research_current_{}", j + 1),
                    ResearchKind::Current,
                    j % k,
                )
            }))
            .collect();

        if assignments.is_empty() {
            return Err(PipelineError::phase(
                Phase::Research,
                "no research workers configured",
            ));
        }

        let env = self.worker_env(session.id, cancel, assignments.len());
        let workers = assignments.into_iter().map(|(name, kind, factor_idx)| {
            let env = env.clone();
            let request = research_request(kind, &session.question_text, &factors[factor_idx]);
            async move {
                let output =
                    run_worker::<ResearchOutput>(&env, &name, Phase::Research, request).await;
                (name, factor_idx, output)
            }
        });
        let results = join_all(workers).await;

        Self::check_cancelled(cancel)?;

        // Deterministic concatenation order: agent name ascending.
        let mut summaries: Vec<(String, usize, String)> = results
            .into_iter()
            .filter_map(|(name, idx, output)| output.map(|o| (name, idx, o.value.summary)))
            .collect();
        summaries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut per_factor: HashMap<usize, Vec<String>> = HashMap::new();
        for (_, idx, summary) in summaries {
            per_factor.entry(idx).or_default().push(summary);
        }

        let mut survivors = Vec::new();
        for (idx, factor) in factors.iter_mut().enumerate() {
            if let Some(parts) = per_factor.get(&idx) {
                factor.research_summary = Some(parts.join("\n\n"));
                self.store.update_factor(factor.clone()).await?;
                survivors.push(factor.clone());
            }
        }

        if survivors.is_empty() {
            return Err(PipelineError::phase(
                Phase::Research,
                "no factor survived research",
            ));
        }

        durations.insert(
            Phase::Research.as_str().into(),
            started.elapsed().as_secs_f64(),
        );
        tracing::info!(session = %session.id, survivors = survivors.len(), "research complete");
        Ok(survivors)
    }

    // ── Phase 4 ─────────────────────────────────────────────────────────

    async fn run_synthesis(
        &self,
        session: &Session,
        cancel: &watch::Receiver<bool>,
        factors: Vec<Factor>,
        durations: PhaseDurations,
    ) -> Result<(), PipelineError> {
        Self::check_cancelled(cancel)?;
        self.store
            .update_session_phase(session.id, Phase::Synthesis)
            .await?;

        let classes = if self.config.classes.is_empty() {
            vec![ForecasterClass::Balanced]
        } else {
            self.config.classes.clone()
        };
        let env = self.worker_env(session.id, cancel, classes.len());

        let workers = classes.iter().map(|&class| {
            let env = env.clone();
            let factors = factors.clone();
            let durations = durations.clone();
            let store = Arc::clone(&self.store);
            let question = session.question_text.clone();
            let question_type = session.question_type;
            let session_id = session.id;
            async move {
                synthesize_one(
                    &env, &store, session_id, class, &question, question_type, &factors,
                    durations,
                )
                .await
            }
        });
        let completed = join_all(workers).await.into_iter().filter(|ok| *ok).count();

        Self::check_cancelled(cancel)?;

        if completed == 0 {
            return Err(PipelineError::phase(
                Phase::Synthesis,
                "no synthesizer produced a prediction",
            ));
        }
        tracing::info!(session = %session.id, completed, "synthesis complete");
        Ok(())
    }
}

/// Run one personality's synthesis to a terminal response row. Returns
/// whether it completed.
#[allow(clippy::too_many_arguments)]
async fn synthesize_one(
    env: &WorkerEnv,
    store: &Arc<dyn Store>,
    session_id: SessionId,
    class: ForecasterClass,
    question: &str,
    question_type: QuestionType,
    factors: &[Factor],
    mut durations: PhaseDurations,
) -> bool {
    let mut response = ForecasterResponse::running(session_id, class);
    if let Err(e) = store.insert_response(response.clone()).await {
        tracing::error!(%class, error = %e, "failed to create response row");
        return false;
    }

    let started = Instant::now();
    let output = run_worker::<SynthesisOutput>(
        env,
        &format!("synthesis_{class}"),
        Phase::Synthesis,
        synthesis_request(class, question, question_type, factors),
    )
    .await;
    durations.insert(
        Phase::Synthesis.as_str().into(),
        started.elapsed().as_secs_f64(),
    );

    match output {
        Some(out) => {
            response.prediction_probability = Some(out.value.prediction_probability);
            response.confidence = Some(out.value.confidence);
            response.reasoning = Some(out.value.reasoning);
            response.key_factors = out.value.key_factors;
            response.phase_durations = durations;
            response.status = ResponseStatus::Completed;
            if let Err(e) = store.update_response(response).await {
                tracing::error!(%class, error = %e, "failed to complete response row");
                return false;
            }
            true
        }
        None => {
            response.phase_durations = durations;
            response.status = ResponseStatus::Failed;
            if let Err(e) = store.update_response(response).await {
                tracing::error!(%class, error = %e, "failed to fail response row");
            }
            false
        }
    }
}

/// Exact-name dedup over the validator's output: lowercased trimmed names,
/// keeping the more specific (longer) description.
fn dedup_candidates(candidates: Vec<FactorCandidate>) -> Vec<FactorCandidate> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<FactorCandidate> = Vec::new();
    for candidate in candidates {
        let key = normalize_factor_name(&candidate.name);
        match seen.get(&key) {
            Some(&idx) => {
                if candidate.description.len() > out[idx].description.len() {
                    out[idx] = candidate;
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, description: &str) -> FactorCandidate {
        FactorCandidate {
            name: name.into(),
            description: description.into(),
            category: "general".into(),
        }
    }

    #[test]
    fn test_dedup_prefers_specific_description() {
        let out = dedup_candidates(vec![
            candidate("Fed Policy", "rates"),
            candidate("fed policy ", "the central bank's rate path through 2025"),
            candidate("Elections", "2024 cycle"),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out[0].description.contains("rate path"));
    }

    #[test]
    fn test_dedup_keeps_first_position() {
        let out = dedup_candidates(vec![
            candidate("A", "aaa"),
            candidate("B", "bbb"),
            candidate("a", "x"),
        ]);
        assert_eq!(out[0].name, "A");
        assert_eq!(out.len(), 2);
    }
}
