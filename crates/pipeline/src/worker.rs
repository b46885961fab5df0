//! One worker = one LLM invocation wrapped in an AgentLog lifecycle.
//!
//! A `running` log row is written before the call; exactly one terminal
//! update follows. Workers respect the session-wide cancellation signal, a
//! hard per-worker timeout, and the phase's concurrency limiter.

use std::sync::Arc;
use std::time::Duration;

use llm::{call_structured, CallOptions, CompletionRequest, LlmClient, StructuredOutput};
use serde::de::DeserializeOwned;
use store::Store;
use tokio::sync::{watch, Semaphore};
use types::{AgentLog, Phase, SessionId};

/// Shared environment for all workers of a session.
#[derive(Clone)]
pub struct WorkerEnv {
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn LlmClient>,
    pub session: SessionId,
    /// Flips to `true` when the session is cancelled externally.
    pub cancel: watch::Receiver<bool>,
    /// Bounds concurrent LLM requests for the running phase.
    pub limiter: Arc<Semaphore>,
    /// Hard per-worker deadline.
    pub timeout: Duration,
    pub call_options: CallOptions,
}

/// Wait until the cancel flag is raised.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow() {
        if cancel.changed().await.is_err() {
            // Sender dropped: orchestrator is gone, treat as cancelled.
            return;
        }
    }
}

/// Run one worker to a terminal log state.
///
/// Returns the validated output on success; `None` on any worker-level
/// failure (timeout, cancellation, exhausted retries). The failure is
/// recorded on the log row; callers apply their quorum rules.
pub async fn run_worker<T: DeserializeOwned>(
    env: &WorkerEnv,
    agent_name: &str,
    phase: Phase,
    request: CompletionRequest,
) -> Option<StructuredOutput<T>> {
    let log = AgentLog::running(env.session, agent_name, phase);
    let log_id = log.id;
    if let Err(e) = env.store.insert_agent_log(log).await {
        tracing::error!(agent = agent_name, error = %e, "failed to record worker spawn");
        return None;
    }

    let mut cancel = env.cancel.clone();

    // Acquire a concurrency slot, unless cancelled while queued.
    let permit = tokio::select! {
        permit = env.limiter.clone().acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => {
                fail(env, log_id, agent_name, "cancelled").await;
                return None;
            }
        },
        _ = cancelled(&mut cancel) => {
            fail(env, log_id, agent_name, "cancelled").await;
            return None;
        }
    };

    let outcome = tokio::select! {
        _ = cancelled(&mut cancel) => Err("cancelled".to_string()),
        result = tokio::time::timeout(
            env.timeout,
            call_structured::<T>(env.llm.as_ref(), &request, &env.call_options),
        ) => match result {
            Err(_elapsed) => Err("timeout".to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(output)) => Ok(output),
        }
    };
    drop(permit);

    match outcome {
        Ok(output) => {
            let tokens = output.total_tokens();
            if let Err(e) = env
                .store
                .complete_agent_log(log_id, output.raw.clone(), tokens)
                .await
            {
                tracing::error!(agent = agent_name, error = %e, "failed to record completion");
            }
            if let Err(e) = env.store.add_session_tokens(env.session, tokens).await {
                tracing::warn!(agent = agent_name, error = %e, "failed to roll up tokens");
            }
            Some(output)
        }
        Err(reason) => {
            fail(env, log_id, agent_name, &reason).await;
            None
        }
    }
}

async fn fail(env: &WorkerEnv, log_id: types::AgentLogId, agent_name: &str, reason: &str) {
    tracing::warn!(agent = agent_name, reason, "worker failed");
    if let Err(e) = env
        .store
        .fail_agent_log(log_id, reason.to_string(), 0)
        .await
    {
        tracing::error!(agent = agent_name, error = %e, "failed to record worker failure");
    }
}
