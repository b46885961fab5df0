//! Handler-level API tests against the in-memory store and a scripted LLM.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use llm::{CallOptions, MockBehavior, MockLlm};
use pipeline::OrchestratorConfig;
use serde_json::json;
use server::routes::{forecasts, sessions};
use server::{AppContext, AppError, Resources};
use sim::SchedulerConfig;
use store::Store;
use store::MemoryStore;
use traders::{StaticFeeds, StaticSentiment};
use types::{ForecasterClass, SessionId, SessionStatus};

fn happy_mock() -> MockLlm {
    MockLlm::new()
        .route(
            "factor discovery specialist",
            MockBehavior::Reply(json!({
                "factors": [
                    {"name": "Macroeconomic trend", "description": "Rates shape it", "category": "economic"},
                    {"name": "Regulatory posture", "description": "Rules gate it", "category": "political"}
                ]
            })),
        )
        .route(
            "factor validation specialist",
            MockBehavior::Reply(json!({
                "validated_factors": [
                    {"name": "Macroeconomic trend", "description": "Rates shape it", "category": "economic"},
                    {"name": "Regulatory posture", "description": "Rules gate it", "category": "political"}
                ]
            })),
        )
        .route(
            "rater and consensus builder",
            MockBehavior::Reply(json!({
                "rated_factors": [
                    {"name": "Macroeconomic trend", "importance_score": 8.0},
                    {"name": "Regulatory posture", "importance_score": 6.0}
                ]
            })),
        )
        .route(
            "historical pattern analyst",
            MockBehavior::Reply(json!({"factor_name": "x", "summary": "base rate 60%"})),
        )
        .route(
            "current data researcher",
            MockBehavior::Reply(json!({"factor_name": "x", "summary": "trending up"})),
        )
        .route(
            "prediction synthesis specialist",
            MockBehavior::Reply(json!({
                "prediction_probability": 0.62,
                "confidence": 0.7,
                "reasoning": "leaning yes",
                "key_factors": ["Macroeconomic trend"]
            })),
        )
}

fn test_state(mock: MockLlm) -> (Arc<MemoryStore>, server::ServerState) {
    let store = Arc::new(MemoryStore::new());
    let resources = Resources {
        store: store.clone() as Arc<dyn Store>,
        llm: Arc::new(mock),
        sentiment: Arc::new(StaticSentiment::neutral()),
        feeds: Arc::new(StaticFeeds::new()),
    };
    let context = AppContext::new(resources)
        .with_orchestrator(OrchestratorConfig {
            worker_timeout: Duration::from_millis(500),
            call_options: CallOptions {
                max_retries: 1,
                backoff_base: Duration::from_millis(1),
            },
            cancel_poll_interval: Duration::from_millis(20),
            ..OrchestratorConfig::default()
        })
        .with_scheduler(SchedulerConfig {
            interval: Duration::from_millis(25),
            seed_poll_interval: Duration::from_millis(10),
        });
    (store, Arc::new(context))
}

async fn wait_for_terminal(store: &MemoryStore, id: SessionId) -> types::Session {
    for _ in 0..200 {
        let session = store.session(id).await.unwrap().unwrap();
        if session.status.is_terminal() {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("session {id} never reached a terminal state");
}

#[tokio::test]
async fn forecast_lifecycle_via_handlers() {
    let (store, state) = test_state(happy_mock());

    let Json(session) = forecasts::create_forecast(
        State(state.clone()),
        Json(serde_json::from_value(json!({
            "question_text": "Will X happen by 2025?",
            "question_type": "binary",
            "agent_counts": {"phase_1_discovery": 2, "phase_3_research": 2}
        }))
        .unwrap()),
    )
    .await
    .unwrap();

    assert_eq!(session.status, SessionStatus::Running);
    let finished = wait_for_terminal(&store, session.id).await;
    assert_eq!(finished.status, SessionStatus::Completed);

    // Detail projection is complete and stable once terminal.
    let Json(detail) = forecasts::get_forecast(State(state.clone()), Path(session.id))
        .await
        .unwrap();
    assert_eq!(detail.forecaster_responses.len(), 1);
    assert_eq!(
        detail.forecaster_responses[0].prediction_probability,
        Some(0.62)
    );
    assert!(!detail.factors.is_empty());
    assert!(!detail.agent_logs.is_empty());

    let Json(again) = forecasts::get_forecast(State(state.clone()), Path(session.id))
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&detail.forecaster_responses).unwrap(),
        serde_json::to_value(&again.forecaster_responses).unwrap()
    );

    // Listing sees the session, filter included.
    let Json(list) = forecasts::list_forecasts(
        State(state.clone()),
        Query(serde_json::from_value(json!({"question_text": "will x"})).unwrap()),
    )
    .await
    .unwrap();
    assert_eq!(list.total, 1);
}

#[tokio::test]
async fn create_forecast_validates_input() {
    let (_store, state) = test_state(MockLlm::new());

    let blank = forecasts::create_forecast(
        State(state.clone()),
        Json(serde_json::from_value(json!({"question_text": "  "})).unwrap()),
    )
    .await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let bad_class = forecasts::create_forecast(
        State(state.clone()),
        Json(
            serde_json::from_value(
                json!({"question_text": "q", "forecaster_class": "reckless"}),
            )
            .unwrap(),
        ),
    )
    .await;
    assert!(matches!(bad_class, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn run_session_is_idempotent_within_window() {
    let (_store, state) = test_state(happy_mock());
    let body = json!({
        "question_text": "Will X happen by 2025?",
        "trading_interval_seconds": 1
    });

    let Json(first) = sessions::run_session(
        State(state.clone()),
        Json(serde_json::from_value(body.clone()).unwrap()),
    )
    .await
    .unwrap();
    let Json(second) = sessions::run_session(
        State(state.clone()),
        Json(serde_json::from_value(body).unwrap()),
    )
    .await
    .unwrap();
    assert_eq!(first.session_id, second.session_id);

    let Json(other) = sessions::run_session(
        State(state.clone()),
        Json(serde_json::from_value(json!({"question_text": "A different question?"})).unwrap()),
    )
    .await
    .unwrap();
    assert_ne!(first.session_id, other.session_id);

    // Clean up the background simulations.
    for id in [first.session_id, other.session_id] {
        if let Some(sim) = state.simulations.get(id) {
            sim.stop();
        }
    }
}

#[tokio::test]
async fn run_session_trades_end_to_end() {
    let (store, state) = test_state(happy_mock());

    let Json(run) = sessions::run_session(
        State(state.clone()),
        Json(serde_json::from_value(json!({
            "question_text": "Will X happen by 2025?",
            "agent_counts": {"phase_1_discovery": 1, "phase_3_research": 2}
        }))
        .unwrap()),
    )
    .await
    .unwrap();

    // Pipeline completes, then rounds start placing quotes.
    wait_for_terminal(&store, run.session_id).await;
    for _ in 0..100 {
        let status = sessions::get_status(State(state.clone()), Path(run.session_id))
            .await
            .unwrap();
        if status.0.round_number >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let Json(book) = sessions::get_orderbook(State(state.clone()), Path(run.session_id))
        .await
        .unwrap();
    assert!(!book.bids.is_empty() || !book.asks.is_empty());

    let Json(stopped) = sessions::stop_session(State(state.clone()), Path(run.session_id))
        .await
        .unwrap();
    assert_eq!(stopped["stopped"], true);
}

#[tokio::test]
async fn unknown_session_returns_not_found() {
    let (_store, state) = test_state(MockLlm::new());
    let missing = SessionId::new();

    assert!(matches!(
        sessions::get_status(State(state.clone()), Path(missing)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        sessions::stop_session(State(state.clone()), Path(missing)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        sessions::get_orderbook(State(state.clone()), Path(missing)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        forecasts::get_forecast(State(state.clone()), Path(missing)).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn run_all_forecasters_produces_five_responses() {
    let (store, state) = test_state(happy_mock());

    let Json(session) = forecasts::create_forecast(
        State(state.clone()),
        Json(serde_json::from_value(json!({
            "question_text": "Will X happen by 2025?",
            "run_all_forecasters": true,
            "agent_counts": {"phase_1_discovery": 1, "phase_3_research": 2}
        }))
        .unwrap()),
    )
    .await
    .unwrap();

    wait_for_terminal(&store, session.id).await;
    let responses = store.responses(session.id).await.unwrap();
    assert_eq!(responses.len(), 5);
    let classes: std::collections::BTreeSet<ForecasterClass> =
        responses.iter().map(|r| r.forecaster_class).collect();
    assert_eq!(classes.len(), 5);
}
