//! Interval-driven trading rounds.
//!
//! The scheduler blocks round 1 on seed probabilities from the pipeline's
//! synthesis phase, then repeatedly fans the 18 traders out against the
//! pre-round market snapshot. Each trader's quote RPC runs as its own task;
//! a trader whose previous round is still in flight is skipped with a log
//! entry rather than queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use market::Market;
use parking_lot::RwLock;
use serde::Serialize;
use store::Store;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use traders::{
    build_pool, AccountFeedProvider, RoundContext, SeedBeliefs, SentimentProvider, Trader,
};
use types::{ResponseStatus, SessionId, TraderName};

/// Lifecycle phase of one session's simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimPhase {
    Initializing,
    Running,
    Stopped,
}

/// Status surface for the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct SimStatus {
    pub running: bool,
    pub phase: SimPhase,
    pub round_number: u64,
}

/// Scheduler timing knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Inter-round sleep (`TRADING_INTERVAL_SECONDS`).
    pub interval: Duration,
    /// How often to re-check for seed probabilities while initializing.
    pub seed_poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            seed_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Drives one session's trading rounds until stopped.
pub struct RoundScheduler {
    session: SessionId,
    question_text: String,
    store: Arc<dyn Store>,
    market: Arc<Market>,
    sentiment: Arc<dyn SentimentProvider>,
    feeds: Arc<dyn AccountFeedProvider>,
    config: SchedulerConfig,

    phase: RwLock<SimPhase>,
    round_number: AtomicU64,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl RoundScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: SessionId,
        question_text: impl Into<String>,
        store: Arc<dyn Store>,
        market: Arc<Market>,
        sentiment: Arc<dyn SentimentProvider>,
        feeds: Arc<dyn AccountFeedProvider>,
        config: SchedulerConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            session,
            question_text: question_text.into(),
            store,
            market,
            sentiment,
            feeds,
            config,
            phase: RwLock::new(SimPhase::Initializing),
            round_number: AtomicU64::new(0),
            stop_tx,
            stop_rx,
        }
    }

    /// Current status for `GET /api/sessions/{id}/status`.
    pub fn status(&self) -> SimStatus {
        let phase = *self.phase.read();
        SimStatus {
            running: phase == SimPhase::Running && !*self.stop_rx.borrow(),
            phase,
            round_number: self.round_number.load(Ordering::SeqCst),
        }
    }

    /// Request a graceful stop: the current round's in-flight quotes finish,
    /// then the loop exits.
    pub fn stop(&self) {
        tracing::info!(session = %self.session, "simulation stop requested");
        let _ = self.stop_tx.send(true);
    }

    /// Stop and additionally mark the session terminal.
    pub async fn complete(&self) {
        self.stop();
        match self.store.session(self.session).await {
            Ok(Some(s)) if !s.status.is_terminal() => {
                if let Err(e) = self.store.complete_session(self.session).await {
                    tracing::warn!(session = %self.session, error = %e, "failed to complete session");
                }
            }
            _ => {}
        }
    }

    fn stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Run rounds until stopped. Intended to be spawned as a task.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(session = %self.session, "simulation initializing");

        // Observers see the full roster before the first fill.
        if let Err(e) = self
            .market
            .ensure_traders(self.session, &TraderName::ALL)
            .await
        {
            tracing::warn!(session = %self.session, error = %e, "failed to seed trader roster");
        }

        // Round 1 blocks on seed probabilities from synthesis.
        let Some(seeds) = self.wait_for_seeds().await else {
            *self.phase.write() = SimPhase::Stopped;
            tracing::info!(session = %self.session, "simulation exited before trading");
            return;
        };

        let traders: Vec<(TraderName, Arc<Mutex<Box<dyn Trader>>>)> =
            build_pool(&seeds, Arc::clone(&self.sentiment), Arc::clone(&self.feeds))
                .into_iter()
                .map(|t| (t.name(), Arc::new(Mutex::new(t))))
                .collect();
        let in_flight: HashMap<TraderName, Arc<AtomicBool>> = TraderName::ALL
            .into_iter()
            .map(|n| (n, Arc::new(AtomicBool::new(false))))
            .collect();

        *self.phase.write() = SimPhase::Running;
        tracing::info!(session = %self.session, seeds = seeds.len(), "simulation running");

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut stop_rx = self.stop_rx.clone();

        while !self.stopped() {
            let round = self.round_number.fetch_add(1, Ordering::SeqCst) + 1;

            // All traders decide against the same pre-round snapshot.
            let snapshot = self.market.snapshot(self.session).await;

            for (name, trader) in &traders {
                let name = *name;
                let busy = Arc::clone(&in_flight[&name]);
                if busy.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        session = %self.session,
                        trader = %name,
                        round,
                        "previous quote RPC still in flight, skipping round"
                    );
                    continue;
                }

                let trader = Arc::clone(trader);
                let scheduler = Arc::clone(&self);
                let snapshot = snapshot.clone();
                tasks.spawn(async move {
                    scheduler
                        .run_trader_round(name, trader, snapshot, round)
                        .await;
                    busy.store(false, Ordering::SeqCst);
                });
            }

            // Reap finished tasks without blocking the round cadence.
            while tasks.try_join_next().is_some() {}

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = stop_rx.changed() => {}
            }
        }

        // Finish the in-flight quotes of the final round.
        while tasks.join_next().await.is_some() {}

        *self.phase.write() = SimPhase::Stopped;
        tracing::info!(
            session = %self.session,
            rounds = self.round_number.load(Ordering::SeqCst),
            "simulation stopped"
        );
    }

    /// One trader's decision and quote placement.
    async fn run_trader_round(
        &self,
        name: TraderName,
        trader: Arc<Mutex<Box<dyn Trader>>>,
        snapshot: types::BookSnapshot,
        round: u64,
    ) {
        let state = match self.store.trader_state(self.session, name).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(trader = %name, error = %e, "failed to read trader state");
                None
            }
        };

        let ctx = RoundContext {
            round_number: round,
            question_text: self.question_text.clone(),
            snapshot,
            state,
        };

        let mut trader = trader.lock().await;
        let decision = trader.decide(&ctx).await;

        if let Some(decision) = decision {
            match self
                .market
                .place_mm_quotes(
                    self.session,
                    name,
                    decision.bid,
                    decision.ask,
                    decision.quantity,
                )
                .await
            {
                Ok(result) if result.trades_count > 0 => {
                    tracing::info!(
                        session = %self.session,
                        trader = %name,
                        round,
                        trades = result.trades_count,
                        volume = result.volume,
                        "quotes matched"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(trader = %name, round, error = %e, "quote placement failed");
                }
            }
        }

        if let Some(note) = trader.note() {
            if let Err(e) = self
                .market
                .update_trader_note(self.session, name, note)
                .await
            {
                tracing::debug!(trader = %name, error = %e, "failed to persist note");
            }
        }
    }

    /// Poll for completed forecaster responses. Returns `None` when the
    /// scheduler is stopped, or when the session reached a terminal state
    /// with nothing to seed from.
    async fn wait_for_seeds(&self) -> Option<SeedBeliefs> {
        let mut stop_rx = self.stop_rx.clone();
        loop {
            if self.stopped() {
                return None;
            }

            let responses = match self.store.responses(self.session).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(session = %self.session, error = %e, "seed poll failed");
                    Vec::new()
                }
            };

            let mut seeds = SeedBeliefs::new();
            for response in &responses {
                if response.status == ResponseStatus::Completed {
                    if let (Some(p), Some(c)) =
                        (response.prediction_probability, response.confidence)
                    {
                        seeds.insert(response.forecaster_class, p, c);
                    }
                }
            }
            if !seeds.is_empty() {
                return Some(seeds);
            }

            // A dead pipeline with no seeds means nothing to trade on.
            match self.store.session(self.session).await {
                Ok(Some(s)) if s.status.is_terminal() => {
                    tracing::warn!(
                        session = %self.session,
                        "session terminal with no completed forecasts"
                    );
                    return None;
                }
                Ok(None) => return None,
                _ => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.seed_poll_interval) => {}
                _ = stop_rx.changed() => {}
            }
        }
    }
}
