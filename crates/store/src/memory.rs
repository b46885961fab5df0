//! In-process store backed by `RwLock`-guarded tables.
//!
//! Every mutation publishes the written row on its channel, so observers see
//! the same event stream a realtime database would emit.

use crate::broadcast::{Broadcaster, Channel};
use crate::{Result, Store, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use types::{
    AgentLog, AgentLogId, AgentStatus, Factor, ForecasterResponse, Order, OrderId, Phase,
    ResponseId, Session, SessionId, SessionStatus, Trade, TraderName, TraderState,
};

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, Session>,
    agent_logs: HashMap<AgentLogId, AgentLog>,
    factors: HashMap<SessionId, Vec<Factor>>,
    responses: HashMap<ResponseId, ForecasterResponse>,
    orders: HashMap<OrderId, Order>,
    trades: HashMap<SessionId, Vec<Trade>>,
    trader_states: HashMap<(SessionId, TraderName), TraderState>,
}

/// In-memory [`Store`] implementation.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    broadcaster: Arc<Broadcaster>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            broadcaster: Arc::new(Broadcaster::default()),
        }
    }

    /// Handle to the pub/sub hub for subscribing to row changes.
    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.broadcaster)
    }

    fn with_session<F>(&self, id: SessionId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Session),
    {
        let mut tables = self.tables.write();
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
        f(session);
        let row = session.clone();
        drop(tables);
        self.broadcaster.publish(Channel::Sessions, id, &row);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: Session) -> Result<()> {
        let id = session.id;
        self.tables.write().sessions.insert(id, session.clone());
        self.broadcaster.publish(Channel::Sessions, id, &session);
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.tables.read().sessions.get(&id).cloned())
    }

    async fn update_session_phase(&self, id: SessionId, phase: Phase) -> Result<()> {
        self.with_session(id, |s| {
            s.current_phase = Some(phase);
        })
    }

    async fn complete_session(&self, id: SessionId) -> Result<()> {
        self.with_session(id, |s| {
            s.status = SessionStatus::Completed;
            s.completed_at = Some(types::now());
        })
    }

    async fn fail_session(&self, id: SessionId, error: String) -> Result<()> {
        self.with_session(id, |s| {
            s.status = SessionStatus::Failed;
            s.error_message = Some(error);
            s.completed_at = Some(types::now());
        })
    }

    async fn add_session_tokens(&self, id: SessionId, tokens: u64) -> Result<()> {
        self.with_session(id, |s| {
            s.tokens_used += tokens;
        })
    }

    async fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
        question_filter: Option<&str>,
    ) -> Result<(Vec<Session>, usize)> {
        let tables = self.tables.read();
        let mut matching: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| {
                question_filter
                    .map(|q| s.question_text.to_lowercase().contains(&q.to_lowercase()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn find_active_session(
        &self,
        question_text: &str,
        window: chrono::Duration,
    ) -> Result<Option<Session>> {
        let cutoff = types::now() - window;
        let tables = self.tables.read();
        Ok(tables
            .sessions
            .values()
            .filter(|s| {
                !s.status.is_terminal()
                    && s.question_text == question_text
                    && s.created_at >= cutoff
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn insert_agent_log(&self, log: AgentLog) -> Result<()> {
        let session = log.session_id;
        self.tables.write().agent_logs.insert(log.id, log.clone());
        self.broadcaster.publish(Channel::AgentLogs, session, &log);
        Ok(())
    }

    async fn complete_agent_log(
        &self,
        id: AgentLogId,
        output: serde_json::Value,
        tokens: u64,
    ) -> Result<()> {
        let row = {
            let mut tables = self.tables.write();
            let log = tables
                .agent_logs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("agent_log {id}")))?;
            log.status = AgentStatus::Completed;
            log.output_data = Some(output);
            log.tokens_used = tokens;
            log.completed_at = Some(types::now());
            log.clone()
        };
        self.broadcaster
            .publish(Channel::AgentLogs, row.session_id, &row);
        Ok(())
    }

    async fn fail_agent_log(&self, id: AgentLogId, error: String, tokens: u64) -> Result<()> {
        let row = {
            let mut tables = self.tables.write();
            let log = tables
                .agent_logs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("agent_log {id}")))?;
            log.status = AgentStatus::Failed;
            log.error_message = Some(error);
            log.tokens_used = tokens;
            log.completed_at = Some(types::now());
            log.clone()
        };
        self.broadcaster
            .publish(Channel::AgentLogs, row.session_id, &row);
        Ok(())
    }

    async fn agent_logs(&self, session: SessionId) -> Result<Vec<AgentLog>> {
        let tables = self.tables.read();
        let mut logs: Vec<AgentLog> = tables
            .agent_logs
            .values()
            .filter(|l| l.session_id == session)
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(logs)
    }

    async fn replace_factors(&self, session: SessionId, factors: Vec<Factor>) -> Result<()> {
        self.tables.write().factors.insert(session, factors.clone());
        for factor in &factors {
            self.broadcaster.publish(Channel::Factors, session, factor);
        }
        Ok(())
    }

    async fn update_factor(&self, factor: Factor) -> Result<()> {
        let session = factor.session_id;
        {
            let mut tables = self.tables.write();
            let factors = tables
                .factors
                .get_mut(&session)
                .ok_or_else(|| StoreError::NotFound(format!("factors for {session}")))?;
            let slot = factors
                .iter_mut()
                .find(|f| f.id == factor.id)
                .ok_or_else(|| StoreError::NotFound(format!("factor {}", factor.id)))?;
            *slot = factor.clone();
        }
        self.broadcaster.publish(Channel::Factors, session, &factor);
        Ok(())
    }

    async fn factors(&self, session: SessionId) -> Result<Vec<Factor>> {
        Ok(self
            .tables
            .read()
            .factors
            .get(&session)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_response(&self, response: ForecasterResponse) -> Result<()> {
        let session = response.session_id;
        self.tables
            .write()
            .responses
            .insert(response.id, response.clone());
        self.broadcaster
            .publish(Channel::ForecasterResponses, session, &response);
        Ok(())
    }

    async fn update_response(&self, response: ForecasterResponse) -> Result<()> {
        let session = response.session_id;
        {
            let mut tables = self.tables.write();
            if !tables.responses.contains_key(&response.id) {
                return Err(StoreError::NotFound(format!("response {}", response.id)));
            }
            tables.responses.insert(response.id, response.clone());
        }
        self.broadcaster
            .publish(Channel::ForecasterResponses, session, &response);
        Ok(())
    }

    async fn responses(&self, session: SessionId) -> Result<Vec<ForecasterResponse>> {
        let tables = self.tables.read();
        let mut rows: Vec<ForecasterResponse> = tables
            .responses
            .values()
            .filter(|r| r.session_id == session)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.forecaster_class);
        Ok(rows)
    }

    async fn response(&self, id: ResponseId) -> Result<Option<ForecasterResponse>> {
        Ok(self.tables.read().responses.get(&id).cloned())
    }

    async fn upsert_order(&self, order: Order) -> Result<()> {
        let session = order.session_id;
        self.tables.write().orders.insert(order.id, order.clone());
        self.broadcaster
            .publish(Channel::OrderbookLive, session, &order);
        Ok(())
    }

    async fn orders(&self, session: SessionId) -> Result<Vec<Order>> {
        let tables = self.tables.read();
        let mut rows: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.session_id == session)
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.seq);
        Ok(rows)
    }

    async fn insert_trade(&self, trade: Trade) -> Result<()> {
        let session = trade.session_id;
        self.tables
            .write()
            .trades
            .entry(session)
            .or_default()
            .push(trade.clone());
        self.broadcaster.publish(Channel::Trades, session, &trade);
        Ok(())
    }

    async fn trades(&self, session: SessionId) -> Result<Vec<Trade>> {
        Ok(self
            .tables
            .read()
            .trades
            .get(&session)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_trader_state(&self, state: TraderState) -> Result<()> {
        let key = (state.session_id, state.name);
        self.tables.write().trader_states.insert(key, state.clone());
        self.broadcaster
            .publish(Channel::TraderStateLive, state.session_id, &state);
        Ok(())
    }

    async fn trader_states(&self, session: SessionId) -> Result<Vec<TraderState>> {
        let tables = self.tables.read();
        let mut rows: Vec<TraderState> = tables
            .trader_states
            .values()
            .filter(|t| t.session_id == session)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.name);
        Ok(rows)
    }

    async fn trader_state(
        &self,
        session: SessionId,
        name: TraderName,
    ) -> Result<Option<TraderState>> {
        Ok(self
            .tables
            .read()
            .trader_states
            .get(&(session, name))
            .cloned())
    }
}
