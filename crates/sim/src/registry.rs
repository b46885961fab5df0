//! Registry of live simulations, keyed by session.
//!
//! Held by the server state and handed to route handlers; replaces a
//! process-global map so tests can run registries side by side.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use types::SessionId;

use crate::scheduler::RoundScheduler;

/// Live schedulers by session id.
#[derive(Default)]
pub struct SimRegistry {
    active: RwLock<HashMap<SessionId, Arc<RoundScheduler>>>,
}

impl SimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: SessionId, scheduler: Arc<RoundScheduler>) {
        self.active.write().insert(session, scheduler);
    }

    pub fn get(&self, session: SessionId) -> Option<Arc<RoundScheduler>> {
        self.active.read().get(&session).cloned()
    }

    pub fn remove(&self, session: SessionId) -> Option<Arc<RoundScheduler>> {
        self.active.write().remove(&session)
    }

    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerConfig;
    use market::Market;
    use store::{MemoryStore, Store};
    use traders::{StaticFeeds, StaticSentiment};

    #[test]
    fn test_insert_get_remove() {
        let registry = SimRegistry::new();
        let store = Arc::new(MemoryStore::new());
        let market = Arc::new(Market::new(store.clone() as Arc<dyn Store>));
        let session = SessionId::new();

        let scheduler = Arc::new(RoundScheduler::new(
            session,
            "q",
            store as Arc<dyn Store>,
            market,
            Arc::new(StaticSentiment::neutral()),
            Arc::new(StaticFeeds::new()),
            SchedulerConfig::default(),
        ));

        assert!(registry.get(session).is_none());
        registry.insert(session, scheduler);
        assert!(registry.get(session).is_some());
        assert_eq!(registry.len(), 1);
        registry.remove(session);
        assert!(registry.is_empty());
    }
}
