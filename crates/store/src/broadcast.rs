//! Topic pub/sub on row changes.
//!
//! Every store write fans out a [`RowEvent`] on the row's logical channel.
//! Live observers (the HTTP layer, tests) subscribe per channel and filter by
//! session id. Events are fire-and-forget: a lagging or absent subscriber
//! never blocks a writer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use types::SessionId;

/// Logical pub/sub channels, one per observable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    AgentLogs,
    Factors,
    Sessions,
    ForecasterResponses,
    OrderbookLive,
    Trades,
    TraderStateLive,
}

impl Channel {
    /// All channels the broadcaster carries.
    pub const ALL: [Channel; 7] = [
        Channel::AgentLogs,
        Channel::Factors,
        Channel::Sessions,
        Channel::ForecasterResponses,
        Channel::OrderbookLive,
        Channel::Trades,
        Channel::TraderStateLive,
    ];
}

/// A row change event published to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowEvent {
    pub channel: Channel,
    pub session_id: SessionId,
    /// The full row as JSON, matching the HTTP representation.
    pub payload: serde_json::Value,
}

/// Fan-out hub with one broadcast sender per channel.
pub struct Broadcaster {
    senders: HashMap<Channel, broadcast::Sender<RowEvent>>,
}

impl Broadcaster {
    /// Create a broadcaster with the given per-channel buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let senders = Channel::ALL
            .into_iter()
            .map(|c| (c, broadcast::channel(capacity).0))
            .collect();
        Self { senders }
    }

    /// Subscribe to one channel. The receiver sees events for all sessions;
    /// filter on `RowEvent::session_id`.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<RowEvent> {
        self.senders[&channel].subscribe()
    }

    /// Publish a row change. Serialization failures and missing subscribers
    /// are swallowed; observers are best-effort.
    pub fn publish<T: Serialize>(&self, channel: Channel, session_id: SessionId, row: &T) {
        let Ok(payload) = serde_json::to_value(row) else {
            return;
        };
        let _ = self.senders[&channel].send(RowEvent {
            channel,
            session_id,
            payload,
        });
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_receives_published_event() {
        let hub = Broadcaster::new(8);
        let mut rx = hub.subscribe(Channel::Trades);
        let session = SessionId::new();

        hub.publish(Channel::Trades, session, &serde_json::json!({"qty": 5}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, Channel::Trades);
        assert_eq!(event.session_id, session);
        assert_eq!(event.payload["qty"], 5);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let hub = Broadcaster::new(8);
        // Must not panic or error
        hub.publish(
            Channel::Sessions,
            SessionId::new(),
            &serde_json::json!({"ok": true}),
        );
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let hub = Broadcaster::new(8);
        let mut trades_rx = hub.subscribe(Channel::Trades);
        hub.publish(
            Channel::Sessions,
            SessionId::new(),
            &serde_json::json!({"x": 1}),
        );
        // Nothing on the trades channel
        assert!(matches!(
            trades_rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
