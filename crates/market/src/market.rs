//! Session-keyed market facade.
//!
//! All book mutations for a session happen under that session's async mutex,
//! which serializes concurrent market-making calls — the substitute for
//! row-level `SKIP LOCKED` the contract allows. Every mutation is written
//! through to the [`Store`] while the lock is held, so observers never see a
//! half-applied cancel-place-match sequence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use store::Store;
use tokio::sync::Mutex;
use types::{
    BookSnapshot, Order, OrderId, OrderSide, Price, Quantity, SessionId, Trade, TraderName,
    TraderState,
};

use crate::error::{MarketError, Result};
use crate::matching::{match_session, touched_rows, MatchOutcome};
use crate::order_book::SessionBook;

/// Result of placing a single order.
#[derive(Debug, Clone)]
pub struct PlaceResult {
    pub order: Order,
    pub trades: Vec<Trade>,
}

/// Result of the atomic market-making replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmQuoteResult {
    /// Orders cancelled by the replace.
    pub cancelled: usize,
    pub bid_id: OrderId,
    pub ask_id: OrderId,
    pub trades_count: usize,
    /// Contracts traded by this invocation.
    pub volume: u64,
}

/// Continuous double-auction market over all sessions.
pub struct Market {
    books: parking_lot::RwLock<HashMap<SessionId, Arc<Mutex<SessionBook>>>>,
    store: Arc<dyn Store>,
}

impl Market {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            books: parking_lot::RwLock::new(HashMap::new()),
            store,
        }
    }

    fn book(&self, session: SessionId) -> Arc<Mutex<SessionBook>> {
        if let Some(book) = self.books.read().get(&session) {
            return Arc::clone(book);
        }
        let mut books = self.books.write();
        Arc::clone(
            books
                .entry(session)
                .or_insert_with(|| Arc::new(Mutex::new(SessionBook::new()))),
        )
    }

    /// Place one limit order and run matching to fixpoint.
    pub async fn place_order(
        &self,
        session: SessionId,
        trader: TraderName,
        side: OrderSide,
        price: Price,
        quantity: Quantity,
    ) -> Result<PlaceResult> {
        if quantity.is_zero() {
            return Err(MarketError::ZeroQuantity);
        }
        if !price.is_valid() {
            return Err(MarketError::InvalidPrice(price));
        }

        let book = self.book(session);
        let mut book = book.lock().await;

        let id = book.place(Order::new(session, trader, side, price, quantity))?;
        let outcome = match_session(session, &mut book);

        self.write_through(&book, &outcome, &[id]).await?;

        let order = book.order(id).cloned().expect("order just placed");
        Ok(PlaceResult {
            order,
            trades: outcome.trades,
        })
    }

    /// Atomic market-making primitive: cancel-all + place-two + match-all in
    /// one critical section.
    pub async fn place_mm_quotes(
        &self,
        session: SessionId,
        trader: TraderName,
        bid_price: Price,
        ask_price: Price,
        quantity: Quantity,
    ) -> Result<MmQuoteResult> {
        if quantity.is_zero() {
            return Err(MarketError::ZeroQuantity);
        }
        if !bid_price.is_valid() {
            return Err(MarketError::InvalidPrice(bid_price));
        }
        if !ask_price.is_valid() {
            return Err(MarketError::InvalidPrice(ask_price));
        }
        if bid_price > ask_price {
            return Err(MarketError::CrossedQuotes {
                bid: bid_price,
                ask: ask_price,
            });
        }

        let book = self.book(session);
        let mut book = book.lock().await;

        // 1. Cancel every active order of this trader.
        let cancelled_ids = book.cancel_all(trader);
        let cancelled = cancelled_ids.len();

        // 2. Insert the fresh two-sided quotes.
        let bid_id = book.place(Order::new(
            session,
            trader,
            OrderSide::Buy,
            bid_price,
            quantity,
        ))?;
        let ask_id = book.place(Order::new(
            session,
            trader,
            OrderSide::Sell,
            ask_price,
            quantity,
        ))?;

        // 3. Match to fixpoint.
        let outcome = match_session(session, &mut book);

        let mut extra = cancelled_ids;
        extra.push(bid_id);
        extra.push(ask_id);
        self.write_through(&book, &outcome, &extra).await?;

        tracing::debug!(
            %session,
            %trader,
            bid = %bid_price,
            ask = %ask_price,
            trades = outcome.trades_count(),
            "market-making quotes replaced"
        );

        Ok(MmQuoteResult {
            cancelled,
            bid_id,
            ask_id,
            trades_count: outcome.trades_count(),
            volume: outcome.volume(),
        })
    }

    /// Persist trades, mutated orders, and touched trader states.
    async fn write_through(
        &self,
        book: &SessionBook,
        outcome: &MatchOutcome,
        extra_orders: &[OrderId],
    ) -> Result<()> {
        let mut rows = touched_rows(book, outcome);
        for id in extra_orders {
            if !rows.iter().any(|o| o.id == *id) {
                if let Some(order) = book.order(*id) {
                    rows.push(order.clone());
                }
            }
        }
        for order in rows {
            self.store.upsert_order(order).await?;
        }
        for trade in &outcome.trades {
            self.store.insert_trade(trade.clone()).await?;
            for name in [trade.buyer_name, trade.seller_name] {
                if let Some(state) = book.state(name) {
                    self.store.upsert_trader_state(state.clone()).await?;
                }
            }
        }
        Ok(())
    }

    /// Depth snapshot of a session's book.
    pub async fn snapshot(&self, session: SessionId) -> BookSnapshot {
        let book = self.book(session);
        let book = book.lock().await;
        book.snapshot()
    }

    /// A trader's current ledger entry, if it has traded.
    pub async fn trader_state(
        &self,
        session: SessionId,
        name: TraderName,
    ) -> Option<TraderState> {
        let book = self.book(session);
        let book = book.lock().await;
        book.state(name).cloned()
    }

    /// Persist a trader's between-round notes without disturbing the ledger.
    ///
    /// Runs under the session lock so it cannot race the matcher's state
    /// writes.
    pub async fn update_trader_note(
        &self,
        session: SessionId,
        name: TraderName,
        note: String,
    ) -> Result<()> {
        let book = self.book(session);
        let mut book = book.lock().await;
        let state = book.state_mut(session, name);
        state.system_prompt = note;
        state.updated_at = types::now();
        let row = state.clone();
        self.store.upsert_trader_state(row).await?;
        Ok(())
    }

    /// Ensure ledger rows exist for the given traders (round-zero setup so
    /// observers see the full roster before the first fill).
    pub async fn ensure_traders(&self, session: SessionId, names: &[TraderName]) -> Result<()> {
        let book = self.book(session);
        let mut book = book.lock().await;
        for name in names {
            let state = book.state_mut(session, *name).clone();
            self.store.upsert_trader_state(state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;
    use types::OrderStatus;

    fn market() -> (Arc<MemoryStore>, Market) {
        let store = Arc::new(MemoryStore::new());
        let market = Market::new(store.clone() as Arc<dyn Store>);
        (store, market)
    }

    #[tokio::test]
    async fn test_place_order_rejects_zero_quantity() {
        let (_store, market) = market();
        let result = market
            .place_order(
                SessionId::new(),
                TraderName::Oliver,
                OrderSide::Buy,
                Price(50),
                Quantity(0),
            )
            .await;
        assert!(matches!(result, Err(MarketError::ZeroQuantity)));
    }

    #[tokio::test]
    async fn test_mm_quotes_precondition_checks() {
        let (_store, market) = market();
        let session = SessionId::new();

        let crossed = market
            .place_mm_quotes(session, TraderName::Oliver, Price(60), Price(40), Quantity(1))
            .await;
        assert!(matches!(crossed, Err(MarketError::CrossedQuotes { .. })));

        let bad_price = market
            .place_mm_quotes(session, TraderName::Oliver, Price(-5), Price(40), Quantity(1))
            .await;
        assert!(matches!(bad_price, Err(MarketError::InvalidPrice(_))));
    }

    #[tokio::test]
    async fn test_atomic_replace_scenario() {
        // Trader A holds bid@40/ask@60; book has B's ask@55.
        // Replace with (56, 58): old quotes cancelled, new bid crosses B's
        // ask at 55 for exactly one trade.
        let (store, market) = market();
        let session = SessionId::new();

        market
            .place_mm_quotes(session, TraderName::Balanced, Price(40), Price(60), Quantity(10))
            .await
            .unwrap();
        market
            .place_order(
                session,
                TraderName::Momentum,
                OrderSide::Sell,
                Price(55),
                Quantity(10),
            )
            .await
            .unwrap();

        let result = market
            .place_mm_quotes(session, TraderName::Balanced, Price(56), Price(58), Quantity(10))
            .await
            .unwrap();

        assert_eq!(result.cancelled, 2);
        assert_eq!(result.trades_count, 1);
        assert_eq!(result.volume, 10);

        let trades = store.trades(session).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, Price(55));
        assert_eq!(trades[0].buyer_name, TraderName::Balanced);
        assert_eq!(trades[0].seller_name, TraderName::Momentum);

        let orders = store.orders(session).await.unwrap();
        let bid = orders.iter().find(|o| o.id == result.bid_id).unwrap();
        let ask = orders.iter().find(|o| o.id == result.ask_id).unwrap();
        assert_eq!(bid.status, OrderStatus::Filled);
        assert_eq!(ask.status, OrderStatus::Open);

        // Exactly two cancelled rows from the replace.
        let cancelled = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Cancelled)
            .count();
        assert_eq!(cancelled, 2);
    }

    #[tokio::test]
    async fn test_mm_idempotent_against_empty_peer_book() {
        let (_store, market) = market();
        let session = SessionId::new();

        market
            .place_mm_quotes(session, TraderName::Oliver, Price(45), Price(55), Quantity(10))
            .await
            .unwrap();
        let snap_once = market.snapshot(session).await;

        market
            .place_mm_quotes(session, TraderName::Oliver, Price(45), Price(55), Quantity(10))
            .await
            .unwrap();
        let snap_twice = market.snapshot(session).await;

        // Same final book shape: one bid level, one ask level, same depth.
        assert_eq!(snap_once.bids, snap_twice.bids);
        assert_eq!(snap_once.asks, snap_twice.asks);
        assert_eq!(snap_twice.bids[0].quantity, Quantity(10));
        assert_eq!(snap_twice.asks[0].quantity, Quantity(10));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_trades() {
        let (_store, market) = market();
        let session = SessionId::new();

        market
            .place_order(
                session,
                TraderName::Momentum,
                OrderSide::Sell,
                Price(60),
                Quantity(10),
            )
            .await
            .unwrap();
        let result = market
            .place_order(
                session,
                TraderName::Oliver,
                OrderSide::Buy,
                Price(60),
                Quantity(4),
            )
            .await
            .unwrap();
        assert_eq!(result.trades.len(), 1);

        let snap = market.snapshot(session).await;
        assert_eq!(snap.last_price, Some(Price(60)));
        assert_eq!(snap.volume, 4);
        assert_eq!(snap.asks[0].quantity, Quantity(6));
        assert!(snap.bids.is_empty());
    }

    #[tokio::test]
    async fn test_trader_note_survives_fills() {
        let (store, market) = market();
        let session = SessionId::new();

        market
            .update_trader_note(session, TraderName::Oliver, "watching the spread".into())
            .await
            .unwrap();

        market
            .place_order(
                session,
                TraderName::Momentum,
                OrderSide::Sell,
                Price(50),
                Quantity(5),
            )
            .await
            .unwrap();
        market
            .place_order(
                session,
                TraderName::Oliver,
                OrderSide::Buy,
                Price(50),
                Quantity(5),
            )
            .await
            .unwrap();

        let state = store
            .trader_state(session, TraderName::Oliver)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.system_prompt, "watching the spread");
        assert_eq!(state.position, 5);
    }
}
