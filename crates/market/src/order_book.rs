//! Per-session order book using `BTreeMap` price levels.
//!
//! Bids iterate highest price first, asks lowest first. Within a level,
//! orders queue in arrival order (`seq` ascending), giving price-time
//! priority. Orders live in a side table; levels hold ids, and inactive ids
//! are dropped lazily during traversal.

use std::collections::{BTreeMap, HashMap, VecDeque};

use types::{
    BookLevel, BookSnapshot, Order, OrderId, OrderSide, Price, Quantity, SessionId, TraderName,
    TraderState,
};

use crate::error::{MarketError, Result};

/// Order book and trader-state ledger for a single session.
#[derive(Debug, Default)]
pub struct SessionBook {
    /// Buy levels; best bid = highest key.
    bids: BTreeMap<i64, VecDeque<OrderId>>,
    /// Sell levels; best ask = lowest key.
    asks: BTreeMap<i64, VecDeque<OrderId>>,
    /// All orders ever placed in this session, by id.
    orders: HashMap<OrderId, Order>,
    /// Trader ledgers, created on first touch.
    states: HashMap<TraderName, TraderState>,
    /// Arrival sequence counter; breaks price ties.
    next_seq: u64,
    /// Last trade price.
    last_price: Option<Price>,
    /// Total contracts traded.
    volume: u64,
}

impl SessionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a validated order into the book. Matching is a separate step.
    pub fn place(&mut self, mut order: Order) -> Result<OrderId> {
        if order.quantity.is_zero() {
            return Err(MarketError::ZeroQuantity);
        }
        if !order.price.is_valid() {
            return Err(MarketError::InvalidPrice(order.price));
        }

        order.seq = self.next_seq;
        self.next_seq += 1;

        let id = order.id;
        let side = match order.side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        };
        side.entry(order.price.cents()).or_default().push_back(id);
        self.orders.insert(id, order);
        Ok(id)
    }

    /// Cancel every active order belonging to `trader`. Returns the ids that
    /// were cancelled.
    pub fn cancel_all(&mut self, trader: TraderName) -> Vec<OrderId> {
        let ids: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| o.trader_name == trader && o.is_active())
            .map(|o| o.id)
            .collect();
        for id in &ids {
            if let Some(order) = self.orders.get_mut(id) {
                order.cancel();
            }
        }
        ids
    }

    /// Best active bid id, honoring price-time priority.
    pub fn best_bid(&mut self) -> Option<OrderId> {
        Self::best_in(&mut self.bids, &self.orders, true)
    }

    /// Best active ask priced at or below `limit` whose owner is not
    /// `exclude`. Skips (without consuming) same-trader asks so the next
    /// eligible one can match.
    pub fn best_eligible_ask(&mut self, limit: Price, exclude: TraderName) -> Option<OrderId> {
        // Prune dead ids level by level, then scan for eligibility.
        let mut empty_levels = Vec::new();
        let mut found = None;

        'levels: for (&price, queue) in self.asks.iter_mut() {
            if price > limit.cents() {
                break;
            }
            // Drop inactive ids from the front so FIFO stays meaningful.
            while let Some(front) = queue.front() {
                match self.orders.get(front) {
                    Some(o) if o.is_active() => break,
                    _ => {
                        queue.pop_front();
                    }
                }
            }
            if queue.is_empty() {
                empty_levels.push(price);
                continue;
            }
            for id in queue.iter() {
                if let Some(o) = self.orders.get(id) {
                    if o.is_active() && o.trader_name != exclude {
                        found = Some(*id);
                        break 'levels;
                    }
                }
            }
        }

        for price in empty_levels {
            self.asks.remove(&price);
        }
        found
    }

    fn best_in(
        levels: &mut BTreeMap<i64, VecDeque<OrderId>>,
        orders: &HashMap<OrderId, Order>,
        highest_first: bool,
    ) -> Option<OrderId> {
        let mut empty_levels = Vec::new();
        let mut found = None;

        let keys: Vec<i64> = if highest_first {
            levels.keys().rev().copied().collect()
        } else {
            levels.keys().copied().collect()
        };

        for price in keys {
            let queue = levels.get_mut(&price).expect("level exists");
            while let Some(front) = queue.front() {
                match orders.get(front) {
                    Some(o) if o.is_active() => break,
                    _ => {
                        queue.pop_front();
                    }
                }
            }
            if queue.is_empty() {
                empty_levels.push(price);
                continue;
            }
            found = queue.front().copied();
            break;
        }

        for price in empty_levels {
            levels.remove(&price);
        }
        found
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    /// Ledger entry for a trader, created on first touch.
    pub fn state_mut(&mut self, session: SessionId, name: TraderName) -> &mut TraderState {
        self.states
            .entry(name)
            .or_insert_with(|| TraderState::new(session, name))
    }

    pub fn state(&self, name: TraderName) -> Option<&TraderState> {
        self.states.get(&name)
    }

    pub fn states(&self) -> impl Iterator<Item = &TraderState> {
        self.states.values()
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    pub fn set_last_price(&mut self, price: Price) {
        self.last_price = Some(price);
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    pub fn add_volume(&mut self, quantity: Quantity) {
        self.volume += quantity.raw();
    }

    /// Aggregate active orders into a depth snapshot.
    pub fn snapshot(&self) -> BookSnapshot {
        let aggregate = |levels: &BTreeMap<i64, VecDeque<OrderId>>, descending: bool| {
            let mut out: Vec<BookLevel> = Vec::new();
            let keys: Vec<i64> = if descending {
                levels.keys().rev().copied().collect()
            } else {
                levels.keys().copied().collect()
            };
            for price in keys {
                let mut quantity = Quantity::ZERO;
                let mut order_count = 0;
                for id in &levels[&price] {
                    if let Some(o) = self.orders.get(id) {
                        if o.is_active() {
                            quantity += o.remaining();
                            order_count += 1;
                        }
                    }
                }
                if order_count > 0 {
                    out.push(BookLevel {
                        price: Price(price),
                        quantity,
                        order_count,
                    });
                }
            }
            out
        };

        let bids = aggregate(&self.bids, true);
        let asks = aggregate(&self.asks, false);
        let spread = match (bids.first(), asks.first()) {
            (Some(b), Some(a)) => Some(a.price.cents() - b.price.cents()),
            _ => None,
        };

        BookSnapshot {
            bids,
            asks,
            last_price: self.last_price,
            spread,
            volume: self.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(trader: TraderName, side: OrderSide, price: i64, qty: u64) -> Order {
        Order::new(
            SessionId::new(),
            trader,
            side,
            Price(price),
            types::Quantity(qty),
        )
    }

    #[test]
    fn test_place_assigns_increasing_seq() {
        let mut book = SessionBook::new();
        let a = book
            .place(order(TraderName::Oliver, OrderSide::Buy, 50, 5))
            .unwrap();
        let b = book
            .place(order(TraderName::Owen, OrderSide::Buy, 50, 5))
            .unwrap();
        assert!(book.order(a).unwrap().seq < book.order(b).unwrap().seq);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut book = SessionBook::new();
        let result = book.place(order(TraderName::Oliver, OrderSide::Buy, 50, 0));
        assert!(matches!(result, Err(MarketError::ZeroQuantity)));
    }

    #[test]
    fn test_out_of_range_price_rejected() {
        let mut book = SessionBook::new();
        let result = book.place(order(TraderName::Oliver, OrderSide::Buy, 101, 5));
        assert!(matches!(result, Err(MarketError::InvalidPrice(_))));
        let result = book.place(order(TraderName::Oliver, OrderSide::Sell, -1, 5));
        assert!(matches!(result, Err(MarketError::InvalidPrice(_))));
    }

    #[test]
    fn test_best_bid_is_highest_then_earliest() {
        let mut book = SessionBook::new();
        book.place(order(TraderName::Oliver, OrderSide::Buy, 40, 5))
            .unwrap();
        let first_at_60 = book
            .place(order(TraderName::Owen, OrderSide::Buy, 60, 5))
            .unwrap();
        book.place(order(TraderName::Skylar, OrderSide::Buy, 60, 5))
            .unwrap();

        assert_eq!(book.best_bid(), Some(first_at_60));
    }

    #[test]
    fn test_best_eligible_ask_skips_self() {
        let mut book = SessionBook::new();
        let own = book
            .place(order(TraderName::Oliver, OrderSide::Sell, 50, 5))
            .unwrap();
        let other = book
            .place(order(TraderName::Owen, OrderSide::Sell, 55, 5))
            .unwrap();

        // Oliver's own ask at 50 is skipped; Owen's at 55 is eligible.
        let eligible = book.best_eligible_ask(Price(60), TraderName::Oliver);
        assert_eq!(eligible, Some(other));

        // For another trader, the cheaper ask wins.
        let eligible = book.best_eligible_ask(Price(60), TraderName::Skylar);
        assert_eq!(eligible, Some(own));
    }

    #[test]
    fn test_best_eligible_ask_respects_limit() {
        let mut book = SessionBook::new();
        book.place(order(TraderName::Oliver, OrderSide::Sell, 70, 5))
            .unwrap();
        assert_eq!(book.best_eligible_ask(Price(60), TraderName::Owen), None);
    }

    #[test]
    fn test_cancel_all_only_touches_trader() {
        let mut book = SessionBook::new();
        book.place(order(TraderName::Oliver, OrderSide::Buy, 40, 5))
            .unwrap();
        book.place(order(TraderName::Oliver, OrderSide::Sell, 60, 5))
            .unwrap();
        let other = book
            .place(order(TraderName::Owen, OrderSide::Sell, 55, 5))
            .unwrap();

        let cancelled = book.cancel_all(TraderName::Oliver);
        assert_eq!(cancelled.len(), 2);
        assert!(book.order(other).unwrap().is_active());
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_snapshot_aggregates_levels() {
        let mut book = SessionBook::new();
        book.place(order(TraderName::Oliver, OrderSide::Buy, 58, 10))
            .unwrap();
        book.place(order(TraderName::Owen, OrderSide::Buy, 58, 5))
            .unwrap();
        book.place(order(TraderName::Skylar, OrderSide::Sell, 62, 7))
            .unwrap();

        let snap = book.snapshot();
        assert_eq!(snap.bids.len(), 1);
        assert_eq!(snap.bids[0].quantity, types::Quantity(15));
        assert_eq!(snap.bids[0].order_count, 2);
        assert_eq!(snap.asks[0].price, Price(62));
        assert_eq!(snap.spread, Some(4));
    }
}
