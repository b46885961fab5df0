//! Price-time priority matching over a session book.
//!
//! The loop runs the whole session to fixpoint: take the best active bid,
//! find the best ask at or below it that is not the bidder's own, execute at
//! the ask's standing price, repeat. Stops when either side runs out of
//! eligible orders.

use types::{Cash, Order, OrderId, Quantity, SessionId, Trade, TradeId};

use crate::order_book::SessionBook;

/// Outcome of one matching invocation.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Trades produced, in execution order.
    pub trades: Vec<Trade>,
    /// Ids of orders whose fill state changed.
    pub touched_orders: Vec<OrderId>,
}

impl MatchOutcome {
    pub fn trades_count(&self) -> usize {
        self.trades.len()
    }

    /// Total contracts traded across all fills.
    pub fn volume(&self) -> u64 {
        self.trades.iter().map(|t| t.quantity.raw()).sum()
    }
}

/// Run the matching loop to fixpoint for one session.
///
/// Applies trader-state deltas (position and cash) and re-marks pnl against
/// the latest trade price for the two parties of every fill.
pub fn match_session(session: SessionId, book: &mut SessionBook) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    loop {
        let Some(bid_id) = book.best_bid() else {
            break;
        };
        let (bid_price, bid_trader, bid_remaining) = {
            let bid = book.order(bid_id).expect("bid exists");
            (bid.price, bid.trader_name, bid.remaining())
        };

        let Some(ask_id) = book.best_eligible_ask(bid_price, bid_trader) else {
            break;
        };
        let (ask_price, ask_trader, ask_remaining) = {
            let ask = book.order(ask_id).expect("ask exists");
            (ask.price, ask.trader_name, ask.remaining())
        };

        let fill = bid_remaining.min(ask_remaining);
        debug_assert!(!fill.is_zero());
        // Resting ask sets the execution price.
        let exec_price = ask_price;

        let trade = Trade {
            id: TradeId::new(),
            session_id: session,
            buyer_name: bid_trader,
            seller_name: ask_trader,
            price: exec_price,
            quantity: fill,
            created_at: types::now(),
        };

        advance_fill(book, bid_id, fill);
        advance_fill(book, ask_id, fill);

        book.set_last_price(exec_price);
        book.add_volume(fill);

        apply_state_deltas(session, book, &trade);

        tracing::debug!(
            buyer = %trade.buyer_name,
            seller = %trade.seller_name,
            price = %trade.price,
            quantity = %trade.quantity,
            "trade executed"
        );

        outcome.touched_orders.push(bid_id);
        outcome.touched_orders.push(ask_id);
        outcome.trades.push(trade);
    }

    outcome.touched_orders.sort();
    outcome.touched_orders.dedup();
    outcome
}

fn advance_fill(book: &mut SessionBook, id: OrderId, fill: Quantity) {
    if let Some(order) = book.order_mut(id) {
        order.fill(fill);
    }
}

/// Buyer gains contracts and pays; seller mirrors. Cash deltas cancel
/// exactly because both legs use the same integer cent value.
fn apply_state_deltas(session: SessionId, book: &mut SessionBook, trade: &Trade) {
    let cost = Cash::for_trade(trade.price, trade.quantity);
    let last = book.last_price();

    let buyer = book.state_mut(session, trade.buyer_name);
    buyer.position += trade.quantity.raw() as i64;
    buyer.cash -= cost;
    buyer.mark_pnl(last);
    buyer.updated_at = trade.created_at;

    let seller = book.state_mut(session, trade.seller_name);
    seller.position -= trade.quantity.raw() as i64;
    seller.cash += cost;
    seller.mark_pnl(last);
    seller.updated_at = trade.created_at;
}

/// Collect the order rows touched by an outcome for store write-through.
pub fn touched_rows(book: &SessionBook, outcome: &MatchOutcome) -> Vec<Order> {
    outcome
        .touched_orders
        .iter()
        .filter_map(|id| book.order(*id).cloned())
        .collect()
}
