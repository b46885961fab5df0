//! Trade and order book snapshot types.

use crate::ids::{SessionId, Timestamp, TradeId};
use crate::money::{Cash, Price, Quantity};
use crate::trader::TraderName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A matched trade between a buyer and a seller.
///
/// Appended only by the matcher; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub session_id: SessionId,
    pub buyer_name: TraderName,
    pub seller_name: TraderName,
    /// Execution price: the resting ask's standing price.
    pub price: Price,
    pub quantity: Quantity,
    pub created_at: Timestamp,
}

impl Trade {
    /// Cash moved from buyer to seller.
    pub fn value(&self) -> Cash {
        Cash::for_trade(self.price, self.quantity)
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade[{}]: {} @ {} (buyer: {}, seller: {})",
            self.id, self.quantity, self.price, self.buyer_name, self.seller_name
        )
    }
}

/// A single aggregated price level in the order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: usize,
}

/// Snapshot of the order book for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BookSnapshot {
    /// Bid levels, best (highest) first.
    pub bids: Vec<BookLevel>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<BookLevel>,
    pub last_price: Option<Price>,
    pub spread: Option<i64>,
    /// Total contracts traded in this session.
    pub volume: u64,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price between best bid and ask, falling back to whichever side
    /// exists, then to the last trade.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.cents() + a.cents()) as f64 / 2.0),
            (Some(b), None) => Some(b.cents() as f64),
            (None, Some(a)) => Some(a.cents() as f64),
            (None, None) => self.last_price.map(|p| p.cents() as f64),
        }
    }
}
