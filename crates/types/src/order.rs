//! Order types for the probability market.

use crate::ids::{OrderId, SessionId, Timestamp};
use crate::money::{Price, Quantity};
use crate::trader::TraderName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the market the order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Status of an order in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Terminal orders can never fill again.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

/// A limit order on the probability of YES.
///
/// Buy at 60 = "I'll pay 60 cents, betting probability > 60%".
/// Sell at 60 = "I'll take 60 cents, betting probability < 60%".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub session_id: SessionId,
    pub trader_name: TraderName,
    pub side: OrderSide,
    /// Whole cents, `0..=100`.
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    /// Book arrival sequence; breaks price ties (earliest first).
    pub seq: u64,
}

impl Order {
    /// Create a new open order. The book assigns `seq` on placement.
    pub fn new(
        session_id: SessionId,
        trader_name: TraderName,
        side: OrderSide,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id: OrderId::new(),
            session_id,
            trader_name,
            side,
            price,
            quantity,
            filled_quantity: Quantity::ZERO,
            status: OrderStatus::Open,
            created_at: crate::ids::now(),
            seq: 0,
        }
    }

    /// Unfilled contracts remaining.
    pub fn remaining(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    /// Whether the order can still participate in matching.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal() && !self.remaining().is_zero()
    }

    /// Record a fill of `qty` contracts, updating status.
    pub fn fill(&mut self, qty: Quantity) {
        self.filled_quantity += qty;
        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Cancel the order; no further fills are possible.
    pub fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_order(side: OrderSide, price: i64, qty: u64) -> Order {
        Order::new(
            SessionId::new(),
            TraderName::Balanced,
            side,
            Price(price),
            Quantity(qty),
        )
    }

    #[test]
    fn test_new_order_is_open() {
        let o = make_order(OrderSide::Buy, 60, 10);
        assert_eq!(o.status, OrderStatus::Open);
        assert_eq!(o.remaining(), Quantity(10));
        assert!(o.is_active());
    }

    #[test]
    fn test_partial_then_full_fill() {
        let mut o = make_order(OrderSide::Sell, 55, 10);
        o.fill(Quantity(4));
        assert_eq!(o.status, OrderStatus::PartiallyFilled);
        assert_eq!(o.remaining(), Quantity(6));
        o.fill(Quantity(6));
        assert_eq!(o.status, OrderStatus::Filled);
        assert!(!o.is_active());
    }

    #[test]
    fn test_cancelled_not_active() {
        let mut o = make_order(OrderSide::Buy, 40, 5);
        o.cancel();
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert!(!o.is_active());
        assert_eq!(o.remaining(), Quantity(5));
    }

    #[test]
    fn test_filled_iff_filled_quantity_equals_quantity() {
        let mut o = make_order(OrderSide::Buy, 50, 3);
        o.fill(Quantity(3));
        assert_eq!(o.status, OrderStatus::Filled);
        assert_eq!(o.filled_quantity, o.quantity);
    }
}
