//! Error types for order placement and market making.

use types::Price;

/// Errors surfaced by the matching engine and market-making primitive.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Price outside the probability domain `0..=100`.
    #[error("price {0} outside valid range 0..=100")]
    InvalidPrice(Price),

    /// Market-making quotes must satisfy `bid <= ask`.
    #[error("crossed quotes: bid {bid} > ask {ask}")]
    CrossedQuotes { bid: Price, ask: Price },

    /// Orders must be for at least one contract.
    #[error("order quantity must be at least 1")]
    ZeroQuantity,

    /// Persistence substrate failure during write-through.
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

pub type Result<T> = std::result::Result<T, MarketError>;
