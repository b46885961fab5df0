//! The 18 trader identities and their decision logic.
//!
//! Every trader implements [`Trader`]: given the pre-round market snapshot
//! and its own ledger state, it decides a two-sided quote (or sits out).
//! External signals arrive through the opaque [`SentimentProvider`] and
//! [`AccountFeedProvider`] seams.

pub mod fundamental;
pub mod noise;
pub mod pool;
pub mod quotes;
pub mod user;

pub use fundamental::FundamentalTrader;
pub use noise::{NoiseTrader, SentimentProvider, StaticSentiment};
pub use pool::{build_pool, SeedBeliefs};
pub use quotes::{BeliefQuoter, QuoterConfig};
pub use user::{AccountFeed, AccountFeedProvider, StaticFeeds, UserTrader};

use async_trait::async_trait;
use types::{BookSnapshot, Price, Quantity, TraderName, TraderState, TraderType};

/// What a trader sees when deciding: the pre-round snapshot and its own
/// state. Traders never observe each other's current-round quotes.
#[derive(Debug, Clone)]
pub struct RoundContext {
    pub round_number: u64,
    pub question_text: String,
    pub snapshot: BookSnapshot,
    /// The trader's ledger entry, if it has traded before.
    pub state: Option<TraderState>,
}

impl RoundContext {
    /// Current inventory (0 before the first fill).
    pub fn position(&self) -> i64 {
        self.state.as_ref().map(|s| s.position).unwrap_or(0)
    }

    /// Notes persisted from previous rounds.
    pub fn notes(&self) -> &str {
        self.state
            .as_ref()
            .map(|s| s.system_prompt.as_str())
            .unwrap_or("")
    }

    /// Market reference price in cents: mid, then last trade, then even
    /// odds.
    pub fn reference_price(&self) -> f64 {
        self.snapshot.mid_price().unwrap_or(50.0)
    }
}

/// A two-sided quote for the atomic market-making replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteDecision {
    pub bid: Price,
    pub ask: Price,
    pub quantity: Quantity,
}

/// One of the 18 persistent trading identities.
#[async_trait]
pub trait Trader: Send + Sync {
    fn name(&self) -> TraderName;

    fn trader_type(&self) -> TraderType {
        self.name().trader_type()
    }

    /// Decide this round's quotes from the pre-round snapshot. `None` sits
    /// the round out (e.g. position cap reached, no signal).
    async fn decide(&mut self, ctx: &RoundContext) -> Option<QuoteDecision>;

    /// Notes to persist for the next round.
    fn note(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_context_defaults() {
        let ctx = RoundContext {
            round_number: 1,
            question_text: "Will X happen?".into(),
            snapshot: BookSnapshot::default(),
            state: None,
        };
        assert_eq!(ctx.position(), 0);
        assert_eq!(ctx.notes(), "");
        assert_eq!(ctx.reference_price(), 50.0);
    }
}
