//! Fundamental traders: one per forecaster personality.
//!
//! Each is seeded with its personality's synthesized probability and
//! confidence, quotes around that belief, and drifts toward the market at a
//! personality-specific rate (the conservative analyst barely moves; the
//! realtime reactor chases).

use async_trait::async_trait;
use types::TraderName;

use crate::quotes::{BeliefQuoter, QuoterConfig};
use crate::{QuoteDecision, RoundContext, Trader};

/// How strongly each personality adopts the market price per round.
fn adaptation_rate(name: TraderName) -> f64 {
    match name {
        TraderName::Conservative => 0.02,
        TraderName::Historical => 0.05,
        TraderName::Balanced => 0.10,
        TraderName::Momentum => 0.30,
        TraderName::Realtime => 0.40,
        // Non-fundamental identities never construct this trader.
        _ => 0.10,
    }
}

/// A fundamentals-only trader seeded by the pipeline's synthesis output.
pub struct FundamentalTrader {
    name: TraderName,
    quoter: BeliefQuoter,
    last_round: u64,
}

impl FundamentalTrader {
    /// Build from a personality's seed probability and confidence.
    pub fn new(name: TraderName, probability: f64, confidence: f64) -> Self {
        debug_assert_eq!(name.trader_type(), types::TraderType::Fundamental);
        Self {
            name,
            quoter: BeliefQuoter::new(probability, confidence, QuoterConfig::default()),
            last_round: 0,
        }
    }

    /// Current belief in cents (for tests and notes).
    pub fn belief(&self) -> f64 {
        self.quoter.belief()
    }
}

#[async_trait]
impl Trader for FundamentalTrader {
    fn name(&self) -> TraderName {
        self.name
    }

    async fn decide(&mut self, ctx: &RoundContext) -> Option<QuoteDecision> {
        self.last_round = ctx.round_number;

        // Drift toward the observed market once there is one.
        if ctx.snapshot.mid_price().is_some() || ctx.snapshot.last_price.is_some() {
            self.quoter
                .update_belief(ctx.reference_price(), adaptation_rate(self.name));
        }

        let inventory = ctx.position();
        let quantity = self.quoter.size(inventory)?;
        let (bid, ask) = self.quoter.quotes(inventory);
        Some(QuoteDecision {
            bid,
            ask,
            quantity,
        })
    }

    fn note(&self) -> Option<String> {
        Some(format!(
            "round {}: belief {:.1}¢",
            self.last_round,
            self.quoter.belief()
        ))
    }
}
