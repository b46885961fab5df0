//! Noise traders: sphere-flavored sentiment followers.
//!
//! Each of the nine spheres reads an opaque sentiment score in `[-1, 1]`
//! and leans its fair value off the market reference by up to
//! `max_lean_cents`. They provide churn and directional flow, not insight.

use async_trait::async_trait;
use std::collections::HashMap;
use types::TraderName;

use crate::quotes::{BeliefQuoter, QuoterConfig};
use crate::{QuoteDecision, RoundContext, Trader};

/// Opaque sentiment source, sampled per sphere each round.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    /// Score in `[-1, 1]`; positive means the sphere leans YES.
    async fn sample(&self, sphere: TraderName) -> f64;
}

/// Fixed per-sphere scores (the default when no live signal is wired in).
pub struct StaticSentiment {
    scores: HashMap<TraderName, f64>,
    fallback: f64,
}

impl StaticSentiment {
    pub fn neutral() -> Self {
        Self {
            scores: HashMap::new(),
            fallback: 0.0,
        }
    }

    pub fn with_score(mut self, sphere: TraderName, score: f64) -> Self {
        self.scores.insert(sphere, score);
        self
    }
}

#[async_trait]
impl SentimentProvider for StaticSentiment {
    async fn sample(&self, sphere: TraderName) -> f64 {
        self.scores.get(&sphere).copied().unwrap_or(self.fallback)
    }
}

/// Configuration for noise trader behavior.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// Maximum lean off the market reference, in cents.
    pub max_lean_cents: f64,
    /// Confidence stand-in controlling quote width.
    pub confidence: f64,
    pub quoter: QuoterConfig,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            max_lean_cents: 10.0,
            confidence: 0.4,
            quoter: QuoterConfig {
                default_quantity: 5,
                ..QuoterConfig::default()
            },
        }
    }
}

/// A sentiment-following trader for one sphere.
pub struct NoiseTrader {
    sphere: TraderName,
    provider: std::sync::Arc<dyn SentimentProvider>,
    config: NoiseConfig,
    last_score: f64,
}

impl NoiseTrader {
    pub fn new(
        sphere: TraderName,
        provider: std::sync::Arc<dyn SentimentProvider>,
        config: NoiseConfig,
    ) -> Self {
        debug_assert_eq!(sphere.trader_type(), types::TraderType::Noise);
        Self {
            sphere,
            provider,
            config,
            last_score: 0.0,
        }
    }
}

#[async_trait]
impl Trader for NoiseTrader {
    fn name(&self) -> TraderName {
        self.sphere
    }

    async fn decide(&mut self, ctx: &RoundContext) -> Option<QuoteDecision> {
        let score = self.provider.sample(self.sphere).await.clamp(-1.0, 1.0);
        self.last_score = score;

        let reference = ctx.reference_price();
        let fair = (reference + score * self.config.max_lean_cents) / 100.0;

        let quoter =
            BeliefQuoter::new(fair, self.config.confidence, self.config.quoter.clone());

        let inventory = ctx.position();
        let quantity = quoter.size(inventory)?;
        let (bid, ask) = quoter.quotes(inventory);
        Some(QuoteDecision {
            bid,
            ask,
            quantity,
        })
    }

    fn note(&self) -> Option<String> {
        Some(format!("sentiment {:+.2}", self.last_score))
    }
}
