//! User-tracking traders: each follows one external account's posts.
//!
//! The feed arrives through the opaque [`AccountFeedProvider`] seam: recent
//! posts plus the provider's stance reading in `[-1, 1]`. The trader leans
//! its quotes by the stance and records what it saw in its notes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use types::TraderName;

use crate::quotes::{BeliefQuoter, QuoterConfig};
use crate::{QuoteDecision, RoundContext, Trader};

/// A tracked account's recent activity.
#[derive(Debug, Clone, Default)]
pub struct AccountFeed {
    pub posts: Vec<String>,
    /// Provider-computed stance toward YES, in `[-1, 1]`.
    pub stance: f64,
}

/// Opaque source of a tracked account's latest posts.
#[async_trait]
pub trait AccountFeedProvider: Send + Sync {
    async fn latest(&self, handle: &str) -> AccountFeed;
}

/// Fixed feeds (the default when no live feed is wired in).
#[derive(Default)]
pub struct StaticFeeds {
    feeds: HashMap<String, AccountFeed>,
}

impl StaticFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, handle: impl Into<String>, feed: AccountFeed) -> Self {
        self.feeds.insert(handle.into(), feed);
        self
    }
}

#[async_trait]
impl AccountFeedProvider for StaticFeeds {
    async fn latest(&self, handle: &str) -> AccountFeed {
        self.feeds.get(handle).cloned().unwrap_or_default()
    }
}

/// Configuration for user-tracking traders.
#[derive(Debug, Clone)]
pub struct UserTraderConfig {
    /// Maximum lean off the market reference, in cents.
    pub max_lean_cents: f64,
    pub confidence: f64,
    pub quoter: QuoterConfig,
}

impl Default for UserTraderConfig {
    fn default() -> Self {
        Self {
            max_lean_cents: 8.0,
            confidence: 0.5,
            quoter: QuoterConfig {
                default_quantity: 5,
                ..QuoterConfig::default()
            },
        }
    }
}

/// A trader that mirrors one tracked account.
pub struct UserTrader {
    name: TraderName,
    provider: Arc<dyn AccountFeedProvider>,
    config: UserTraderConfig,
    last_feed_size: usize,
    last_stance: f64,
}

impl UserTrader {
    pub fn new(
        name: TraderName,
        provider: Arc<dyn AccountFeedProvider>,
        config: UserTraderConfig,
    ) -> Self {
        debug_assert_eq!(name.trader_type(), types::TraderType::User);
        Self {
            name,
            provider,
            config,
            last_feed_size: 0,
            last_stance: 0.0,
        }
    }
}

#[async_trait]
impl Trader for UserTrader {
    fn name(&self) -> TraderName {
        self.name
    }

    async fn decide(&mut self, ctx: &RoundContext) -> Option<QuoteDecision> {
        let feed = self.provider.latest(self.name.as_str()).await;
        self.last_feed_size = feed.posts.len();
        self.last_stance = feed.stance.clamp(-1.0, 1.0);

        // No posts yet: nothing to mirror, sit the round out.
        if feed.posts.is_empty() {
            return None;
        }

        let fair =
            (ctx.reference_price() + self.last_stance * self.config.max_lean_cents) / 100.0;
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
        Some(format!(
            "{} posts seen, stance {:+.2}",
            self.last_feed_size, self.last_stance
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::BookSnapshot;

    fn ctx() -> RoundContext {
        RoundContext {
            round_number: 1,
            question_text: "q".into(),
            snapshot: BookSnapshot {
                last_price: Some(types::Price(50)),
                ..Default::default()
            },
            state: None,
        }
    }

    #[tokio::test]
    async fn test_empty_feed_sits_out() {
        let provider = Arc::new(StaticFeeds::new());
        let mut trader = UserTrader::new(
            TraderName::Oliver,
            provider,
            UserTraderConfig::default(),
        );
        assert!(trader.decide(&ctx()).await.is_none());
    }

    #[tokio::test]
    async fn test_stance_leans_quotes() {
        let provider = Arc::new(
            StaticFeeds::new()
                .with_feed(
                    "oliver",
                    AccountFeed {
                        posts: vec!["this is definitely happening".into()],
                        stance: 1.0,
                    },
                )
                .with_feed(
                    "owen",
                    AccountFeed {
                        posts: vec!["no chance".into()],
                        stance: -1.0,
                    },
                ),
        );
        let mut bullish = UserTrader::new(
            TraderName::Oliver,
            provider.clone(),
            UserTraderConfig::default(),
        );
        let mut bearish =
            UserTrader::new(TraderName::Owen, provider, UserTraderConfig::default());

        let up = bullish.decide(&ctx()).await.unwrap();
        let down = bearish.decide(&ctx()).await.unwrap();
        assert!(up.bid > down.bid);
    }

    #[tokio::test]
    async fn test_note_summarizes_feed() {
        let provider = Arc::new(StaticFeeds::new().with_feed(
            "skylar",
            AccountFeed {
                posts: vec!["a".into(), "b".into()],
                stance: 0.5,
            },
        ));
        let mut trader = UserTrader::new(
            TraderName::Skylar,
            provider,
            UserTraderConfig::default(),
        );
        trader.decide(&ctx()).await;
        assert_eq!(trader.note().unwrap(), "2 posts seen, stance +0.50");
    }
}
