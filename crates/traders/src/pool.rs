//! Assembly of the full 18-trader pool for a session.

use std::collections::HashMap;
use std::sync::Arc;

use types::{ForecasterClass, TraderName, TraderType};

use crate::fundamental::FundamentalTrader;
use crate::noise::{NoiseConfig, NoiseTrader, SentimentProvider};
use crate::user::{AccountFeedProvider, UserTrader, UserTraderConfig};
use crate::Trader;

/// Seed probabilities from the pipeline's synthesis phase, per personality.
#[derive(Debug, Clone, Default)]
pub struct SeedBeliefs {
    beliefs: HashMap<ForecasterClass, (f64, f64)>,
}

impl SeedBeliefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ForecasterClass, probability: f64, confidence: f64) {
        self.beliefs.insert(class, (probability, confidence));
    }

    /// Seed for a personality; absent classes fall back to even odds at low
    /// confidence so the pool always fields all 18 identities.
    pub fn for_class(&self, class: ForecasterClass) -> (f64, f64) {
        self.beliefs.get(&class).copied().unwrap_or((0.5, 0.3))
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }
}

fn class_for(name: TraderName) -> ForecasterClass {
    match name {
        TraderName::Conservative => ForecasterClass::Conservative,
        TraderName::Momentum => ForecasterClass::Momentum,
        TraderName::Historical => ForecasterClass::Historical,
        TraderName::Balanced => ForecasterClass::Balanced,
        TraderName::Realtime => ForecasterClass::Realtime,
        other => unreachable!("{other} is not a fundamental identity"),
    }
}

/// Build the fixed pool of 18 traders: 5 fundamental, 9 noise, 4 user.
pub fn build_pool(
    seeds: &SeedBeliefs,
    sentiment: Arc<dyn SentimentProvider>,
    feeds: Arc<dyn AccountFeedProvider>,
) -> Vec<Box<dyn Trader>> {
    TraderName::ALL
        .into_iter()
        .map(|name| -> Box<dyn Trader> {
            match name.trader_type() {
                TraderType::Fundamental => {
                    let (probability, confidence) = seeds.for_class(class_for(name));
                    Box::new(FundamentalTrader::new(name, probability, confidence))
                }
                TraderType::Noise => Box::new(NoiseTrader::new(
                    name,
                    Arc::clone(&sentiment),
                    NoiseConfig::default(),
                )),
                TraderType::User => Box::new(UserTrader::new(
                    name,
                    Arc::clone(&feeds),
                    UserTraderConfig::default(),
                )),
            }
        })
        .collect()
}
