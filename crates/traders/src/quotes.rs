//! Belief-driven two-sided quote derivation.
//!
//! Adapts the Avellaneda-Stoikov market-making model to the 0-100 cent
//! probability scale. The quoter receives exactly two values from a
//! forecast: the probability (fair value) and the confidence (quote width),
//! then skews around a reservation price as inventory accumulates.
//!
//! Reference: Avellaneda & Stoikov, "High-frequency trading in a limit
//! order book", 2008.

use types::{Price, Quantity};

/// Algorithm parameters, calibrated for the 0-100 cent price range.
#[derive(Debug, Clone)]
pub struct QuoterConfig {
    /// gamma: inventory aversion. Higher skews quotes faster with position.
    pub risk_aversion: f64,
    /// k: order arrival-rate parameter; higher means tighter spreads.
    pub liquidity_param: f64,
    /// T: quoting horizon in seconds.
    pub terminal_time: f64,
    /// sigma_base: volatility at zero confidence; sigma = base * (1 - c).
    pub volatility_base: f64,
    /// Floor on the quoted spread, in cents.
    pub min_spread: f64,
    /// Position cap; quoting stops when inventory reaches it.
    pub max_position: i64,
    /// Contracts quoted per side.
    pub default_quantity: u64,
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            risk_aversion: 0.003,
            liquidity_param: 1.2,
            terminal_time: 60.0,
            volatility_base: 3.5,
            min_spread: 2.0,
            max_position: 100,
            default_quantity: 10,
        }
    }
}

/// Quote engine for one trader's belief.
#[derive(Debug, Clone)]
pub struct BeliefQuoter {
    /// Believed fair value in cents.
    belief: f64,
    /// Belief volatility, derived from confidence.
    sigma: f64,
    config: QuoterConfig,
}

impl BeliefQuoter {
    /// Build from a forecast: probability in `[0, 1]`, confidence in
    /// `[0, 1]`.
    pub fn new(probability: f64, confidence: f64, config: QuoterConfig) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            belief: probability * 100.0,
            sigma: config.volatility_base * (1.0 - confidence),
            config,
        }
    }

    /// Believed fair value in cents.
    pub fn belief(&self) -> f64 {
        self.belief
    }

    /// Blend the belief toward the observed market price.
    ///
    /// `alpha` is the learning rate: 0 keeps the original belief fixed,
    /// 1 fully adopts the market.
    pub fn update_belief(&mut self, market_price: f64, alpha: f64) {
        self.belief = (1.0 - alpha) * self.belief + alpha * market_price;
    }

    /// Optimal bid/ask around the inventory-adjusted reservation price.
    ///
    /// Reservation: `r = belief - q * gamma * sigma^2 * dt`.
    /// Spread: `gamma * sigma^2 * dt + (2/gamma) * ln(1 + gamma/k)`,
    /// floored at the configured minimum.
    pub fn quotes(&self, inventory: i64) -> (Price, Price) {
        let dt = self.config.terminal_time;
        let gamma = self.config.risk_aversion;
        let variance_term = gamma * self.sigma * self.sigma * dt;

        let reservation = self.belief - inventory as f64 * variance_term;

        let adverse_selection =
            (2.0 / gamma) * (1.0 + gamma / self.config.liquidity_param).ln();
        let spread = (variance_term + adverse_selection).max(self.config.min_spread);

        let mut bid = (reservation - spread / 2.0).round() as i64;
        let mut ask = (reservation + spread / 2.0).round() as i64;

        bid = bid.clamp(1, 99);
        ask = ask.clamp(1, 99);

        // Rounding can cross the quotes at the extremes; force them apart.
        if bid >= ask {
            if bid > 1 {
                bid -= 1;
            }
            if ask < 99 {
                ask += 1;
            }
        }

        (Price(bid), Price(ask))
    }

    /// Quote size given current inventory; `None` when the position cap is
    /// reached.
    pub fn size(&self, inventory: i64) -> Option<Quantity> {
        let headroom = self.config.max_position - inventory.abs();
        if headroom <= 0 {
            return None;
        }
        Some(Quantity(
            self.config.default_quantity.min(headroom as u64),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoter(p: f64, c: f64) -> BeliefQuoter {
        BeliefQuoter::new(p, c, QuoterConfig::default())
    }

    #[test]
    fn test_quotes_straddle_belief_at_zero_inventory() {
        let q = quoter(0.65, 0.8);
        let (bid, ask) = q.quotes(0);
        assert!(bid.cents() < 65);
        assert!(ask.cents() > 65);
        assert!(bid < ask);
    }

    #[test]
    fn test_high_confidence_tightens_spread() {
        let confident = quoter(0.5, 0.9);
        let unsure = quoter(0.5, 0.1);
        let (cb, ca) = confident.quotes(0);
        let (ub, ua) = unsure.quotes(0);
        assert!(ca.cents() - cb.cents() <= ua.cents() - ub.cents());
    }

    #[test]
    fn test_long_inventory_lowers_quotes() {
        let q = quoter(0.5, 0.2);
        let (flat_bid, flat_ask) = q.quotes(0);
        let (long_bid, long_ask) = q.quotes(50);
        assert!(long_bid <= flat_bid);
        assert!(long_ask <= flat_ask);
    }

    #[test]
    fn test_quotes_stay_in_market_range() {
        let extreme = quoter(0.99, 0.0);
        let (bid, ask) = extreme.quotes(-80);
        assert!((1..=99).contains(&bid.cents()));
        assert!((1..=99).contains(&ask.cents()));
        assert!(bid < ask);

        let floor = quoter(0.01, 0.0);
        let (bid, ask) = floor.quotes(80);
        assert!((1..=99).contains(&bid.cents()));
        assert!(bid < ask);
    }

    #[test]
    fn test_size_respects_position_cap() {
        let q = quoter(0.5, 0.5);
        assert_eq!(q.size(0), Some(Quantity(10)));
        assert_eq!(q.size(95), Some(Quantity(5)));
        assert_eq!(q.size(100), None);
        assert_eq!(q.size(-100), None);
    }

    #[test]
    fn test_update_belief_blends() {
        let mut q = quoter(0.6, 0.5);
        q.update_belief(40.0, 0.5);
        assert!((q.belief() - 50.0).abs() < 1e-9);
        q.update_belief(40.0, 0.0);
        assert!((q.belief() - 50.0).abs() < 1e-9);
    }
}
