//! Fixed-point monetary types for the probability market.
//!
//! Prices are whole cents on the probability-of-YES scale (0-100). Cash is
//! tracked in integer cents so that the two sides of every trade cancel
//! exactly; floating point never enters the conservation path.

use derive_more::{Add, AddAssign, From, Into, Neg, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A probability price in whole cents.
///
/// `Price(60)` means "60 cents per contract", i.e. an implied probability of
/// 60%. The valid market domain is `0..=100` inclusive.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    From,
    Into,
)]
#[serde(transparent)]
pub struct Price(pub i64);

impl Price {
    /// Lowest legal price: probability zero.
    pub const MIN: Price = Price(0);
    /// Highest legal price: probability one.
    pub const MAX: Price = Price(100);

    /// Raw cent value.
    #[inline]
    pub fn cents(self) -> i64 {
        self.0
    }

    /// Whether this price lies in the legal `0..=100` domain.
    #[inline]
    pub fn is_valid(self) -> bool {
        (Self::MIN.0..=Self::MAX.0).contains(&self.0)
    }

    /// Clamp an arbitrary cent value into the legal domain.
    #[inline]
    pub fn clamped(cents: i64) -> Self {
        Price(cents.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Convert a probability in `[0, 1]` to a price, rounding to whole cents.
    #[inline]
    pub fn from_probability(p: f64) -> Self {
        Self::clamped((p * 100.0).round() as i64)
    }

    /// Implied probability of this price.
    #[inline]
    pub fn to_probability(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({}¢)", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}¢", self.0)
    }
}

/// Account cash in integer cents.
///
/// One contract bought at `Price(p)` moves exactly `p` cents from buyer to
/// seller, so per-trade cash deltas always sum to zero.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    Neg,
    AddAssign,
    SubAssign,
    Sum,
    From,
    Into,
)]
#[serde(transparent)]
pub struct Cash(pub i64);

impl Cash {
    pub const ZERO: Cash = Cash(0);

    /// Build from a dollar amount, rounding to whole cents.
    #[inline]
    pub fn from_dollars(v: f64) -> Self {
        Cash((v * 100.0).round() as i64)
    }

    /// Dollar value for display and API payloads.
    #[inline]
    pub fn to_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Raw cent value.
    #[inline]
    pub fn cents(self) -> i64 {
        self.0
    }

    /// Cost of `quantity` contracts at `price`.
    #[inline]
    pub fn for_trade(price: Price, quantity: Quantity) -> Self {
        Cash(price.0 * quantity.0 as i64)
    }
}

impl fmt::Debug for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cash(${:.2})", self.to_dollars())
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.to_dollars())
    }
}

/// Number of contracts.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    Sum,
    From,
    Into,
)]
#[serde(transparent)]
pub struct Quantity(pub u64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Raw contract count.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Check if zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction.
    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Quantity(self.0.saturating_sub(rhs.0))
    }

    /// Minimum of two quantities.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Quantity(self.0.min(other.0))
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qty({})", self.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u64> for Quantity {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_domain() {
        assert!(Price(0).is_valid());
        assert!(Price(100).is_valid());
        assert!(!Price(101).is_valid());
        assert!(!Price(-1).is_valid());
    }

    #[test]
    fn test_price_from_probability() {
        assert_eq!(Price::from_probability(0.62), Price(62));
        assert_eq!(Price::from_probability(0.0), Price(0));
        assert_eq!(Price::from_probability(1.0), Price(100));
        // Out-of-range probabilities clamp into the domain
        assert_eq!(Price::from_probability(1.5), Price(100));
        assert_eq!(Price::from_probability(-0.2), Price(0));
    }

    #[test]
    fn test_cash_for_trade_conserves() {
        let cost = Cash::for_trade(Price(55), Quantity(10));
        assert_eq!(cost, Cash(550));
        // Buyer pays what seller receives
        assert_eq!(-cost + cost, Cash::ZERO);
    }

    #[test]
    fn test_cash_dollar_conversion() {
        assert_eq!(Cash::from_dollars(1000.0), Cash(100_000));
        assert!((Cash(550).to_dollars() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_saturating() {
        assert_eq!(Quantity(5).saturating_sub(Quantity(10)), Quantity(0));
        assert_eq!(Quantity(10).min(Quantity(3)), Quantity(3));
    }
}
