//! The closed set of 18 trader identities and their per-session state.

use crate::ids::{SessionId, Timestamp};
use crate::money::{Cash, Price};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category a trader identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraderType {
    /// Seeded with a forecaster personality's probability.
    Fundamental,
    /// Driven by a sphere-flavored sentiment signal.
    Noise,
    /// Tracks a specific external account's posts.
    User,
}

/// The fixed set of 18 trader identities.
///
/// The set is closed: the matching engine and the store only ever see these
/// names, mirroring a database enum column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraderName {
    // Fundamental — one per forecaster personality
    Conservative,
    Momentum,
    Historical,
    Balanced,
    Realtime,
    // Noise — X spheres of influence
    EaccSovereign,
    AmericaFirst,
    BlueEstablishment,
    ProgressiveLeft,
    OptimizerIdw,
    FintwitMarket,
    BuilderEngineering,
    AcademicResearch,
    OsintIntel,
    // User-tracking
    Oliver,
    Owen,
    Skylar,
    Tyler,
}

impl TraderName {
    /// All 18 identities in canonical order.
    pub const ALL: [TraderName; 18] = [
        TraderName::Conservative,
        TraderName::Momentum,
        TraderName::Historical,
        TraderName::Balanced,
        TraderName::Realtime,
        TraderName::EaccSovereign,
        TraderName::AmericaFirst,
        TraderName::BlueEstablishment,
        TraderName::ProgressiveLeft,
        TraderName::OptimizerIdw,
        TraderName::FintwitMarket,
        TraderName::BuilderEngineering,
        TraderName::AcademicResearch,
        TraderName::OsintIntel,
        TraderName::Oliver,
        TraderName::Owen,
        TraderName::Skylar,
        TraderName::Tyler,
    ];

    /// The category this identity belongs to.
    pub fn trader_type(self) -> TraderType {
        use TraderName::*;
        match self {
            Conservative | Momentum | Historical | Balanced | Realtime => TraderType::Fundamental,
            EaccSovereign | AmericaFirst | BlueEstablishment | ProgressiveLeft | OptimizerIdw
            | FintwitMarket | BuilderEngineering | AcademicResearch | OsintIntel => {
                TraderType::Noise
            }
            Oliver | Owen | Skylar | Tyler => TraderType::User,
        }
    }

    /// Snake-case name matching the wire representation.
    pub fn as_str(self) -> &'static str {
        use TraderName::*;
        match self {
            Conservative => "conservative",
            Momentum => "momentum",
            Historical => "historical",
            Balanced => "balanced",
            Realtime => "realtime",
            EaccSovereign => "eacc_sovereign",
            AmericaFirst => "america_first",
            BlueEstablishment => "blue_establishment",
            ProgressiveLeft => "progressive_left",
            OptimizerIdw => "optimizer_idw",
            FintwitMarket => "fintwit_market",
            BuilderEngineering => "builder_engineering",
            AcademicResearch => "academic_research",
            OsintIntel => "osint_intel",
            Oliver => "oliver",
            Owen => "owen",
            Skylar => "skylar",
            Tyler => "tyler",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == s)
    }
}

impl fmt::Display for TraderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trader's live state within one session.
///
/// One row per (session, name). Position and cash are mutated exclusively by
/// the matching engine as part of the matching transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderState {
    pub session_id: SessionId,
    pub name: TraderName,
    pub trader_type: TraderType,
    /// Net YES contracts held; positive = long, negative = short.
    pub position: i64,
    pub cash: Cash,
    pub pnl: Cash,
    /// Free-form notes the agent persists between rounds.
    pub system_prompt: String,
    pub updated_at: Timestamp,
}

impl TraderState {
    /// Starting cash for every trader.
    pub const INITIAL_CASH: Cash = Cash(100_000); // $1000.00

    /// Fresh state for a trader entering a session.
    pub fn new(session_id: SessionId, name: TraderName) -> Self {
        Self {
            session_id,
            name,
            trader_type: name.trader_type(),
            position: 0,
            cash: Self::INITIAL_CASH,
            pnl: Cash::ZERO,
            system_prompt: String::new(),
            updated_at: crate::ids::now(),
        }
    }

    /// Re-mark `pnl` against the given reference price.
    ///
    /// `pnl = cash - initial + position * price` (all in cents).
    pub fn mark_pnl(&mut self, last_price: Option<Price>) {
        let position_value = last_price
            .map(|p| Cash(p.cents() * self.position))
            .unwrap_or(Cash::ZERO);
        self.pnl = self.cash - Self::INITIAL_CASH + position_value;
    }
}
