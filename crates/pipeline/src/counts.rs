//! Per-phase worker counts.
//!
//! Recognized configuration keys mirror the API surface:
//! `phase_1_discovery`, `phase_2_validation` (2 or 3), `phase_3_research`
//! (legacy, splits 50/50), `phase_3_historical`, `phase_3_current`,
//! `phase_4_synthesis` (fixed at 1 per personality).

use serde::{Deserialize, Serialize};

/// Worker counts for each pipeline phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCounts {
    /// Parallel discovery workers.
    pub phase_1_discovery: usize,
    /// 2 = validator + rating_consensus (merged); 3 = validator + rater +
    /// consensus (the older split design).
    pub phase_2_validation: usize,
    /// Historical research workers.
    pub phase_3_historical: usize,
    /// Current-evidence research workers (web search enabled).
    pub phase_3_current: usize,
    /// Synthesizers per personality; fixed at 1.
    pub phase_4_synthesis: usize,
}

impl Default for AgentCounts {
    fn default() -> Self {
        Self {
            phase_1_discovery: 10,
            phase_2_validation: 2,
            phase_3_historical: 5,
            phase_3_current: 5,
            phase_4_synthesis: 1,
        }
    }
}

/// Raw counts as accepted on the API (all keys optional).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCountsRequest {
    pub phase_1_discovery: Option<usize>,
    pub phase_2_validation: Option<usize>,
    /// Legacy combined research count; split 50/50 when the explicit
    /// historical/current keys are absent.
    pub phase_3_research: Option<usize>,
    pub phase_3_historical: Option<usize>,
    pub phase_3_current: Option<usize>,
    pub phase_4_synthesis: Option<usize>,
}

impl AgentCountsRequest {
    /// Resolve request keys against defaults.
    pub fn resolve(&self) -> AgentCounts {
        let defaults = AgentCounts::default();

        let (historical, current) = match (self.phase_3_historical, self.phase_3_current) {
            (None, None) => match self.phase_3_research {
                // Legacy key splits 50/50, historical taking the remainder.
                Some(total) => (total - total / 2, total / 2),
                None => (defaults.phase_3_historical, defaults.phase_3_current),
            },
            (h, c) => (
                h.unwrap_or(defaults.phase_3_historical),
                c.unwrap_or(defaults.phase_3_current),
            ),
        };

        AgentCounts {
            phase_1_discovery: self
                .phase_1_discovery
                .unwrap_or(defaults.phase_1_discovery)
                .max(1),
            // Only the two designs that exist are accepted.
            phase_2_validation: match self.phase_2_validation {
                Some(3) => 3,
                _ => 2,
            },
            phase_3_historical: historical,
            phase_3_current: current,
            phase_4_synthesis: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let counts = AgentCountsRequest::default().resolve();
        assert_eq!(counts.phase_1_discovery, 10);
        assert_eq!(counts.phase_2_validation, 2);
        assert_eq!(counts.phase_3_historical, 5);
        assert_eq!(counts.phase_3_current, 5);
        assert_eq!(counts.phase_4_synthesis, 1);
    }

    #[test]
    fn test_legacy_research_key_splits_evenly() {
        let counts = AgentCountsRequest {
            phase_3_research: Some(10),
            ..Default::default()
        }
        .resolve();
        assert_eq!(counts.phase_3_historical, 5);
        assert_eq!(counts.phase_3_current, 5);

        let odd = AgentCountsRequest {
            phase_3_research: Some(7),
            ..Default::default()
        }
        .resolve();
        assert_eq!(odd.phase_3_historical, 4);
        assert_eq!(odd.phase_3_current, 3);
    }

    #[test]
    fn test_explicit_keys_override_legacy() {
        let counts = AgentCountsRequest {
            phase_3_research: Some(10),
            phase_3_historical: Some(2),
            phase_3_current: Some(1),
            ..Default::default()
        }
        .resolve();
        assert_eq!(counts.phase_3_historical, 2);
        assert_eq!(counts.phase_3_current, 1);
    }

    #[test]
    fn test_phase_2_only_accepts_known_designs() {
        let three = AgentCountsRequest {
            phase_2_validation: Some(3),
            ..Default::default()
        }
        .resolve();
        assert_eq!(three.phase_2_validation, 3);

        let other = AgentCountsRequest {
            phase_2_validation: Some(7),
            ..Default::default()
        }
        .resolve();
        assert_eq!(other.phase_2_validation, 2);
    }

    #[test]
    fn test_discovery_floor_of_one() {
        let counts = AgentCountsRequest {
            phase_1_discovery: Some(0),
            ..Default::default()
        }
        .resolve();
        assert_eq!(counts.phase_1_discovery, 1);
    }
}
