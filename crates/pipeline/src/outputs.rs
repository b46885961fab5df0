//! Typed outputs for each phase, with their declared JSON schemas.
//!
//! Each phase has its own record type; outputs flow between phases as these
//! values, never as untyped blobs. The schema accompanying each type is what
//! the provider is asked to conform to.

use llm::OutputSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A factor candidate as discovery and validation agents emit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorCandidate {
    pub name: String,
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Phase 1: up to five candidates per discovery worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOutput {
    pub factors: Vec<FactorCandidate>,
}

impl DiscoveryOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "factor_discovery",
            json!({
                "type": "object",
                "properties": {
                    "factors": {
                        "type": "array",
                        "maxItems": 5,
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "description": {"type": "string"},
                                "category": {"type": "string"}
                            },
                            "required": ["name", "description"]
                        }
                    }
                },
                "required": ["factors"]
            }),
        )
    }
}

/// Phase 2a: the validator's deduplicated factor set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutput {
    pub validated_factors: Vec<FactorCandidate>,
}

impl ValidationOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "factor_validation",
            json!({
                "type": "object",
                "properties": {
                    "validated_factors": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "description": {"type": "string"},
                                "category": {"type": "string"}
                            },
                            "required": ["name", "description"]
                        }
                    }
                },
                "required": ["validated_factors"]
            }),
        )
    }
}

/// A factor with its importance score attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedFactor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub importance_score: f64,
}

fn rated_factor_items() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "description": {"type": "string"},
            "category": {"type": "string"},
            "importance_score": {"type": "number"}
        },
        "required": ["name", "importance_score"]
    })
}

/// Phase 2b (merged design): scores for every factor plus the suggested top
/// selection in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConsensusOutput {
    pub rated_factors: Vec<RatedFactor>,
    #[serde(default)]
    pub top_factors: Vec<RatedFactor>,
}

impl RatingConsensusOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "rating_consensus",
            json!({
                "type": "object",
                "properties": {
                    "rated_factors": {"type": "array", "items": rated_factor_items()},
                    "top_factors": {"type": "array", "items": rated_factor_items()}
                },
                "required": ["rated_factors"]
            }),
        )
    }
}

/// Phase 2b (split design): the rater's scores alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingOutput {
    pub rated_factors: Vec<RatedFactor>,
}

impl RatingOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "factor_rating",
            json!({
                "type": "object",
                "properties": {
                    "rated_factors": {"type": "array", "items": rated_factor_items()}
                },
                "required": ["rated_factors"]
            }),
        )
    }
}

/// Phase 2c (split design): the consensus pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusOutput {
    pub top_factors: Vec<RatedFactor>,
}

impl ConsensusOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "consensus",
            json!({
                "type": "object",
                "properties": {
                    "top_factors": {"type": "array", "items": rated_factor_items()}
                },
                "required": ["top_factors"]
            }),
        )
    }
}

/// Phase 3: one research worker's findings on one factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub factor_name: String,
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ResearchOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "factor_research",
            json!({
                "type": "object",
                "properties": {
                    "factor_name": {"type": "string"},
                    "summary": {"type": "string"},
                    "sources": {"type": "array", "items": {"type": "string"}},
                    "confidence": {"type": "number"}
                },
                "required": ["factor_name", "summary"]
            }),
        )
    }
}

/// Phase 4: one personality's calibrated prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOutput {
    pub prediction_probability: f64,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
}

impl SynthesisOutput {
    pub fn schema() -> OutputSchema {
        OutputSchema::new(
            "prediction",
            json!({
                "type": "object",
                "properties": {
                    "prediction_probability": {"type": "number"},
                    "confidence": {"type": "number"},
                    "reasoning": {"type": "string"},
                    "key_factors": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["prediction_probability", "confidence", "reasoning"]
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_output_deserializes_without_category() {
        let out: DiscoveryOutput = serde_json::from_value(json!({
            "factors": [{"name": "Macro trend", "description": "rates"}]
        }))
        .unwrap();
        assert_eq!(out.factors[0].category, "general");
    }

    #[test]
    fn test_synthesis_schema_requires_core_fields() {
        let schema = SynthesisOutput::schema();
        let required = schema.schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "prediction_probability"));
        assert!(required.iter().any(|v| v == "confidence"));
    }

    #[test]
    fn test_rated_factor_defaults() {
        let f: RatedFactor =
            serde_json::from_value(json!({"name": "X", "importance_score": 8.0})).unwrap();
        assert_eq!(f.description, "");
        assert_eq!(f.category, "general");
    }
}
