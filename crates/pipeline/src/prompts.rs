//! System prompts and request builders for every worker kind.
//!
//! Discovery workers rotate through ten analytical perspectives, each with
//! its own temperature; synthesis prompts are modulated by the forecaster
//! personality.

use llm::CompletionRequest;
use types::{Factor, ForecasterClass, QuestionType};

use crate::outputs::{
    ConsensusOutput, DiscoveryOutput, FactorCandidate, RatedFactor, RatingConsensusOutput,
    RatingOutput, ResearchOutput, SynthesisOutput, ValidationOutput,
};

const DEFAULT_MAX_TOKENS: u32 = 4000;

/// One discovery perspective: prompt flavor plus sampling temperature.
struct Perspective {
    lens: &'static str,
    temperature: f64,
}

const PERSPECTIVES: [Perspective; 10] = [
    Perspective {
        lens: "an economic analyst focused on markets, incentives, and macro conditions",
        temperature: 0.6,
    },
    Perspective {
        lens: "a political dynamics specialist watching institutions, elections, and policy",
        temperature: 0.6,
    },
    Perspective {
        lens: "a technology analyst tracking technical feasibility and adoption curves",
        temperature: 0.7,
    },
    Perspective {
        lens: "a social trends researcher reading public opinion and cultural shifts",
        temperature: 0.7,
    },
    Perspective {
        lens: "a historian looking for precedents and long-term patterns",
        temperature: 0.5,
    },
    Perspective {
        lens: "a contrarian who hunts for overlooked risks and tail scenarios",
        temperature: 1.0,
    },
    Perspective {
        lens: "a scientist weighing empirical evidence and measurement quality",
        temperature: 0.5,
    },
    Perspective {
        lens: "a media analyst tracking narratives, coverage, and attention cycles",
        temperature: 0.8,
    },
    Perspective {
        lens: "a legal and regulatory expert watching rules, courts, and compliance",
        temperature: 0.6,
    },
    Perspective {
        lens: "a generalist superforecaster looking for whatever the others missed",
        temperature: 0.9,
    },
];

fn discovery_system_prompt(worker_index: usize) -> (String, f64) {
    let perspective = &PERSPECTIVES[worker_index % PERSPECTIVES.len()];
    let prompt = format!(
        "You are a superforecasting factor discovery specialist, thinking as {}.\n\n\
         Your task is to analyze a forecasting question and discover up to 5 relevant \
         factors that could influence the outcome.\n\n\
         For each factor, provide:\n\
         1. Name (concise, 3-5 words)\n\
         2. Description (1-2 sentences explaining relevance)\n\
         3. Category (economic, social, political, technical, environmental, etc.)\n\n\
         Be creative and diverse in your factor discovery. Different perspectives lead \
         to better predictions.",
        perspective.lens
    );
    (prompt, perspective.temperature)
}

/// Request for one discovery worker.
pub fn discovery_request(
    worker_index: usize,
    question_text: &str,
    question_type: QuestionType,
) -> CompletionRequest {
    let (system_prompt, temperature) = discovery_system_prompt(worker_index);
    let question_type = serde_json::to_value(question_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| "binary".into());
    CompletionRequest {
        system_prompt,
        user_payload: format!(
            "Forecasting Question: {question_text}\nQuestion Type: {question_type}\n\n\
             First, search the web for current information, trends, and recent developments \
             related to this forecasting question.\n\n\
             Then, discover up to 5 relevant factors that could influence this outcome. \
             Consider diverse perspectives and categories. Be creative and thorough."
        ),
        schema: DiscoveryOutput::schema(),
        temperature,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search: true,
    }
}

fn candidates_block(factors: &[FactorCandidate]) -> String {
    factors
        .iter()
        .map(|f| format!("- {}: {} ({})", f.name, f.description, f.category))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Request for the validator (phase 2, first agent).
pub fn validator_request(question_text: &str, factors: &[FactorCandidate]) -> CompletionRequest {
    CompletionRequest {
        system_prompt: "You are a factor validation specialist.\n\n\
             Your task is to:\n\
             1. Review all discovered factors from multiple agents\n\
             2. Identify and merge duplicates, preferring the more specific description\n\
             3. Validate relevance to the forecasting question\n\
             4. Remove low-quality or irrelevant factors\n\n\
             Return a deduplicated, validated list of unique factors."
            .into(),
        user_payload: format!(
            "Forecasting Question: {question_text}\n\n\
             Discovered Factors ({} total):\n{}\n\n\
             Review these factors, deduplicate similar ones, and validate their relevance. \
             Return a clean list of unique, validated factors.",
            factors.len(),
            candidates_block(factors)
        ),
        schema: ValidationOutput::schema(),
        temperature: 0.3,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search: false,
    }
}

/// Request for the merged rating-consensus agent (2-agent design).
pub fn rating_consensus_request(
    question_text: &str,
    factors: &[FactorCandidate],
    top_k: usize,
) -> CompletionRequest {
    CompletionRequest {
        system_prompt: "You are a factor importance rater and consensus builder.\n\n\
             Score each factor 1-10 for importance to the forecast, considering causal \
             mechanism strength, historical precedence, current relevance, and impact \
             magnitude. Then select the most important factors for deep research, \
             balancing scores with category diversity."
            .into(),
        user_payload: format!(
            "Forecasting Question: {question_text}\n\n\
             Validated Factors ({} total):\n{}\n\n\
             1. Score each factor 1-10.\n\
             2. Select the top {top_k} factors for deep research.\n\n\
             Output both rated_factors (all factors with scores) and top_factors \
             (exactly {top_k} selected factors).",
            factors.len(),
            candidates_block(factors)
        ),
        schema: RatingConsensusOutput::schema(),
        temperature: 0.3,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search: false,
    }
}

/// Request for the standalone rater (3-agent design).
pub fn rater_request(question_text: &str, factors: &[FactorCandidate]) -> CompletionRequest {
    CompletionRequest {
        system_prompt: "You are a factor importance rater.\n\n\
             Score each validated factor on a scale of 1-10 for importance to the \
             forecast. Consider direct impact, historical precedence, current \
             relevance, and data availability. Provide objective, well-reasoned scores."
            .into(),
        user_payload: format!(
            "Forecasting Question: {question_text}\n\n\
             Validated Factors ({} total):\n{}\n\n\
             Rate each factor's importance on a scale of 1-10.",
            factors.len(),
            candidates_block(factors)
        ),
        schema: RatingOutput::schema(),
        temperature: 0.3,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search: false,
    }
}

/// Request for the standalone consensus agent (3-agent design).
pub fn consensus_request(
    question_text: &str,
    rated: &[RatedFactor],
    top_k: usize,
) -> CompletionRequest {
    let rated_block = rated
        .iter()
        .map(|f| {
            format!(
                "- {} (Importance: {}/10): {}",
                f.name, f.importance_score, f.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    CompletionRequest {
        system_prompt: "You are a consensus builder.\n\n\
             Select the most important factors for deep research, considering \
             importance scores, diversity of factor categories, and research \
             feasibility."
            .into(),
        user_payload: format!(
            "Forecasting Question: {question_text}\n\n\
             Rated Factors ({} total):\n{rated_block}\n\n\
             Select the top {top_k} most important factors for deep research. \
             Return exactly {top_k} factors.",
            rated.len()
        ),
        schema: ConsensusOutput::schema(),
        temperature: 0.3,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search: false,
    }
}

/// Which research angle a worker takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchKind {
    Historical,
    Current,
}

/// Request for one research worker on one factor.
pub fn research_request(
    kind: ResearchKind,
    question_text: &str,
    factor: &Factor,
) -> CompletionRequest {
    let (system_prompt, web_search) = match kind {
        ResearchKind::Historical => (
            "You are a historical pattern analyst.\n\n\
             Your task is to research historical precedents and patterns for a specific \
             factor. Analyze past occurrences, historical trends, analogous situations, \
             and long-term patterns. Provide detailed historical context and confidence \
             in your analysis.",
            false,
        ),
        ResearchKind::Current => (
            "You are a current data researcher.\n\n\
             Your task is to research current data and trends for a specific factor. \
             Analyze recent developments, current statistics, latest news and events, \
             and emerging trends. Provide up-to-date information and confidence in \
             your findings.",
            true,
        ),
    };
    CompletionRequest {
        system_prompt: system_prompt.into(),
        user_payload: format!(
            "Forecasting Question: {question_text}\n\n\
             Factor to research: {}\n\
             Description: {}\n\
             Category: {}\n\n\
             Research this factor in depth and summarize what you find. Set factor_name \
             to exactly \"{}\".",
            factor.name, factor.description, factor.category, factor.name
        ),
        schema: ResearchOutput::schema(),
        temperature: 0.5,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search,
    }
}

fn personality_flavor(class: ForecasterClass) -> &'static str {
    match class {
        ForecasterClass::Conservative => {
            "You are risk-averse: weight downside scenarios and base rates heavily, \
             anchor toward 50%, and be skeptical of extreme predictions."
        }
        ForecasterClass::Momentum => {
            "You follow trends: weight recent developments and directional movement, \
             and assume current trajectories tend to continue."
        }
        ForecasterClass::Historical => {
            "You rely heavily on base rates and historical precedent: look for \
             analogous past events and be skeptical of 'this time is different'."
        }
        ForecasterClass::Realtime => {
            "You are highly responsive to new information: weight the most recent \
             evidence strongly and update quickly."
        }
        ForecasterClass::Balanced => {
            "You weigh multiple perspectives equally: identify and correct for biases, \
             blending base rates with current evidence."
        }
    }
}

/// Request for one personality's synthesis worker.
pub fn synthesis_request(
    class: ForecasterClass,
    question_text: &str,
    question_type: QuestionType,
    factors: &[Factor],
) -> CompletionRequest {
    let factors_block = factors
        .iter()
        .map(|f| {
            format!(
                "Factor: {} (Importance: {}/10)\nResearch Summary:\n{}\n---",
                f.name,
                f.importance_score
                    .map(|s| format!("{s:.1}"))
                    .unwrap_or_else(|| "N/A".into()),
                f.research_summary.as_deref().unwrap_or("No research available")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let question_type = serde_json::to_value(question_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| "binary".into());

    CompletionRequest {
        system_prompt: format!(
            "You are a prediction synthesis specialist and superforecaster. {}\n\n\
             Apply superforecasting principles:\n\
             - Base rates and outside view\n\
             - Break down complex questions\n\
             - Consider multiple perspectives\n\
             - Update based on evidence\n\
             - Express uncertainty calibrated to evidence\n\n\
             Your prediction should be clear, well-reasoned, and properly calibrated.",
            personality_flavor(class)
        ),
        user_payload: format!(
            "Forecasting Question: {question_text}\n\
             Question Type: {question_type}\n\n\
             Research Summary for Top Factors:\n{factors_block}\n\n\
             Synthesize all this research into a coherent prediction. Provide:\n\
             1. prediction_probability in [0, 1]\n\
             2. confidence in [0, 1]\n\
             3. Detailed reasoning\n\
             4. The key factors that influenced your prediction"
        ),
        schema: SynthesisOutput::schema(),
        temperature: 0.4,
        max_tokens: DEFAULT_MAX_TOKENS,
        web_search: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::SessionId;

    #[test]
    fn test_discovery_perspectives_rotate() {
        let a = discovery_request(0, "Will X happen?", QuestionType::Binary);
        let b = discovery_request(1, "Will X happen?", QuestionType::Binary);
        let wrapped = discovery_request(10, "Will X happen?", QuestionType::Binary);
        assert_ne!(a.system_prompt, b.system_prompt);
        assert_eq!(a.system_prompt, wrapped.system_prompt);
        assert!(a.web_search);
    }

    #[test]
    fn test_research_kinds_differ_on_web_search() {
        let factor = Factor::new(SessionId::new(), "Macro trend", "rates", "economic");
        let hist = research_request(ResearchKind::Historical, "Q?", &factor);
        let curr = research_request(ResearchKind::Current, "Q?", &factor);
        assert!(!hist.web_search);
        assert!(curr.web_search);
        assert!(hist.user_payload.contains("Macro trend"));
    }

    #[test]
    fn test_synthesis_prompt_carries_personality() {
        let factors = vec![];
        let conservative = synthesis_request(
            ForecasterClass::Conservative,
            "Q?",
            QuestionType::Binary,
            &factors,
        );
        let momentum =
            synthesis_request(ForecasterClass::Momentum, "Q?", QuestionType::Binary, &factors);
        assert_ne!(conservative.system_prompt, momentum.system_prompt);
        assert!(conservative.system_prompt.contains("risk-averse"));
    }

    #[test]
    fn test_synthesis_payload_includes_research() {
        let mut factor = Factor::new(SessionId::new(), "Macroeconomic trend", "d", "economic");
        factor.importance_score = Some(8.0);
        factor.research_summary = Some("historically strong".into());
        let req = synthesis_request(
            ForecasterClass::Balanced,
            "Will X happen by 2025?",
            QuestionType::Binary,
            &[factor],
        );
        assert!(req.user_payload.contains("Macroeconomic trend"));
        assert!(req.user_payload.contains("8.0/10"));
        assert!(req.user_payload.contains("historically strong"));
    }
}
