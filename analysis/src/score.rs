use serde::Serialize;

pub const WEIGHT_LEXICAL: f64 = 0.2;
pub const WEIGHT_ACOUSTIC: f64 = 0.3;
pub const WEIGHT_BEHAVIORAL: f64 = 0.3;
pub const WEIGHT_SEMANTIC: f64 = 0.2;

/// Scores above this tier boundary fan out a high-risk alert.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;
pub const MONITOR_THRESHOLD: f64 = 0.4;

/// The semantic term is currently derived from the lexical score rather
/// than computed by an independent model. Placeholder factor kept for
/// behavioral compatibility with existing score expectations.
pub const SEMANTIC_FROM_LEXICAL: f64 = 0.8;

/// Independently computed sub-scores, each in [0, 1]. A source that did not
/// run for a given frame contributes 0.0, never "skip this term", so the
/// weight sum stays constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SubScores {
    pub lexical: f64,
    pub acoustic: f64,
    pub behavioral: f64,
    pub semantic: f64,
}

impl SubScores {
    /// Builds the full tuple from the three real sources, deriving the
    /// semantic term from the lexical score.
    pub fn from_sources(lexical: f64, acoustic: f64, behavioral: f64) -> Self {
        Self {
            lexical,
            acoustic,
            behavioral,
            semantic: lexical * SEMANTIC_FROM_LEXICAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    High,
    Monitor,
    Low,
}

impl Recommendation {
    /// Tier boundaries are fixed, not configurable, so test expectations
    /// stay reproducible.
    pub fn for_score(score: f64) -> Self {
        if score > HIGH_RISK_THRESHOLD {
            Recommendation::High
        } else if score > MONITOR_THRESHOLD {
            Recommendation::Monitor
        } else {
            Recommendation::Low
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub sub_scores: SubScores,
    pub recommendation: Recommendation,
    pub detected_keywords: Vec<String>,
}

/// Deterministic weighted combination of the sub-scores into one bounded
/// risk value. Pure: identical inputs always produce the identical overall
/// score and tier.
pub fn aggregate(sub_scores: SubScores, detected_keywords: Vec<String>) -> RiskAssessment {
    let overall = WEIGHT_LEXICAL * sub_scores.lexical
        + WEIGHT_ACOUSTIC * sub_scores.acoustic
        + WEIGHT_BEHAVIORAL * sub_scores.behavioral
        + WEIGHT_SEMANTIC * sub_scores.semantic;
    let overall = overall.clamp(0.0, 1.0);
    RiskAssessment {
        risk_score: overall,
        sub_scores,
        recommendation: Recommendation::for_score(overall),
        detected_keywords,
    }
}
