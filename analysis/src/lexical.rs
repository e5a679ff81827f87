/// Keyword lists are matched as lowercase substrings, so "urgently" still
/// trips "urgent".
pub const FRAUD_KEYWORDS: &[&str] = &[
    "urgent",
    "wire transfer",
    "bank account",
    "social security",
    "password",
    "credit card",
    "loan",
    "investment",
    "scam",
];

pub const HIGH_RISK_KEYWORDS: &[&str] = &["immediate action", "confidential", "secret"];

#[derive(Debug, Clone)]
pub struct LexicalReport {
    pub score: f64,
    pub detected_keywords: Vec<String>,
}

/// Keyword-based transcript scoring. Pure and infallible; the richer
/// signals live in the behavioral and acoustic scorers.
#[derive(Debug, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn analyze(&self, transcript: &str) -> LexicalReport {
        let lower = transcript.to_lowercase();

        let detected_keywords: Vec<String> = FRAUD_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| (*kw).to_string())
            .collect();
        let mut score = (detected_keywords.len() as f64 * 0.1).min(0.5);

        let high_risk = HIGH_RISK_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        score += (high_risk as f64 * 0.2).min(0.3);

        // Repeated urgency is a stronger signal than a single mention.
        let urgent = lower.matches("urgent").count();
        score += (urgent as f64 * 0.05).min(0.2);

        LexicalReport {
            score: score.min(1.0),
            detected_keywords,
        }
    }
}
